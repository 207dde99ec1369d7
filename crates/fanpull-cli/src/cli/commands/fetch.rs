use std::sync::Arc;

use anyhow::Context;
use fanpull_cache::{CacheConfig, CacheStore, CachedFetcher, FetchOptions, HttpConfig, Payload};

use super::super::args::FetchArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: FetchArgs, config: &CacheConfig) -> anyhow::Result<i32> {
    let request = args.request.to_request()?;

    // Single lookups go straight to the addressed file; no full load needed.
    let store = Arc::new(CacheStore::with_dir(&config.cache_dir));
    let fetcher = CachedFetcher::http(store, &HttpConfig::from_env())?;

    let options = FetchOptions {
        json: args.json,
        ..FetchOptions::default()
    }
    .force_refresh(args.force_refresh);

    let payload = fetcher
        .fetch(&request, options)
        .await
        .with_context(|| format!("fetching {}", request.url))?;

    match payload {
        Payload::Text(text) => println!("{}", text),
        Payload::Json(value) => println!("{:#}", value),
    }
    Ok(SUCCESS)
}

