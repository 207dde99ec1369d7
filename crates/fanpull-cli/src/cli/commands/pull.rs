use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fanpull_cache::{
    CacheConfig, CacheStore, CachedFetcher, FetchOptions, FetchRequest, HttpConfig, Pipeline,
    ProgressEvent,
};

use super::super::args::{with_headers, PullArgs};
use crate::exit_codes::SUCCESS;

/// Pull every collection list, one collection after another.
///
/// Within a collection the survey runs first so the user sees which items are
/// already cached, then the pipeline fetches the rest in order. The first
/// failure aborts the whole command; a re-run skips everything cached so far.
pub async fn run(args: PullArgs, config: &CacheConfig) -> anyhow::Result<i32> {
    let (store, _report) = CacheStore::open(config).await?;
    let fetcher = CachedFetcher::http(Arc::new(store), &HttpConfig::from_env())?;

    let options = FetchOptions {
        json: args.json,
        ..FetchOptions::default()
    }
    .force_refresh(args.force_refresh);

    let pipeline = Pipeline::bounded(args.concurrency).with_progress(Arc::new(|_: ProgressEvent| {
        eprint!(".");
        let _ = std::io::stderr().flush();
    }));

    for list in &args.lists {
        let name = collection_name(list);
        let urls = read_collection(list).await?;
        let requests = urls
            .into_iter()
            .map(|url| with_headers(FetchRequest::get(url), &args.headers))
            .collect::<anyhow::Result<Vec<_>>>()?;

        eprintln!("Found {} items in {}", requests.len(), name);
        let survey = fetcher.survey(&requests).await;
        eprintln!("{}", survey.marks());
        eprintln!(
            "Located {} of {} in the cache",
            survey.hits(),
            requests.len()
        );

        let fetched = if args.force_refresh {
            requests.len()
        } else {
            survey.misses()
        };
        eprintln!("Retrieving {} items...", fetched);

        let payloads = fetcher
            .fetch_all_with(&pipeline, requests, options)
            .await
            .with_context(|| format!("collection {}", list.display()))?;
        eprintln!();

        println!(
            "{}\t{} items\t{} cached\t{} fetched",
            name,
            payloads.len(),
            survey.hits(),
            fetched
        );
    }

    Ok(SUCCESS)
}

fn collection_name(list: &Path) -> String {
    list.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| list.display().to_string())
}

/// Read a collection list: one URL per line, blank lines and `#` comments skipped.
pub(crate) async fn read_collection(list: &Path) -> anyhow::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(list)
        .await
        .with_context(|| format!("failed to read collection list {}", list.display()))?;
    Ok(parse_collection(&text))
}

fn parse_collection(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
