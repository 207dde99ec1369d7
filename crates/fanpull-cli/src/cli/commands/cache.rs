use fanpull_cache::{build_hash_key, CacheConfig, CacheStore};

use super::super::args::CacheSub;
use crate::exit_codes::{NOT_CACHED, SUCCESS};

pub async fn run(cmd: CacheSub, config: &CacheConfig) -> anyhow::Result<i32> {
    match cmd {
        CacheSub::Load => {
            let (_store, report) = CacheStore::open(config).await?;
            println!("files:   {}", report.files);
            println!("loaded:  {}", report.loaded);
            println!("removed: {}", report.removed);
            Ok(SUCCESS)
        }
        CacheSub::Exists(args) => {
            let raw_key = args.to_request()?.raw_key();
            let store = CacheStore::with_dir(&config.cache_dir);
            if store.exists(&raw_key).await {
                println!("cached");
                Ok(SUCCESS)
            } else {
                println!("not cached");
                Ok(NOT_CACHED)
            }
        }
        CacheSub::Wipe(args) => {
            let raw_key = args.to_request()?.raw_key();
            let store = CacheStore::with_dir(&config.cache_dir);
            store.wipe(&raw_key).await?;
            println!("wiped {}", build_hash_key(&raw_key));
            Ok(SUCCESS)
        }
        CacheSub::Key(args) => {
            let raw_key = args.to_request()?.raw_key();
            println!("raw:  {}", raw_key);
            println!("hash: {}", build_hash_key(&raw_key));
            Ok(SUCCESS)
        }
    }
}
