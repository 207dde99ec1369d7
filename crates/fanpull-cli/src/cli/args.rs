use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use fanpull_cache::{CacheConfig, FetchRequest};

#[derive(Parser)]
#[command(
    name = "fanpull",
    version,
    about = "Cached, sequential fetching of collection pages"
)]
pub struct Cli {
    /// Cache directory (one <hash>.cache file per entry)
    #[arg(long, global = true, env = "FANPULL_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

impl Cli {
    pub fn cache_config(&self) -> CacheConfig {
        match &self.cache_dir {
            Some(dir) => CacheConfig::default().with_cache_dir(dir),
            None => CacheConfig::default(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch one URL through the cache and print the body
    Fetch(FetchArgs),
    /// Fetch every URL of one or more collection lists, one request at a time
    Pull(PullArgs),
    /// Inspect or modify the cache
    Cache(CacheArgs),
    Version,
}

/// Request identity shared by the subcommands that address one entry.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Request URL
    pub url: String,

    /// Send a POST with this body instead of a GET
    #[arg(long, value_name = "BODY")]
    pub post: Option<String>,

    /// Extra request header (repeatable); never part of the cache key
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> anyhow::Result<FetchRequest> {
        let request = match &self.post {
            Some(body) => FetchRequest::post(&self.url, body.as_str()),
            None => FetchRequest::get(&self.url),
        };
        with_headers(request, &self.headers)
    }
}

/// Attach `NAME:VALUE` header strings to a request.
pub fn with_headers(mut request: FetchRequest, headers: &[String]) -> anyhow::Result<FetchRequest> {
    for raw in headers {
        let Some((name, value)) = raw.split_once(':') else {
            anyhow::bail!("invalid header {:?}: expected NAME:VALUE", raw);
        };
        request = request.header(name.trim(), value.trim());
    }
    Ok(request)
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Decode and cache the body as JSON
    #[arg(long)]
    pub json: bool,

    /// Ignore any cached value, fetch, and overwrite it
    #[arg(long)]
    pub force_refresh: bool,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Collection list files: one URL per line, `#` starts a comment
    #[arg(required = true)]
    pub lists: Vec<PathBuf>,

    /// Extra header sent with every request (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Decode and cache bodies as JSON
    #[arg(long)]
    pub json: bool,

    /// Ignore cached values, fetch, and overwrite them
    #[arg(long)]
    pub force_refresh: bool,

    /// Requests in flight per collection (1 = strictly sequential)
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub cmd: CacheSub,
}

#[derive(Subcommand, Debug)]
pub enum CacheSub {
    /// Load every entry file, removing corrupt ones, and report counts
    Load,
    /// Exit 0 if the request is cached, 1 otherwise
    Exists(RequestArgs),
    /// Remove the cached entry for a request
    Wipe(RequestArgs),
    /// Print the raw and hash keys for a request
    Key(RequestArgs),
}
