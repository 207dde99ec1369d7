use super::args::*;
use crate::exit_codes::SUCCESS;

pub mod cache;
pub mod fetch;
pub mod pull;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.cache_config();
    match cli.cmd {
        Command::Fetch(args) => fetch::run(args, &config).await,
        Command::Pull(args) => pull::run(args, &config).await,
        Command::Cache(args) => cache::run(args.cmd, &config).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
