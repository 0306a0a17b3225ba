use anyhow::Result;
use clap::Parser;

use evrimabot::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    evrimabot::logging::init(cli.log_json);
    cli::run(cli).await
}
