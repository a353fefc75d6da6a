use clap::Parser;
use deepwork_lib::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env from the current directory; real environment variables win
    let _ = dotenvy::dotenv();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::parse();
    log::info!("deepwork {} starting up", env!("CARGO_PKG_VERSION"));

    deepwork_lib::run(config).await
}
