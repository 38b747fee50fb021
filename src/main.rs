mod cli;
mod term;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use cli::Shell;
use tutor::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    tracing::info!(api_url = %settings.api_url, "Starting");

    term::install_panic_hook();

    Shell::new(&settings).await?.run().await
}
