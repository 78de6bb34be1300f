use std::env;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use listing_indexer::{Dependencies, IndexingError, Settings};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run() -> Result<(), IndexingError> {
    let settings = Settings::from_env()?;
    let dependencies = Dependencies::new(&settings).await?;
    dependencies.orchestrator.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting listing indexer");

    if let Err(e) = run().await {
        error!(error = %e, "Listing indexer failed");
        std::process::exit(1);
    }
}
