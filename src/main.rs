use std::path::PathBuf;

use chrono::Local;
use tmscrap::{config::Config, info_time, portal::IpIndiaPortal, process::Orchestrator, Result};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let start_time = Local::now();
    let config_path = std::env::var_os("TMSCRAP_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let orchestrator = Orchestrator::new(
        IpIndiaPortal::new(config.portal.clone()),
        &config.output_dir,
        config.combined_path(),
    );
    orchestrator
        .automate(&config.number_list_path, config.worker_count)
        .await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
