use anyhow::Result;
use tracing_subscriber::EnvFilter;

use orrery_lib::OrreryConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrreryConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = orrery_lib::run(config).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
