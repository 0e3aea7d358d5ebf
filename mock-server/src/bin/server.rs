use iopanel_mock::{MockConfig, MockServer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,iopanel_core=info,iopanel_mock=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    let config = MockConfig::from_env();
    info!(
        target: "mock_api",
        addr = %config.addr(),
        variant = ?config.variant,
        outputs = config.output_count,
        "Starting mock device API"
    );

    MockServer::new(config).serve().await?;
    Ok(())
}
