use anyhow::Result;
use flash_sale::config::{LoggingSettings, Settings};
use flash_sale::Application;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging);

    info!(
        environment = %settings.application.environment,
        "Starting flash sale application"
    );

    let app = Application::new(settings).await?;
    app.run().await?;

    Ok(())
}
