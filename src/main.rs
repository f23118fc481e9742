use anyhow::Context;
use bookcover_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load cover service settings")?;
    bookcover_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        endpoint = %settings.generation.endpoint(),
        "bookcover-app bootstrap starting"
    );

    bookcover_app::serve(&settings).await?;

    tracing::info!("bookcover-app shut down");
    Ok(())
}
