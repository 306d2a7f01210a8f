use accounting_service::config::get_configuration;
use accounting_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = get_configuration()?;

    init_tracing(
        "accounting-service",
        &settings.telemetry.log_level,
        settings.telemetry.otlp_endpoint.as_deref(),
    );

    // Must run before any metric is recorded
    init_metrics()?;

    tracing::info!(
        address = %settings.server.address(),
        cdn = %settings.cdn.base_url,
        max_file_size = settings.cdn.max_file_size,
        "Starting accounting service"
    );

    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
