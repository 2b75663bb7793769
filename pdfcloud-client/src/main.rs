use std::process::ExitCode;

use tracing::{error, info};

use pdfcloud_client::{AppConfig, workflow};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    init_logging();

    info!("Starting pdfcloud-client v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        base_url = %config.api.base_url,
        job = config.job.job.name(),
        "Configuration loaded"
    );

    match workflow::run(&config).await {
        Ok(report) => {
            info!(
                task_id = %report.task_id,
                doc_id = %report.doc_id,
                path = %report.output.display(),
                bytes = report.bytes_written,
                polls = report.poll_attempts,
                "Result saved"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Job failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format().with_target(true).compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdfcloud_client=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
