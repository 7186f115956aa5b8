use std::process::ExitCode;

use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use leadsweep::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info", LogFormat::Text);
            tracing::error!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level, config.log_format);

    let run_id = Uuid::now_v7();
    let span = tracing::info_span!("sweep", %run_id);

    async move {
        let sweeper = match leadsweep::build_sweeper(&config).await {
            Ok(sweeper) => sweeper,
            Err(e) => {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
        };

        match sweeper.run_sweep().await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{e}");
                ExitCode::FAILURE
            }
        }
    }
    .instrument(span)
    .await
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
