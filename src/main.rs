mod aggregate;
mod cache;
mod config;
mod dashboard;
mod record;
mod selection;
#[cfg(feature = "serve")]
mod serve;
mod series;

use clap::Parser;
use dashboard::{DashboardCaches, DashboardInputs, Pipeline};

/// Local dashboard over per-process JSON line logs: success/failure
/// counts over time, refreshed on a timer.
///
/// The settings file is read from $PROCESS_DASHBOARD_CONFIG, or
/// config.toml in the working directory.
#[derive(Parser, Debug)]
#[command(name = "process-dashboard", version, about)]
pub struct Cli {
    /// Processes to monitor (default: [process_dashboard] names from the config)
    #[arg(value_name = "PROCESS")]
    processes: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("process_dashboard=info")),
        )
        .with_target(false)
        .init();

    let config_path = config::config_path();
    tracing::info!(config = %config_path.display(), "process-dashboard starting");
    if cli.processes.is_empty() {
        tracing::info!("monitoring default processes from config");
    } else {
        tracing::info!(processes = ?cli.processes, "monitoring processes from command line");
    }

    let settings = config::load_settings(&config_path);
    let pipeline = Pipeline::new(
        DashboardInputs {
            config_path,
            cli_processes: cli.processes,
        },
        DashboardCaches::from_settings(&settings),
    );

    #[cfg(feature = "serve")]
    if let Err(e) = serve::run(&settings, pipeline).await {
        tracing::error!("dashboard server failed: {e}");
        std::process::exit(1);
    }

    #[cfg(not(feature = "serve"))]
    {
        let mut pipeline = pipeline;
        let state = pipeline.compute(None);
        match serde_json::to_string_pretty(&state) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("failed to serialize dashboard state: {e}");
                std::process::exit(1);
            }
        }
    }
}
