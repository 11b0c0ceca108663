//! Prometheus exporter for file existence.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use file_exists_exporter::cli::Args;
use file_exists_exporter::config::{LogFormat, LoggingConfig};
use file_exists_exporter::{ExporterConfig, FileCollector, HttpServer};

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("file_exists_exporter={}", log_level).parse()?);

    match logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    let paths = config.load_paths()?;
    let listen = config.listen_address()?;

    if paths.is_empty() {
        warn!(source = config.source.kind(), "No files configured, /metrics will be empty");
    }

    let collector = Arc::new(FileCollector::new(paths));

    let names: Vec<&str> = collector
        .describe()
        .iter()
        .map(|m| m.path.as_str())
        .collect();
    info!(
        source = config.source.kind(),
        count = names.len(),
        files = ?names,
        "Initializing exporter"
    );

    let server = HttpServer::new(collector, listen, config.metrics_path.clone())
        .bind()
        .await?;

    info!(addr = %server.local_addr(), "Serving metrics");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_task = tokio::spawn(server.serve(shutdown_rx));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;
    http_task.await??;

    info!("Exporter stopped");
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_args();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        format: args.log_format,
    };
    init_logging(&logging)?;

    info!("Starting file existence exporter");

    let result = match args.into_config() {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
