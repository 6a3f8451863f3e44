use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use quill_check::OpenAiChecker;
use quill_core::checker::WritingChecker;
use quill_server::ServerConfig;
use quill_telemetry::TelemetryConfig;

/// Real-time writing assistant server.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "QUILL_PORT", default_value_t = 8000)]
    port: u16,

    /// Classifier call timeout in seconds.
    #[arg(long, env = "QUILL_CHECKER_TIMEOUT", default_value_t = 30)]
    checker_timeout: u64,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, env = "QUILL_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Disable persisting warn+ logs to SQLite.
    #[arg(long)]
    no_log_db: bool,

    /// Path to the log database.
    #[arg(long, env = "QUILL_LOG_DB")]
    log_db: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig {
        log_level: cli.log_level,
        log_to_sqlite: !cli.no_log_db,
        ..TelemetryConfig::default()
    };
    if let Some(path) = cli.log_db {
        telemetry.log_db_path = path;
    }
    let _guard = quill_telemetry::init_telemetry(telemetry);

    tracing::info!("Starting Quill writing assistant server");

    let checker = OpenAiChecker::from_env().expect("checker configuration");
    tracing::info!(model = checker.model(), "classifier backend configured");
    let checker: Arc<dyn WritingChecker> = Arc::new(checker);

    let config = ServerConfig {
        port: cli.port,
        checker_timeout_secs: cli.checker_timeout,
        ..ServerConfig::default()
    };
    let handle = quill_server::start(config, checker)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "Quill server ready");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
