use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qrclaimd::{bootstrap, config::DaemonConfig, rest};

#[derive(Parser)]
#[command(
    name = "qrclaimd",
    about = "qrclaimd — QR claim issuance and resolution daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST server port
    #[arg(long, env = "QRCLAIMD_PORT")]
    port: Option<u16>,

    /// Data directory for config, SQLite database, and stored images
    #[arg(long, env = "QRCLAIMD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "QRCLAIMD_LOG")]
    log: Option<String>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "QRCLAIMD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "QRCLAIMD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(DaemonConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.bind_address,
    ));
    let _log_guard = init_logging(&config.log, args.log_file.as_deref())?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
    }
}

fn init_logging(
    level: &str,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .context("log file path has no file name")?;
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

async fn serve(config: Arc<DaemonConfig>) -> Result<()> {
    info!(
        data_dir = %config.data_dir.display(),
        "starting qrclaimd v{}",
        env!("CARGO_PKG_VERSION")
    );

    let ctx = bootstrap(config).await?;

    // Claims left imageless by a previous run are recoverable, not corrupt;
    // say so instead of letting them rot silently.
    let incomplete = ctx.storage.count_incomplete_claims().await?;
    if incomplete > 0 {
        warn!(
            incomplete,
            "claims without an image at startup — clients can retry via POST /api/v1/claims/{{id}}/image"
        );
    }

    // Idle scan sessions expire in the background.
    let sweeper = Arc::clone(&ctx.scan_sessions);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tick.tick().await;
            sweeper.sweep().await;
        }
    });

    rest::start_rest_server(ctx).await
}
