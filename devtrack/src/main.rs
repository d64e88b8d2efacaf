//! `devtrack`: project and task tracking from the terminal.
//!
//! Talks to the `DevTrack` REST API. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/devtrack/config.toml`).
//!
//! ```bash
//! devtrack login --email ana@example.com --password secret1
//! devtrack projects --search vendas
//! devtrack cycle-status "Sistema de Vendas" "Write docs"
//!
//! # Point at another API
//! DEVTRACK_API_URL=https://tracker.example.com/api devtrack dashboard
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use devtrack::app::{self, AppError, Command, ConsoleSink, StdinConfirm};
use devtrack::auth::{FileTokenStore, Session};
use devtrack::config::{CliArgs, ClientConfig};
use devtrack::gateway::http::ApiClient;
use devtrack::notify::ViewSink;
use devtrack::projects::AssumeYes;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so they never mix with command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let command = cli.command.clone().unwrap_or(Command::Dashboard);
    tracing::info!(?command, base_url = %config.base_url, "devtrack starting");

    let console = Arc::new(ConsoleSink::new());
    match run(&cli, &config, &command, &console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_unauthenticated() => {
            tracing::warn!("not authenticated");
            // No-op when the command already redirected through the sink.
            console.redirect_to_login();
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: &CliArgs,
    config: &ClientConfig,
    command: &Command,
    console: &Arc<ConsoleSink>,
) -> Result<(), AppError> {
    let api = ApiClient::new(config.base_url.clone(), config.timeout)
        .map_err(|e| AppError::Auth(e.into()))?;
    let session = Session::new(api, FileTokenStore::new(&config.token_file));
    let mut stdout = io::stdout().lock();

    if let Some(result) = app::run_session(command, &session, &mut stdout).await {
        return result;
    }

    let gateway = session.resource_gateway()?;
    let view = Arc::clone(console);
    if cli.yes {
        app::run_resource(command, gateway, view, &AssumeYes, config, &mut stdout).await
    } else {
        app::run_resource(command, gateway, view, &StdinConfirm, config, &mut stdout).await
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("devtrack.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
