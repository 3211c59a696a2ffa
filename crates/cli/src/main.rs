use crate::{
    commands::{Commands, ControlCommand, RunArgs},
    conn::MySqlConnectionPinger,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::sql::mysql::options::MySqlConnectOptions;
use engine_runtime::execution::executor;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "tablemover",
    version,
    about = "Moves rows between MySQL tables in batches without losing any"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Initialize logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            eprintln!("{err}");
            err.exit_code(shutdown.is_shutdown_requested())
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run(args) => run_job(args, shutdown).await,
        Commands::Ctl { socket, command } => control(&socket, command).await,
        Commands::TestConn {
            address,
            username,
            password,
            database,
            charset,
        } => {
            MySqlConnectionPinger {
                options: MySqlConnectOptions {
                    address,
                    username,
                    password,
                    database,
                    charset,
                    pool_size: 1,
                },
            }
            .ping()
            .await
        }
    }
}

async fn run_job(args: RunArgs, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let json = args.json;
    let config = args.into_settings().validate()?;
    let statistics = config.statistics;

    shutdown.register_handlers();
    match executor::run(config, shutdown.cancel_token()).await {
        Ok(summary) => {
            if statistics {
                output::print_summary(&summary, json)?;
            }
            Ok(())
        }
        Err(failure) => {
            if statistics {
                output::print_summary(&failure.summary, json)?;
            }
            Err(failure.into())
        }
    }
}

#[cfg(unix)]
async fn control(socket: &Path, command: ControlCommand) -> Result<(), CliError> {
    let reply = engine_runtime::control::send_command(socket, command.as_str())
        .await
        .map_err(|source| CliError::Control {
            path: socket.to_path_buf(),
            source,
        })?;
    info!(command = command.as_str(), "Control command sent");
    print!("{reply}");
    Ok(())
}

#[cfg(not(unix))]
async fn control(socket: &Path, _command: ControlCommand) -> Result<(), CliError> {
    tracing::error!("Control sockets are only supported on Unix");
    Err(CliError::Control {
        path: socket.to_path_buf(),
        source: std::io::Error::from(std::io::ErrorKind::Unsupported),
    })
}
