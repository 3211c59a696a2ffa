//! Unix socket accepting `pause`/`resume` for a running job.
//!
//! Each connection carries a single command of at most 128 bytes and gets a
//! single line back before the server closes it.

use crate::watchdog::pause::PauseGate;
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

const MAX_COMMAND_LEN: usize = 128;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub const PAUSED_REPLY: &str = "task has been paused\n";
pub const RESUMED_REPLY: &str = "task will be resumed\n";
pub const UNKNOWN_REPLY: &str = "unknown command\n";

pub struct ControlServer {
    path: PathBuf,
    listener: UnixListener,
    gate: PauseGate,
}

impl ControlServer {
    /// Binds `path`. A leftover socket file from a dead job is replaced; a
    /// socket another job still answers on is an error.
    pub async fn bind(path: impl Into<PathBuf>, gate: PauseGate) -> io::Result<Self> {
        let path = path.into();
        if path.exists() {
            if UnixStream::connect(&path).await.is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "another job is listening on this socket",
                ));
            }
            warn!(path = %path.display(), "Removing stale control socket");
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "Control socket listening");
        Ok(ControlServer {
            path,
            listener,
            gate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serves commands until `stop` fires, then removes the socket file.
    /// Each connection is served on its own task.
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(
            async move {
                let mut connections = JoinSet::new();
                loop {
                    let stream = tokio::select! {
                        _ = stop.cancelled() => break,
                        Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                        accepted = self.listener.accept() => match accepted {
                            Ok((stream, _)) => stream,
                            Err(err) => {
                                warn!(error = %err, "Control socket accept failed");
                                break;
                            }
                        },
                    };
                    let gate = self.gate.clone();
                    connections.spawn(
                        async move {
                            if let Err(err) = handle(stream, &gate).await {
                                warn!(error = %err, "Control connection failed");
                            }
                        }
                        .in_current_span(),
                    );
                }
                connections.abort_all();

                if let Err(err) = std::fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %err, "Failed to remove control socket");
                }
            }
            .in_current_span(),
        )
    }
}

async fn handle(mut stream: UnixStream, gate: &PauseGate) -> io::Result<()> {
    let mut buf = [0u8; MAX_COMMAND_LEN];
    let n = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no command received"))??;

    let command = String::from_utf8_lossy(&buf[..n]);
    let reply = apply(command.trim(), gate);
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

fn apply(command: &str, gate: &PauseGate) -> &'static str {
    match command {
        "pause" => {
            if gate.pause() {
                info!("Job paused; it stops after the current batch");
            }
            PAUSED_REPLY
        }
        "resume" => {
            if gate.resume() {
                info!("Job resumed");
            }
            RESUMED_REPLY
        }
        other => {
            debug!(command = other, "Unknown control command");
            UNKNOWN_REPLY
        }
    }
}

/// Sends one command to a job's control socket and returns its reply.
pub async fn send_command(path: &Path, command: &str) -> io::Result<String> {
    let mut stream = UnixStream::connect(path).await?;
    stream.write_all(command.as_bytes()).await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply)
}
