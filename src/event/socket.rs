use super::{ControlCommand, ControlReply, Event};
use color_eyre::Result;
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::{timeout, Duration};

/// Maximum concurrent connections to prevent resource exhaustion
const MAX_CONNECTIONS: usize = 100;

/// Socket receive buffer size (commands are well under 1KB)
const SOCKET_RECV_BUF: usize = 4096;

/// How long a client gets to send its command line
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a command may take to be answered (a manual poll includes a fetch)
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Listen for control commands on Unix socket
pub async fn listen(tx: mpsc::Sender<Event>, socket_path: &Path) -> Result<()> {
    // Remove existing socket file
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    // Create socket with socket2 for buffer tuning
    let socket = socket2::Socket::new(socket2::Domain::UNIX, socket2::Type::STREAM, None)?;

    // OS may clamp to minimum, which is fine
    if let Err(e) = socket.set_recv_buffer_size(SOCKET_RECV_BUF) {
        tracing::debug!("Could not set recv buffer size: {}", e);
    }

    socket.bind(&socket2::SockAddr::unix(socket_path)?)?;
    socket.listen(128)?;
    socket.set_nonblocking(true)?;

    // Convert to tokio UnixListener
    let std_listener: std::os::unix::net::UnixListener =
        unsafe { std::os::unix::net::UnixListener::from_raw_fd(socket.into_raw_fd()) };
    let listener = UnixListener::from_std(std_listener)?;

    tracing::info!("Listening on {:?}", socket_path);

    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    // Backoff state for accept errors
    let mut backoff_ms: u64 = 0;
    const MAX_BACKOFF_MS: u64 = 5000;

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                backoff_ms = 0;

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!(
                            "Connection limit reached ({} max), dropping connection",
                            MAX_CONNECTIONS
                        );
                        continue;
                    }
                };

                let tx = tx.clone();
                tokio::spawn(async move {
                    // Permit is held until this task completes
                    let _permit = permit;
                    handle_connection(stream, tx).await;
                });
            }
            Err(e) => {
                tracing::error!("Accept error: {}", e);

                // Exponential backoff to prevent CPU spin on persistent errors
                if backoff_ms == 0 {
                    backoff_ms = 100;
                } else {
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }

                tracing::debug!("Backing off for {}ms", backoff_ms);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Read one command line, dispatch it, write one reply line
async fn handle_connection(stream: UnixStream, tx: mpsc::Sender<Event>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let reply = match timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => return, // Stream closed
        Ok(Ok(_)) if line.trim().is_empty() => return,
        Ok(Ok(_)) => match serde_json::from_str::<ControlCommand>(line.trim()) {
            Ok(command) => {
                tracing::debug!("Received command: {:?}", command);
                dispatch(command, &tx).await
            }
            Err(e) => {
                tracing::warn!("Failed to parse command: {} - {}", e, line.trim());
                ControlReply::error(format!("invalid command: {e}"))
            }
        },
        Ok(Err(e)) => {
            tracing::warn!("Read error: {}", e);
            return;
        }
        Err(_) => {
            tracing::debug!("Read timeout (connection may be stale)");
            return;
        }
    };

    let Ok(json) = serde_json::to_string(&reply) else {
        return;
    };
    let stream = reader.get_mut();
    if let Err(e) = stream.write_all(format!("{json}\n").as_bytes()).await {
        tracing::debug!("Failed to write reply: {}", e);
    }
    let _ = stream.shutdown().await;
}

async fn dispatch(command: ControlCommand, tx: &mpsc::Sender<Event>) -> ControlReply {
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx
        .send(Event::Control {
            command,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        return ControlReply::error("daemon is shutting down");
    }

    match timeout(REPLY_TIMEOUT, reply_rx).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(_)) => ControlReply::error("command dropped"),
        Err(_) => ControlReply::error("timed out waiting for daemon"),
    }
}
