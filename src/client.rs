//! Control socket client used by the `login`/`poll`/`status`/... subcommands
//!
//! Sends one JSON command line to a running daemon and prints its reply.

use crate::event::{ControlCommand, ControlReply};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Manual polls include a backend fetch, so the reply may take a while
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Send one command and wait for the daemon's reply
pub async fn send(socket_path: &Path, command: &ControlCommand) -> Result<ControlReply> {
    if !socket_path.exists() {
        return Err(eyre!(
            "no daemon socket at {} (is `herald run` running?)",
            socket_path.display()
        ));
    }

    let mut stream = timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path))
        .await
        .map_err(|_| eyre!("timed out connecting to {}", socket_path.display()))?
        .wrap_err_with(|| format!("failed to connect to {}", socket_path.display()))?;

    let json = serde_json::to_string(command)?;
    stream.write_all(format!("{json}\n").as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = timeout(REPLY_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| eyre!("timed out waiting for daemon reply"))??;
    if read == 0 {
        return Err(eyre!("daemon closed the connection without replying"));
    }

    let reply: ControlReply =
        serde_json::from_str(line.trim()).wrap_err("daemon sent an unreadable reply")?;
    Ok(reply)
}

/// Send a command and print the outcome. A refused command is an error exit.
pub async fn run(socket_path: &Path, command: ControlCommand) -> Result<()> {
    tracing::debug!(?command, "Sending control command");
    let reply = send(socket_path, &command).await?;

    if !reply.ok {
        return Err(eyre!(
            "daemon refused command: {}",
            reply.error.as_deref().unwrap_or("unknown error")
        ));
    }

    match reply.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("ok"),
    }
    Ok(())
}
