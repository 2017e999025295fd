// Clippy configuration: enable pedantic but allow overly strict lints
#![allow(clippy::missing_errors_doc)] // Internal functions don't need # Errors docs
#![allow(clippy::missing_panics_doc)] // Internal functions don't need # Panics docs
#![allow(clippy::must_use_candidate)] // Not all getters need #[must_use]
#![allow(clippy::module_name_repetitions)] // e.g., NotificationId in notification module is fine
#![allow(clippy::doc_markdown)] // Don't require backticks around JSON, DBus, etc.
#![allow(clippy::too_many_lines)] // Some functions are naturally long
#![allow(clippy::struct_excessive_bools)] // Config structs can have multiple bool fields
#![allow(clippy::cast_possible_truncation)] // We're careful with our casts
#![allow(clippy::significant_drop_tightening)] // Lock guard drops are intentional
#![allow(clippy::redundant_closure_for_method_calls)] // Sometimes closures are clearer
#![allow(clippy::if_not_else)] // Negative conditions can be clearer for early returns
#![allow(clippy::match_same_arms)] // Explicit arms are clearer than combined patterns
#![allow(clippy::single_match_else)] // match with else is fine for Result handling
#![allow(clippy::manual_let_else)] // if-let is clearer for multi-line error handling
#![allow(clippy::items_after_statements)] // Helper closures can be defined inline
#![allow(clippy::needless_pass_by_value)] // PathBuf by value is fine for config loading

//! Herald - native notifications for a polled notification backend
//!
//! A single Rust binary that provides both:
//! - Daemon mode: polls `<base_url>/notifications?user_id=<id>` for the
//!   signed-in user, shows each new notification natively and opens its
//!   link the next time the application regains focus
//! - Client mode: subcommands that drive a running daemon over its socket
//!
//! Usage:
//!   herald --user-id 42        # Start the daemon polling for user 42
//!   herald login 43            # Switch a running daemon to user 43
//!   herald focus               # Tell the daemon the app regained focus

mod cli;
mod client;
mod config;
mod errors;
mod event;
mod focus;
mod identity;
mod notification;
mod notify;
mod poll;
mod redirect;
mod sink;
mod source;
mod state;
mod telemetry;
mod terminal;

use clap::Parser;
use cli::{Cli, Commands};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use config::HeraldConfig;
use event::{ControlCommand, ControlReply, Event};
use focus::{FocusSignal, FocusWatcher};
use notify::{DesktopNotifier, Notifier};
use poll::Poller;
use redirect::SystemNavigator;
use sink::NotificationSink;
use source::HttpSource;
use state::SharedState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type DaemonPoller = Poller<HttpSource, DesktopNotifier>;

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("/tmp/herald/logs"),
        |dirs| dirs.cache_dir().join("herald").join("logs"),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(*shell);
            return Ok(());
        }
        Some(Commands::Config) => {
            print!("{}", HeraldConfig::example());
            return Ok(());
        }
        Some(Commands::Run) | None => {
            // Daemon mode: continue with full setup
        }
        Some(command) => {
            let control = command
                .control_command()
                .ok_or_else(|| eyre!("{command:?} is not a daemon command"))?;
            return client::run(&cli.socket, control).await;
        }
    }

    color_eyre::install()?;

    // Setup file logging with rotation
    let log_dir = get_log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "herald.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Raw mode owns the terminal when attached, so stderr only gets logs otherwise
    let log_filter = format!("herald={}", cli.log_level);
    let stderr_layer = (!cli.attach).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(stderr_layer)
        .init();

    tracing::info!("Starting herald v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {:?}", log_dir);
    tracing::debug!("Socket path: {:?}", cli.socket);

    let config = load_config(&cli)?;
    run_daemon(&cli, &config).await
}

/// Load the config file and apply CLI overrides
fn load_config(cli: &Cli) -> Result<HeraldConfig> {
    let mut config = cli
        .config
        .clone()
        .map_or_else(HeraldConfig::load, HeraldConfig::load_from_path);

    if let Some(base_url) = &cli.base_url {
        config.backend.base_url.clone_from(base_url);
    }
    if let Some(interval) = cli.interval {
        config.poll.interval_secs = interval;
    }
    config.validate()?;

    tracing::info!(
        base_url = %config.backend.base_url,
        interval_secs = config.poll.interval_secs,
        notifications = config.notifications.enabled,
        "Loaded config"
    );
    Ok(config)
}

async fn run_daemon(cli: &Cli, config: &HeraldConfig) -> Result<()> {
    let state = Arc::new(SharedState::new());
    if let Some(user_id) = &cli.user_id {
        state
            .set_subject(&serde_json::Value::String(user_id.clone()))
            .await?;
    }

    let notifier = DesktopNotifier::new(&config.notifications);
    if !notifier.is_available() {
        tracing::warn!("Native notifications unavailable, deliveries will be skipped");
    }
    let sink = NotificationSink::new(
        notifier,
        state.clone(),
        config.notifications.defer_only_when_unfocused,
    );
    let source = HttpSource::new(config.backend.base_url.clone(), config.fetch_timeout());
    let poller = Arc::new(Poller::new(state.clone(), source, sink));

    let app_url = config
        .redirects
        .app_url
        .as_deref()
        .map(url::Url::parse)
        .transpose()?;
    let navigator = SystemNavigator::new(app_url, &config.redirects.allowed_schemes);
    if !navigator.resolves_relative() {
        tracing::warn!("redirects.app_url is not set, relative redirect targets will be dropped");
    }
    let watcher = FocusWatcher::new(state.clone(), navigator);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::channel(100);
    let (focus_tx, focus_rx) = mpsc::channel(32);

    // Spawn socket listener
    let socket_path = cli.socket.clone();
    let socket_tx = event_tx.clone();
    let socket_handle = tokio::spawn(async move {
        if let Err(e) = event::socket::listen(socket_tx, &socket_path).await {
            tracing::error!("Socket listener error: {}", e);
        }
    });

    let poll_handle = tokio::spawn(poller.clone().run(config.poll_interval(), cancel.clone()));
    let focus_handle = tokio::spawn(watcher.run(focus_rx, cancel.clone()));

    // Attached: raw mode with focus reporting, restored by the guard on exit
    let (input_handle, _terminal_guard) = if cli.attach {
        if !terminal::is_interactive() {
            return Err(eyre!("--attach needs an interactive terminal"));
        }
        terminal::init()?;
        let guard = terminal::TerminalGuard;
        let input_tx = event_tx.clone();
        let input_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            event::input::listen(input_tx, input_cancel).await;
        });
        (Some(handle), Some(guard))
    } else {
        (None, None)
    };
    drop(event_tx);

    let interval = config.poll_interval();
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    Event::Control { command, reply } => {
                        handle_command(command, reply, &state, &poller, &focus_tx, interval).await;
                    }
                    Event::Focus(signal) => forward_focus(&focus_tx, signal).await,
                    Event::Quit => {
                        tracing::info!("Quit requested from terminal");
                        break;
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for ctrl-c: {}", e);
                }
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    // Graceful shutdown: let an in-flight cycle finish, then stop everything
    cancel.cancel();
    socket_handle.abort();
    if let Some(handle) = input_handle {
        handle.abort();
    }
    if tokio::time::timeout(Duration::from_secs(10), poll_handle)
        .await
        .is_err()
    {
        tracing::warn!("Poll loop did not stop in time");
    }
    focus_handle.abort();

    let redirects = state.redirects.lock().await;
    if !redirects.is_empty() {
        tracing::info!(pending = redirects.len(), "Dropping undelivered redirects");
    }
    drop(redirects);

    if cli.socket.exists() {
        let _ = std::fs::remove_file(&cli.socket);
    }

    tracing::info!("Herald stopped");
    Ok(())
}

async fn forward_focus(focus_tx: &mpsc::Sender<FocusSignal>, signal: FocusSignal) {
    if focus_tx.send(signal).await.is_err() {
        tracing::warn!(?signal, "Focus watcher gone, dropping signal");
    }
}

async fn handle_command(
    command: ControlCommand,
    reply: tokio::sync::oneshot::Sender<ControlReply>,
    state: &Arc<SharedState>,
    poller: &Arc<DaemonPoller>,
    focus_tx: &mpsc::Sender<FocusSignal>,
    interval: Duration,
) {
    if let Some(signal) = command.focus_signal() {
        forward_focus(focus_tx, signal).await;
        let _ = reply.send(ControlReply::ok());
        return;
    }

    let response = match command {
        ControlCommand::SetSubject { value } => match state.set_subject(&value).await {
            Ok(subject) => ControlReply::with_data(serde_json::json!({ "subject": subject })),
            Err(e) => ControlReply::error(e.to_string()),
        },
        ControlCommand::ClearSubject => {
            state.clear_subject().await;
            ControlReply::ok()
        }
        ControlCommand::Poll => {
            // The cycle may take a full fetch timeout; answer from its own task
            let poller = poller.clone();
            tokio::spawn(async move {
                let report = poller.poll_once().await;
                let response = match serde_json::to_value(&report) {
                    Ok(data) => ControlReply::with_data(data),
                    Err(e) => ControlReply::error(e.to_string()),
                };
                let _ = reply.send(response);
            });
            return;
        }
        ControlCommand::Status => {
            let snapshot = state.snapshot().await;
            ControlReply::with_data(serde_json::json!({
                "state": snapshot,
                "metrics": telemetry::MetricsSnapshot::capture(),
                "interval_secs": interval.as_secs(),
            }))
        }
        // Forwarded to the focus watcher above
        ControlCommand::Focus | ControlCommand::Blur | ControlCommand::Visibility { .. } => {
            ControlReply::ok()
        }
    };
    let _ = reply.send(response);
}
