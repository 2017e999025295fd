//! CLI argument parsing
//!
//! Uses clap for argument parsing with derive macros. With no subcommand
//! the daemon runs; the other subcommands are thin clients of its socket.

use crate::event::ControlCommand;
use crate::focus::Visibility;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Get default socket path, preferring XDG_RUNTIME_DIR on Linux
fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("herald.sock");
    }
    PathBuf::from("/tmp/herald.sock")
}

/// Polls a notification backend for the signed-in user and shows each new
/// notification natively, opening its link when the app regains focus
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Control socket path (default: $XDG_RUNTIME_DIR/herald.sock or /tmp/herald.sock)
    #[arg(
        short,
        long,
        env = "HERALD_SOCKET",
        default_value_os_t = default_socket_path(),
        global = true
    )]
    pub socket: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Config file (default: ~/.config/herald/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subject to poll for from startup (same as a later `herald login`)
    #[arg(short, long, global = true)]
    pub user_id: Option<String>,

    /// Take over this terminal to report its focus changes (q/Esc quits)
    #[arg(short, long, default_value_t = false, global = true)]
    pub attach: bool,

    /// Notification backend base URL (overrides config)
    #[arg(long, env = "HERALD_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Seconds between poll cycles (overrides config)
    #[arg(short, long, global = true)]
    pub interval: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the daemon (default)
    Run,

    /// Set the subject a running daemon polls for
    Login {
        /// Numeric user id
        id: String,
    },

    /// Clear the subject; polling stops until the next login
    Logout,

    /// Run one poll cycle now and print its report
    Poll,

    /// Report that the application window gained focus
    Focus,

    /// Report that the application window lost focus
    Blur,

    /// Report that the application became visible
    Visible,

    /// Report that the application was hidden
    Hidden,

    /// Print the daemon's subject, queue sizes and counters
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print an example configuration file
    Config,
}

impl Commands {
    /// Control command a client subcommand sends, if it is one
    pub fn control_command(&self) -> Option<ControlCommand> {
        let command = match self {
            Self::Login { id } => ControlCommand::SetSubject {
                value: serde_json::Value::String(id.clone()),
            },
            Self::Logout => ControlCommand::ClearSubject,
            Self::Poll => ControlCommand::Poll,
            Self::Focus => ControlCommand::Focus,
            Self::Blur => ControlCommand::Blur,
            Self::Visible => ControlCommand::Visibility {
                state: Visibility::Visible,
            },
            Self::Hidden => ControlCommand::Visibility {
                state: Visibility::Hidden,
            },
            Self::Status => ControlCommand::Status,
            Self::Run | Self::Completions { .. } | Self::Config => return None,
        };
        Some(command)
    }
}

/// Generate shell completions and print to stdout
pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "herald", &mut io::stdout());
}
