//! Terminal setup for focus reporting
//!
//! When attached, the terminal is put in raw mode with focus-change
//! reporting enabled so focus gained/lost arrive as input events. Provides
//! an RAII guard for safe cleanup on exit or panic.

use crossterm::{
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, stdout, IsTerminal};

/// Whether stdin/stdout are a TTY we can take over
pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Enable raw mode and focus-change reporting
///
/// # Errors
/// Returns error if terminal setup fails (e.g., not a TTY).
pub fn init() -> io::Result<()> {
    enable_raw_mode()?;
    execute!(stdout(), EnableFocusChange)?;
    Ok(())
}

/// Restore terminal to normal state
///
/// Safe to call multiple times.
pub fn restore() -> io::Result<()> {
    execute!(stdout(), DisableFocusChange)?;
    disable_raw_mode()?;
    Ok(())
}

/// RAII guard that restores terminal state on drop
///
/// Ensures the terminal leaves raw mode even if the daemon panics.
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = restore();
    }
}
