pub mod input;
pub mod socket;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::focus::{FocusSignal, Visibility};

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Command from the host embedder over the control socket
    Control {
        command: ControlCommand,
        reply: oneshot::Sender<ControlReply>,
    },
    /// Focus transition reported by the attached terminal
    Focus(FocusSignal),
    /// Quit requested from the attached terminal
    Quit,
}

/// Command sent over the Unix socket, one JSON line per connection
///
/// ```json
/// {"command": "set_subject", "value": 42}
/// {"command": "clear_subject"}
/// {"command": "poll"}
/// {"command": "visibility", "state": "visible"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Set the polled subject; `value` may be a number or numeric string
    SetSubject { value: Value },
    /// Forget the subject (logout)
    ClearSubject,
    /// Run one poll cycle now and return its report
    Poll,
    /// Application window gained focus
    Focus,
    /// Application window lost focus
    Blur,
    /// Application visibility changed
    Visibility { state: Visibility },
    /// Report subject, dedupe and queue sizes, counters
    Status,
}

impl ControlCommand {
    /// Focus transition carried by this command, if it is one
    pub fn focus_signal(&self) -> Option<FocusSignal> {
        match self {
            Self::Focus => Some(FocusSignal::WindowFocused),
            Self::Blur => Some(FocusSignal::WindowBlurred),
            Self::Visibility { state } => Some(FocusSignal::Visibility(*state)),
            _ => None,
        }
    }
}

/// Single-line JSON reply written back on the same connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ControlReply {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            data: None,
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            ok: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_subject_accepts_any_value() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{"command": "set_subject", "value": "42"}"#).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetSubject {
                value: json!("42")
            }
        );

        let cmd: ControlCommand =
            serde_json::from_str(r#"{"command": "set_subject", "value": 42}"#).unwrap();
        assert_eq!(cmd, ControlCommand::SetSubject { value: json!(42) });
    }

    #[test]
    fn test_unit_commands() {
        for (line, expected) in [
            (r#"{"command": "clear_subject"}"#, ControlCommand::ClearSubject),
            (r#"{"command": "poll"}"#, ControlCommand::Poll),
            (r#"{"command": "focus"}"#, ControlCommand::Focus),
            (r#"{"command": "blur"}"#, ControlCommand::Blur),
            (r#"{"command": "status"}"#, ControlCommand::Status),
        ] {
            let cmd: ControlCommand = serde_json::from_str(line).unwrap();
            assert_eq!(cmd, expected);
        }
    }

    #[test]
    fn test_visibility_command() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{"command": "visibility", "state": "visible"}"#).unwrap();
        assert_eq!(
            cmd.focus_signal(),
            Some(FocusSignal::Visibility(Visibility::Visible))
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<ControlCommand>(r#"{"command": "reboot"}"#).is_err());
        assert!(serde_json::from_str::<ControlCommand>(r#"{"command": "set_subject"}"#).is_err());
    }

    #[test]
    fn test_reply_shape() {
        let line = serde_json::to_string(&ControlReply::ok()).unwrap();
        assert_eq!(line, r#"{"ok":true}"#);

        let reply: ControlReply =
            serde_json::from_str(r#"{"ok":false,"error":"bad subject"}"#).unwrap();
        assert_eq!(reply, ControlReply::error("bad subject"));
    }
}
