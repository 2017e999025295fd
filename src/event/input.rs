use super::Event;
use crate::focus::FocusSignal;
use crossterm::event::{Event as CrosstermEvent, EventStream, KeyCode, KeyEvent, KeyModifiers};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Listen for terminal focus reports and quit keys with graceful shutdown support
pub async fn listen(tx: mpsc::Sender<Event>, cancel: CancellationToken) {
    let mut events = EventStream::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Input listener cancelled");
                break;
            }
            next = events.next() => {
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        tracing::warn!("Terminal read error: {}", e);
                        continue;
                    }
                    None => break,
                };

                if let Some(event) = translate(&event) {
                    if tx.send(event).await.is_err() {
                        // Channel closed, exit
                        break;
                    }
                }
            }
        }
    }
}

/// Map a terminal event onto an application event
fn translate(event: &CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::FocusGained => Some(Event::Focus(FocusSignal::WindowFocused)),
        CrosstermEvent::FocusLost => Some(Event::Focus(FocusSignal::WindowBlurred)),
        CrosstermEvent::Key(key) if is_quit(key) => Some(Event::Quit),
        _ => None,
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_events_translate() {
        assert!(matches!(
            translate(&CrosstermEvent::FocusGained),
            Some(Event::Focus(FocusSignal::WindowFocused))
        ));
        assert!(matches!(
            translate(&CrosstermEvent::FocusLost),
            Some(Event::Focus(FocusSignal::WindowBlurred))
        ));
    }

    #[test]
    fn test_quit_keys() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);

        assert!(matches!(translate(&CrosstermEvent::Key(ctrl_c)), Some(Event::Quit)));
        assert!(matches!(translate(&CrosstermEvent::Key(q)), Some(Event::Quit)));
        assert!(translate(&CrosstermEvent::Key(plain_c)).is_none());
    }
}
