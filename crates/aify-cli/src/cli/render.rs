use aify_core::constants::CURSOR_MARKER;
use aify_core::models::{Message, Role};
use aify_core::SessionEvent;

pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";
pub const DIM: &str = "\x1b[2m";
pub const RESET: &str = "\x1b[0m";

pub const PROMPT: &str = "> ";

/// Turns session events into terminal output. The session reports the whole
/// pending reply on every token; only the unseen suffix is written.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::RunStarted { .. } => {
                self.printed = 0;
                Some(format!("{CYAN}assistant:{RESET} "))
            }
            SessionEvent::ReplyUpdated { display } => {
                let text = display.strip_suffix(CURSOR_MARKER).unwrap_or(display);
                let fresh = text.get(self.printed..).unwrap_or_default();
                self.printed = text.len();
                (!fresh.is_empty()).then(|| fresh.to_string())
            }
            SessionEvent::ReplyCommitted { .. } => Some(self.finish(String::new())),
            SessionEvent::RunFailed { error: Some(error) } => {
                Some(self.finish(format!("{RED}error: {error}{RESET}\n")))
            }
            SessionEvent::RunFailed { error: None } => Some(self.finish(String::new())),
            SessionEvent::RunAborted { .. } => Some(self.finish(format!("{DIM}[aborted]{RESET}\n"))),
            // The caller reports the transport error itself
            SessionEvent::RunInterrupted { .. } => Some(self.finish(String::new())),
            SessionEvent::HistoryLoaded { .. } => None,
        }
    }

    fn finish(&mut self, tail: String) -> String {
        self.printed = 0;
        format!("\n{tail}")
    }
}

pub fn history_line(message: &Message) -> String {
    match message.role {
        Role::User => format!("{DIM}you:{RESET} {}", message.content),
        Role::Assistant => format!("{CYAN}assistant:{RESET} {}", message.content),
    }
}

pub fn error_line(error: &impl std::fmt::Display) -> String {
    format!("{RED}error: {error}{RESET}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated(text: &str) -> SessionEvent {
        SessionEvent::ReplyUpdated {
            display: format!("{text}{CURSOR_MARKER}"),
        }
    }

    #[test]
    fn test_prints_only_new_suffix() {
        let mut printer = ReplyPrinter::new();
        assert_eq!(printer.render(&updated("Hi")).as_deref(), Some("Hi"));
        assert_eq!(printer.render(&updated("Hi there")).as_deref(), Some(" there"));
        assert_eq!(printer.render(&updated("Hi there")), None);
    }

    #[test]
    fn test_failure_prints_error_and_resets() {
        let mut printer = ReplyPrinter::new();
        printer.render(&updated("par"));
        let out = printer
            .render(&SessionEvent::RunFailed {
                error: Some("Timeout.".to_string()),
            })
            .unwrap();
        assert!(out.contains("error: Timeout."));

        assert_eq!(printer.render(&updated("new")).as_deref(), Some("new"));
    }

    #[test]
    fn test_multibyte_tokens() {
        let mut printer = ReplyPrinter::new();
        assert_eq!(printer.render(&updated("héllo")).as_deref(), Some("héllo"));
        assert_eq!(printer.render(&updated("héllo wörld")).as_deref(), Some(" wörld"));
    }

    #[test]
    fn test_history_line_labels_roles() {
        assert!(history_line(&Message::user("hi")).ends_with("you:\x1b[0m hi"));
        assert!(history_line(&Message::assistant("yo")).contains("assistant:"));
    }

    #[test]
    fn test_interrupted_run_closes_the_reply_line() {
        let mut printer = ReplyPrinter::new();
        printer.render(&updated("par"));
        let out = printer.render(&SessionEvent::RunInterrupted {
            reason: "connection reset".to_string(),
        });
        assert_eq!(out.as_deref(), Some("\n"));
        assert_eq!(printer.render(&updated("next")).as_deref(), Some("next"));
    }
}
