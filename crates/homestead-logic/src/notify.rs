//! Player notifications.
//!
//! Delivery is fire-and-forget: a failed send is logged and never turns a
//! committed operation into an error.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("notification to {recipient} failed: {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}

pub trait Notifier {
    fn send(&mut self, external_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Send and swallow any failure.
pub fn notify_best_effort<N: Notifier + ?Sized>(notifier: &mut N, external_id: &str, text: &str) {
    if let Err(err) = notifier.send(external_id, text) {
        log::warn!("{}", err);
    }
}

/// Keeps every message in memory. Used by tests and the headless harness.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Vec<(String, String)>,
    /// Reject every send, to exercise the best-effort path.
    pub offline: bool,
}

impl RecordingNotifier {
    pub fn messages_for(&self, external_id: &str) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|(to, _)| to == external_id)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&mut self, external_id: &str, text: &str) -> Result<(), NotifyError> {
        if self.offline {
            return Err(NotifyError {
                recipient: external_id.to_string(),
                reason: "notifier offline".into(),
            });
        }
        self.sent.push((external_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_swallowed() {
        let mut notifier = RecordingNotifier {
            offline: true,
            ..Default::default()
        };
        notify_best_effort(&mut notifier, "abc", "hello");
        assert!(notifier.sent.is_empty());

        notifier.offline = false;
        notify_best_effort(&mut notifier, "abc", "hello");
        assert_eq!(notifier.messages_for("abc"), vec!["hello"]);
    }
}
