//! User Notifications
//!
//! Transient, user-visible notices (toasts) raised while a request is retried
//! or falls back to another model. The UI supplies the real implementation.

use parking_lot::Mutex;
use std::time::Duration;
use tracing::info;

/// How long the "connecting with backup key" notice stays up
pub const RETRY_NOTICE: Duration = Duration::from_millis(1000);

/// How long the "connected with backup key" notice stays up
pub const RECOVERY_NOTICE: Duration = Duration::from_millis(2000);

/// Sink for user-visible notices
pub trait Notifier: Send + Sync {
    /// Neutral notice; `None` leaves the duration to the UI
    fn message(&self, text: &str, duration: Option<Duration>);

    /// Something recovered
    fn success(&self, text: &str, duration: Option<Duration>);
}

/// Emits notices as log events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn message(&self, text: &str, _duration: Option<Duration>) {
        info!(notice = "message", "{}", text);
    }

    fn success(&self, text: &str, _duration: Option<Duration>) {
        info!(notice = "success", "{}", text);
    }
}

/// Kind of a recorded notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Message,
    Success,
}

/// A recorded notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub duration: Option<Duration>,
}

/// Keeps notices in memory for a front-end to drain
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    fn push(&self, kind: NoticeKind, text: &str, duration: Option<Duration>) {
        self.notices.lock().push(Notice {
            kind,
            text: text.to_string(),
            duration,
        });
    }
}

impl Notifier for MemoryNotifier {
    fn message(&self, text: &str, duration: Option<Duration>) {
        self.push(NoticeKind::Message, text, duration);
    }

    fn success(&self, text: &str, duration: Option<Duration>) {
        self.push(NoticeKind::Success, text, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_drains_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.message("one", Some(RETRY_NOTICE));
        notifier.success("two", None);

        let notices = notifier.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, NoticeKind::Message);
        assert_eq!(notices[0].duration, Some(RETRY_NOTICE));
        assert_eq!(notices[1].text, "two");
        assert!(notifier.drain().is_empty());
    }
}
