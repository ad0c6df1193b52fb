//! User-facing notices
//!
//! Rebuild completions and schema repairs are surfaced to the host through a
//! [`Notifier`]. Hosts without their own message channel use [`TracingNotifier`].

use parking_lot::Mutex;
use tracing::info;

/// Kind of user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational message, e.g. a schema repair
    Info,
    /// Count-based completion summary of a rebuild
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn completion(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Completion,
            message: message.into(),
        }
    }
}

/// Sink for user-facing notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        info!(target: "pagepaths::notice", kind = ?notice.kind, "{}", notice.message);
    }
}

/// Keeps notices in memory for hosts that render them later
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
