//! Notification and navigation events emitted by the client core.
//!
//! The core never renders anything itself. It reports transient messages and
//! "go back to login" requests through a [`ViewSink`], which a presentation
//! layer implements. [`ChannelSink`] forwards them over a bounded
//! [`tokio::sync::mpsc`] channel for consumers that drain events in a loop.

use std::fmt;

use tokio::sync::mpsc;

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// The operation succeeded.
    Success,
    /// The operation failed; local state was left unchanged.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Presentation collaborator for the client core.
pub trait ViewSink: Send + Sync {
    /// Shows a transient notification.
    fn notify(&self, message: &str, level: Level);

    /// Sends the user back to the login entry point.
    fn redirect_to_login(&self);
}

/// An event produced by the client core for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A transient toast-style notification.
    Toast {
        /// Text to display.
        message: String,
        /// Severity.
        level: Level,
    },
    /// The session is no longer valid.
    RedirectToLogin,
}

/// [`ViewSink`] that forwards events over an mpsc channel.
///
/// Sending never blocks: when the channel is full or closed the event is
/// dropped and a warning is logged.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<UiEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, event: UiEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "dropping ui event");
        }
    }
}

impl ViewSink for ChannelSink {
    fn notify(&self, message: &str, level: Level) {
        self.send(UiEvent::Toast {
            message: message.to_string(),
            level,
        });
    }

    fn redirect_to_login(&self) {
        self.send(UiEvent::RedirectToLogin);
    }
}

impl<S: ViewSink + ?Sized> ViewSink for std::sync::Arc<S> {
    fn notify(&self, message: &str, level: Level) {
        (**self).notify(message, level);
    }

    fn redirect_to_login(&self) {
        (**self).redirect_to_login();
    }
}
