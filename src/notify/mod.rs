//! Transient user-visible notifications ("toasts").
//!
//! The request executor emits exactly one error notification per failed
//! request and the mutation dispatcher emits one success notification per
//! successful mutation. Where they end up is the [`Notifier`]'s business.

pub mod terminal;
pub mod memory;

use std::sync::Arc;
use tracing::{info, warn};

pub use self::terminal::ConsoleNotifier;
pub use self::memory::MemoryNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Routes notifications into the log. Used when no surface is attached.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!(message = %notification.message, "notification"),
            NotificationLevel::Error => warn!(message = %notification.message, "notification"),
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}
