use parking_lot::Mutex;
use super::{Notification, Notifier};

/// Queues notifications for a UI to drain on its next frame.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    queue: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued notification, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.queue.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.queue.lock().iter().filter(|n| n.is_error()).count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.queue.lock().push(notification);
    }
}
