use console::{style, Term};
use super::{Notification, NotificationLevel, Notifier};

/// Render a notification as a single styled terminal line.
pub fn render_notification(notification: &Notification) -> String {
    match notification.level {
        NotificationLevel::Success => format!(
            "  {} {}",
            style("✓").green().bold(),
            style(&notification.message).green(),
        ),
        NotificationLevel::Error => format!(
            "  {} {}",
            style("✗").red().bold(),
            style(&notification.message).red(),
        ),
    }
}

/// Writes notifications to stderr.
pub struct ConsoleNotifier {
    term: Term,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self { term: Term::stderr() }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleNotifier").finish()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.term.write_line(&render_notification(&notification)) {
            tracing::debug!(error = %e, "Failed to write notification to terminal");
        }
    }
}
