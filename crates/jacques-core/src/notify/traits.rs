use super::errors::NotifyError;

/// What the user did with a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResponse {
    /// The user clicked the notification or its action button.
    Activated,
    /// The user dismissed it.
    Dismissed,
    /// The backend cannot observe a response (fire-and-forget).
    NoResponse,
}

/// A platform notification mechanism.
///
/// `wait` asks the backend to block until the notification resolves so the
/// click can be reported; backends that cannot wait return `NoResponse`.
pub trait NotifierBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend can run on the current machine.
    fn is_available(&self) -> bool;

    fn send(&self, title: &str, body: &str, wait: bool) -> Result<NotifyResponse, NotifyError>;
}
