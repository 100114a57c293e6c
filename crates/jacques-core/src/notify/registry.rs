//! Backend selection.

use std::sync::Arc;

use tracing::debug;

use super::backends::{LinuxNotifierBackend, MacosNotifierBackend, NullNotifierBackend};
use super::traits::NotifierBackend;

/// Pick the first available platform backend, in registration order.
///
/// Falls back to the null backend so the engine never has to special-case a
/// missing notifier.
pub fn detect_backend() -> Arc<dyn NotifierBackend> {
    let candidates: Vec<Arc<dyn NotifierBackend>> = vec![
        Arc::new(MacosNotifierBackend),
        Arc::new(LinuxNotifierBackend),
    ];
    for backend in candidates {
        if backend.is_available() {
            debug!(event = "core.notify.backend_selected", backend = backend.name());
            return backend;
        }
    }
    debug!(event = "core.notify.backend_selected", backend = "null");
    Arc::new(NullNotifierBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_backend_always_returns_something() {
        let backend = detect_backend();
        assert!(!backend.name().is_empty());
    }
}
