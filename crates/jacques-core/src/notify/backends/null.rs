//! No-op backend for unsupported platforms and tests.

use crate::notify::errors::NotifyError;
use crate::notify::traits::{NotifierBackend, NotifyResponse};

pub struct NullNotifierBackend;

impl NotifierBackend for NullNotifierBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn send(&self, _title: &str, _body: &str, _wait: bool) -> Result<NotifyResponse, NotifyError> {
        Ok(NotifyResponse::NoResponse)
    }
}
