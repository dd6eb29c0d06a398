use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Internal failures. Request-level outcomes (no candidate, no road access,
/// timeout, ...) are statuses, not errors; this type covers bugs only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DesignError {
    #[error("internal invariant violated [{correlation_id}]: {message}")]
    Internal {
        correlation_id: String,
        message: String,
    },
}

impl DesignError {
    pub fn internal(message: impl Into<String>) -> Self {
        static SEQUENCE: AtomicU64 = AtomicU64::new(1);
        let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self::Internal {
            correlation_id: format!("gp-{n:08x}"),
            message: message.into(),
        }
    }
}
