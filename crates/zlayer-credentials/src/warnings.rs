//! Administrative warnings
//!
//! Configuration-shaped failures (bad selector, list-time connectivity or
//! auth errors) are surfaced to operators as a persistent warning with a
//! stable id, and cleared once a later list succeeds. Rendering is up to the
//! host; [`LoggingWarningSink`] just logs.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Id of the warning raised when the secret store cannot be listed
pub const SOURCE_UNAVAILABLE_WARNING: &str = "zlayer-credentials-source-unavailable";

/// Receiver of administrative warnings
pub trait WarningSink: Send + Sync {
    /// Raise or refresh the warning `id`
    fn raise(&self, id: &str, message: &str);

    /// Clear the warning `id` if it is raised
    fn clear(&self, id: &str);
}

/// Logs warnings through `tracing` and remembers which are active
#[derive(Debug, Default)]
pub struct LoggingWarningSink {
    active: Mutex<HashMap<String, String>>,
}

impl LoggingWarningSink {
    /// Create a sink with no active warnings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The message of an active warning
    #[must_use]
    pub fn active(&self, id: &str) -> Option<String> {
        self.active.lock().get(id).cloned()
    }
}

impl WarningSink for LoggingWarningSink {
    fn raise(&self, id: &str, message: &str) {
        tracing::error!(warning = %id, "{message}");
        self.active.lock().insert(id.to_string(), message.to_string());
    }

    fn clear(&self, id: &str) {
        if self.active.lock().remove(id).is_some() {
            tracing::info!(warning = %id, "administrative warning cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_and_clear() {
        let sink = LoggingWarningSink::new();
        assert!(sink.active(SOURCE_UNAVAILABLE_WARNING).is_none());

        sink.raise(SOURCE_UNAVAILABLE_WARNING, "connection refused");
        assert_eq!(
            sink.active(SOURCE_UNAVAILABLE_WARNING).as_deref(),
            Some("connection refused")
        );

        sink.raise(SOURCE_UNAVAILABLE_WARNING, "token expired");
        assert_eq!(
            sink.active(SOURCE_UNAVAILABLE_WARNING).as_deref(),
            Some("token expired")
        );

        sink.clear(SOURCE_UNAVAILABLE_WARNING);
        assert!(sink.active(SOURCE_UNAVAILABLE_WARNING).is_none());
    }
}
