//! Remote secret store collaborator
//!
//! The store exposes a "list current state, then stream changes" protocol.
//! Transport, TLS and authentication live behind [`SecretSource`]; this crate
//! only consumes the list result and the event stream.
//!
//! ## Stream termination
//!
//! - `Some(Ok(WatchEvent::Error(..)))` is an in-band error sentinel; the
//!   session continues.
//! - `Some(Err(..))` is a transport failure; the session is over.
//! - `None` means the store closed the stream.
//!
//! Both terminal cases count as connectivity loss. Local shutdown is signalled
//! to the controller separately, never through the stream.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::SourceError;
use crate::secret::RemoteSecret;
use crate::selector::LabelSelector;

/// Result of a full list request
#[derive(Debug, Clone, Default)]
pub struct SecretList {
    /// Every secret matching the selector
    pub items: Vec<RemoteSecret>,
    /// Token to resume watching from without missing events
    pub resource_version: String,
}

/// Incremental change delivered on a watch stream
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A matching secret appeared
    Added(RemoteSecret),
    /// A matching secret changed
    Modified(RemoteSecret),
    /// A matching secret was deleted
    Deleted(RemoteSecret),
    /// In-band error reported by the store
    Error(String),
}

impl WatchEvent {
    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "ADDED",
            Self::Modified(_) => "MODIFIED",
            Self::Deleted(_) => "DELETED",
            Self::Error(_) => "ERROR",
        }
    }
}

/// Stream of watch events; ends when the store closes the watch
pub type WatchStream = BoxStream<'static, Result<WatchEvent, SourceError>>;

/// List + watch access to the remote secret store
#[async_trait]
pub trait SecretSource: Send + Sync + 'static {
    /// List every secret matching `selector`
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] on transport, authentication or request failure.
    async fn list(&self, selector: &LabelSelector) -> Result<SecretList, SourceError>;

    /// Open a watch for secrets matching `selector`, starting after `resource_version`
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the watch cannot be established.
    async fn watch(
        &self,
        selector: &LabelSelector,
        resource_version: &str,
    ) -> Result<WatchStream, SourceError>;
}

#[async_trait]
impl<T: SecretSource + ?Sized> SecretSource for Arc<T> {
    async fn list(&self, selector: &LabelSelector) -> Result<SecretList, SourceError> {
        (**self).list(selector).await
    }

    async fn watch(
        &self,
        selector: &LabelSelector,
        resource_version: &str,
    ) -> Result<WatchStream, SourceError> {
        (**self).watch(selector, resource_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        assert_eq!(WatchEvent::Added(RemoteSecret::new("a")).kind(), "ADDED");
        assert_eq!(WatchEvent::Modified(RemoteSecret::new("a")).kind(), "MODIFIED");
        assert_eq!(WatchEvent::Deleted(RemoteSecret::new("a")).kind(), "DELETED");
        assert_eq!(WatchEvent::Error("gone".to_string()).kind(), "ERROR");
    }
}
