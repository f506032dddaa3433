//! Remote secret objects as delivered by the secret store
//!
//! A [`RemoteSecret`] is read-only input. Its identity in the store is
//! `(namespace, name)`; only the name is used as the default credential id.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Label whose value selects the converter
pub const CREDENTIAL_TYPE_LABEL: &str = "zlayer.io/credentials-type";

/// Label overriding the default (secret name) credential id
pub const CREDENTIAL_ID_LABEL: &str = "zlayer.io/credentials-id";

/// Label selecting the credential scope (`global` or `system`)
pub const CREDENTIAL_SCOPE_LABEL: &str = "zlayer.io/credentials-scope";

/// Annotation carrying the credential description
pub const DESCRIPTION_ANNOTATION: &str = "zlayer.io/credentials-description";

/// Prefix of annotations that rebind a logical field name to another data key
pub const KEYBINDING_ANNOTATION_PREFIX: &str = "zlayer.io/credentials-keybinding-";

/// Object metadata of a remote secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// Secret name, unique within its namespace
    pub name: String,

    /// Namespace the secret lives in
    #[serde(default)]
    pub namespace: String,

    /// Labels (selectable)
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Annotations (not selectable)
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A labeled key-value secret object from the remote store
///
/// Data values are base64 text exactly as stored remotely; decoding happens
/// in [`crate::codec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSecret {
    /// Object metadata
    pub metadata: SecretMetadata,

    /// Field name to base64 payload, absent when the secret has no data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

impl RemoteSecret {
    /// Create an empty secret with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: SecretMetadata {
                name: name.into(),
                ..SecretMetadata::default()
            },
            data: None,
        }
    }

    /// Parse a secret from the store's JSON representation
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the document does not
    /// describe a secret.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Set the namespace (builder pattern)
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    /// Add a label (builder pattern)
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Set the credential type label (builder pattern)
    #[must_use]
    pub fn with_type(self, credential_type: impl Into<String>) -> Self {
        self.with_label(CREDENTIAL_TYPE_LABEL, credential_type)
    }

    /// Add an annotation (builder pattern)
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Add a raw (already base64 encoded) data entry (builder pattern)
    #[must_use]
    pub fn with_raw_data(mut self, key: impl Into<String>, encoded: impl Into<String>) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), encoded.into());
        self
    }

    /// Add a data entry, base64 encoding `value` (builder pattern)
    #[must_use]
    pub fn with_data(self, key: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        let encoded = STANDARD.encode(value.as_ref());
        self.with_raw_data(key, encoded)
    }

    /// Secret name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Secret namespace
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// All labels
    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }

    /// Look up a label value
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Look up an annotation value
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// The declared credential type
    #[must_use]
    pub fn credential_type(&self) -> Option<&str> {
        self.label(CREDENTIAL_TYPE_LABEL)
    }

    /// The data map if present and non-empty
    #[must_use]
    pub fn data(&self) -> Option<&BTreeMap<String, String>> {
        self.data.as_ref().filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let secret = RemoteSecret::new("db-creds")
            .with_namespace("ci")
            .with_type("usernamePassword")
            .with_annotation(DESCRIPTION_ANNOTATION, "database login")
            .with_data("username", "admin");

        assert_eq!(secret.name(), "db-creds");
        assert_eq!(secret.namespace(), "ci");
        assert_eq!(secret.credential_type(), Some("usernamePassword"));
        assert_eq!(
            secret.annotation(DESCRIPTION_ANNOTATION),
            Some("database login")
        );
        assert_eq!(secret.data().unwrap().get("username").unwrap(), "YWRtaW4=");
    }

    #[test]
    fn test_empty_data_is_absent() {
        let mut secret = RemoteSecret::new("empty");
        assert!(secret.data().is_none());

        secret.data = Some(BTreeMap::new());
        assert!(secret.data().is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r#"
        {
            "metadata": {
                "name": "deploy-key",
                "namespace": "ci",
                "labels": { "zlayer.io/credentials-type": "secretText" },
                "annotations": { "zlayer.io/credentials-description": "deploy token" }
            },
            "data": { "text": "c2VjcmV0" }
        }
        "#;

        let secret = RemoteSecret::from_json(json).unwrap();
        assert_eq!(secret.name(), "deploy-key");
        assert_eq!(secret.credential_type(), Some("secretText"));
        assert_eq!(secret.data().unwrap().get("text").unwrap(), "c2VjcmV0");
    }

    #[test]
    fn test_from_json_without_data() {
        let json = r#"{ "metadata": { "name": "bare" } }"#;
        let secret = RemoteSecret::from_json(json).unwrap();
        assert!(secret.data.is_none());
        assert!(secret.labels().is_empty());
    }
}
