//! Credential record types
//!
//! Sensitive values are held in [`Secret`] / [`SecretBytes`], which zeroize
//! on drop and print `[REDACTED]` in debug output.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::ConversionError;

/// Password, token or key text carried by a credential
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Wrap credential text
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// The plaintext
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Zeroize for Secret {
    fn zeroize(&mut self) {
        // Dropping the old SecretString wipes it.
        self.0 = SecretString::from(String::new());
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A sensitive binary value (keystores, file contents)
pub struct SecretBytes {
    inner: SecretBox<Vec<u8>>,
}

impl SecretBytes {
    /// Wrap a byte buffer
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            inner: SecretBox::new(Box::new(value)),
        }
    }

    /// Expose the bytes for use
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret().as_slice()
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Clone for SecretBytes {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_vec())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED {} bytes]", self.len())
    }
}

impl Zeroize for SecretBytes {
    fn zeroize(&mut self) {
        self.inner = SecretBox::new(Box::new(Vec::new()));
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

/// Visibility scope of a credential
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialScope {
    /// Visible to everything running under the host
    #[default]
    Global,
    /// Only visible to the host system itself
    System,
}

impl FromStr for CredentialScope {
    type Err = ConversionError;

    /// Case-insensitive parse of `global` / `system`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("global") {
            Ok(Self::Global)
        } else if s.eq_ignore_ascii_case("system") {
            Ok(Self::System)
        } else {
            Err(ConversionError::new(format!(
                "invalid scope '{s}', expected 'global' or 'system'"
            )))
        }
    }
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::System => f.write_str("system"),
        }
    }
}

/// Runtime type of a credential, used to filter cache reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialType {
    /// Username and password pair
    UsernamePassword,
    /// Opaque secret text (API token)
    SecretText,
    /// Named file with binary content
    SecretFile,
    /// SSH username with PEM private key
    SshPrivateKey,
    /// PKCS#12 keystore with password
    Certificate,
    /// PEM client certificate, client key and server CA
    X509ClientCert,
    /// AWS access key pair
    Aws,
    /// GitHub App id with PEM private key
    GitHubApp,
}

/// Type-specific credential payload
#[derive(Debug, Clone)]
pub enum CredentialKind {
    /// Username and password pair
    UsernamePassword {
        /// Login name
        username: String,
        /// Password
        password: Secret,
    },
    /// Opaque secret text
    SecretText {
        /// The secret
        text: Secret,
    },
    /// Named file with binary content
    SecretFile {
        /// File name presented to consumers
        file_name: String,
        /// File content
        content: SecretBytes,
    },
    /// SSH private key
    SshPrivateKey {
        /// Login name
        username: String,
        /// PEM encoded private key
        private_key: Secret,
        /// Optional key passphrase
        passphrase: Option<Secret>,
    },
    /// PKCS#12 keystore
    Certificate {
        /// Keystore bytes
        keystore: SecretBytes,
        /// Keystore password
        password: Secret,
    },
    /// X.509 client certificate
    X509ClientCert {
        /// PEM client certificate
        client_certificate: String,
        /// PEM client key
        client_key: Secret,
        /// PEM server CA certificate
        server_ca_certificate: String,
    },
    /// AWS credentials
    Aws {
        /// Access key id
        access_key: String,
        /// Secret access key
        secret_key: Secret,
        /// Role to assume
        iam_role_arn: Option<String>,
        /// MFA device serial for role assumption
        iam_mfa_serial_number: Option<String>,
    },
    /// GitHub App
    GitHubApp {
        /// Numeric application id
        app_id: String,
        /// PEM encoded private key
        private_key: Secret,
        /// Organisation or user the app is installed for
        owner: Option<String>,
    },
}

impl CredentialKind {
    /// The runtime type tag of this payload
    #[must_use]
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::UsernamePassword { .. } => CredentialType::UsernamePassword,
            Self::SecretText { .. } => CredentialType::SecretText,
            Self::SecretFile { .. } => CredentialType::SecretFile,
            Self::SshPrivateKey { .. } => CredentialType::SshPrivateKey,
            Self::Certificate { .. } => CredentialType::Certificate,
            Self::X509ClientCert { .. } => CredentialType::X509ClientCert,
            Self::Aws { .. } => CredentialType::Aws,
            Self::GitHubApp { .. } => CredentialType::GitHubApp,
        }
    }
}

/// A fully converted credential record
#[derive(Debug, Clone)]
pub struct Credential {
    /// Identifier, unique within the cache
    pub id: String,
    /// Visibility scope
    pub scope: CredentialScope,
    /// Free form description, empty by default
    pub description: String,
    /// Type-specific payload
    pub kind: CredentialKind,
}

impl Credential {
    /// Create a global credential with an empty description
    pub fn new(id: impl Into<String>, kind: CredentialKind) -> Self {
        Self {
            id: id.into(),
            scope: CredentialScope::Global,
            description: String::new(),
            kind,
        }
    }

    /// The runtime type tag
    #[must_use]
    pub fn credential_type(&self) -> CredentialType {
        self.kind.credential_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret-value");
        let debug_output = format!("{secret:?}");
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret-value"));
    }

    #[test]
    fn test_secret_bytes_debug_redacted() {
        let bytes = SecretBytes::new(vec![1, 2, 3]);
        assert_eq!(format!("{bytes:?}"), "[REDACTED 3 bytes]");
        assert_eq!(bytes.expose(), &[1, 2, 3]);
    }

    #[test]
    fn test_secret_from_text() {
        assert_eq!(Secret::from("token").expose(), "token");
        assert_eq!(Secret::from(String::from("token")).expose(), "token");
    }

    #[test]
    fn test_zeroize() {
        let mut secret = Secret::new("sensitive-data");
        secret.zeroize();
        assert_eq!(secret.expose(), "");

        let mut bytes = SecretBytes::new(vec![9; 16]);
        bytes.zeroize();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_scope_parse_case_insensitive() {
        assert_eq!("global".parse::<CredentialScope>().unwrap(), CredentialScope::Global);
        assert_eq!("GLOBAL".parse::<CredentialScope>().unwrap(), CredentialScope::Global);
        assert_eq!("System".parse::<CredentialScope>().unwrap(), CredentialScope::System);
        assert!("user".parse::<CredentialScope>().is_err());
        assert_eq!(CredentialScope::default(), CredentialScope::Global);
    }

    #[test]
    fn test_credential_debug_does_not_leak() {
        let credential = Credential::new(
            "db",
            CredentialKind::UsernamePassword {
                username: "admin".to_string(),
                password: Secret::new("hunter2"),
            },
        );
        let debug_output = format!("{credential:?}");
        assert!(debug_output.contains("admin"));
        assert!(!debug_output.contains("hunter2"));
        assert_eq!(credential.credential_type(), CredentialType::UsernamePassword);
        assert_eq!(credential.scope, CredentialScope::Global);
        assert!(credential.description.is_empty());
    }
}
