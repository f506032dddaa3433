//! `secretText` converter

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, Secret};

/// Converts single `text` secrets such as API tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretTextConverter;

impl SecretTextConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "secretText";
}

impl CredentialConverter for SecretTextConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let text = fields.require_text("text")?;

        build_credential(
            secret,
            CredentialKind::SecretText {
                text: Secret::new(text),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert() {
        let secret = RemoteSecret::new("api-token").with_data("text", "ghp_abc123");
        let credential = SecretTextConverter.convert(&secret).unwrap();

        let CredentialKind::SecretText { text } = credential.kind else {
            panic!("wrong kind");
        };
        assert_eq!(text.expose(), "ghp_abc123");
    }

    #[test]
    fn test_non_utf8_text() {
        let secret = RemoteSecret::new("bin").with_data("text", [0xFF, 0xFF, 0xFF]);
        let err = SecretTextConverter.convert(&secret).unwrap_err();
        assert_eq!(
            err.message(),
            "secretText credential has an invalid text (must be base64 encoded UTF-8)"
        );
    }

    #[test]
    fn test_missing_text() {
        let secret = RemoteSecret::new("other").with_data("token", "x");
        let err = SecretTextConverter.convert(&secret).unwrap_err();
        assert_eq!(err.message(), "secretText credential is missing the text");
    }
}
