//! `usernamePassword` converter

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, Secret};

/// Converts `username` + `password` secrets
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernamePasswordConverter;

impl UsernamePasswordConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "usernamePassword";
}

impl CredentialConverter for UsernamePasswordConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let username = fields.require_text("username")?;
        let password = fields.require_text("password")?;

        build_credential(
            secret,
            CredentialKind::UsernamePassword {
                username,
                password: Secret::new(password),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::KEYBINDING_ANNOTATION_PREFIX;
    use crate::types::CredentialScope;

    #[test]
    fn test_convert() {
        let secret = RemoteSecret::new("a-test-usernamepass")
            .with_type(UsernamePasswordConverter::TYPE)
            .with_data("username", "myUsername")
            .with_data("password", "Pa$$word");

        let credential = UsernamePasswordConverter.convert(&secret).unwrap();
        assert_eq!(credential.id, "a-test-usernamepass");
        assert_eq!(credential.scope, CredentialScope::Global);
        match credential.kind {
            CredentialKind::UsernamePassword { username, password } => {
                assert_eq!(username, "myUsername");
                assert_eq!(password.expose(), "Pa$$word");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_convert_with_key_bindings() {
        let secret = RemoteSecret::new("mapped")
            .with_annotation(format!("{KEYBINDING_ANNOTATION_PREFIX}username"), "user")
            .with_annotation(format!("{KEYBINDING_ANNOTATION_PREFIX}password"), "pass")
            .with_data("user", "alice")
            .with_data("pass", "s3cret");

        let credential = UsernamePasswordConverter.convert(&secret).unwrap();
        let CredentialKind::UsernamePassword { username, password } = credential.kind else {
            panic!("wrong kind");
        };
        assert_eq!(username, "alice");
        assert_eq!(password.expose(), "s3cret");
    }

    #[test]
    fn test_missing_password() {
        let secret = RemoteSecret::new("half").with_data("username", "bob");
        let err = UsernamePasswordConverter.convert(&secret).unwrap_err();
        assert_eq!(
            err.message(),
            "usernamePassword credential is missing the password"
        );
    }

    #[test]
    fn test_no_data() {
        let err = UsernamePasswordConverter
            .convert(&RemoteSecret::new("empty"))
            .unwrap_err();
        assert!(err.message().contains("no data"));
    }

    #[test]
    fn test_corrupt_username() {
        let secret = RemoteSecret::new("bad")
            .with_raw_data("username", "$$$")
            .with_data("password", "x");
        let err = UsernamePasswordConverter.convert(&secret).unwrap_err();
        assert!(err.message().contains("invalid username"));
    }
}
