//! `secretFile` converter

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, SecretBytes};

/// Converts `filename` + `data` secrets into a named file
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretFileConverter;

impl SecretFileConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "secretFile";
}

impl CredentialConverter for SecretFileConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let file_name = fields.require_text("filename")?;
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(ConversionError::new(format!(
                "{} credential has an invalid filename '{file_name}' (must be a bare file name)",
                Self::TYPE
            )));
        }
        let content = fields.require_bytes("data")?;

        build_credential(
            secret,
            CredentialKind::SecretFile {
                file_name,
                content: SecretBytes::new(content),
            },
        )
    }
}
