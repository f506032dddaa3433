//! `certificate` converter (PKCS#12 keystore)

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, Secret, SecretBytes};

/// Converts `certificate` (keystore bytes) + `password` secrets
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateConverter;

impl CertificateConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "certificate";
}

impl CredentialConverter for CertificateConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let keystore = fields.require_bytes("certificate")?;
        if keystore.is_empty() {
            return Err(ConversionError::new(format!(
                "{} credential has an empty certificate",
                Self::TYPE
            )));
        }
        let password = fields.require_text("password")?;

        build_credential(
            secret,
            CredentialKind::Certificate {
                keystore: SecretBytes::new(keystore),
                password: Secret::new(password),
            },
        )
    }
}
