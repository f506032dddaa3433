//! `x509ClientCert` converter

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, Secret};

/// Converts PEM client certificate, client key and server CA secrets
#[derive(Debug, Clone, Copy, Default)]
pub struct X509ClientCertConverter;

impl X509ClientCertConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "x509ClientCert";
}

impl CredentialConverter for X509ClientCertConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let client_certificate = fields.require_text("clientCertificate")?;
        let client_key = fields.require_text("clientKeySecret")?;
        let server_ca_certificate = fields.require_text("serverCaCertificate")?;

        build_credential(
            secret,
            CredentialKind::X509ClientCert {
                client_certificate,
                client_key: Secret::new(client_key),
                server_ca_certificate,
            },
        )
    }
}
