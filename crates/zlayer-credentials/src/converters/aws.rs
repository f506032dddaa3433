//! `aws` converter

use crate::codec::SecretFields;
use crate::converter::{build_credential, CredentialConverter};
use crate::error::ConversionError;
use crate::secret::RemoteSecret;
use crate::types::{Credential, CredentialKind, Secret};

/// Converts AWS access key secrets with optional role assumption settings
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsCredentialsConverter;

impl AwsCredentialsConverter {
    /// Type tag handled by this converter
    pub const TYPE: &'static str = "aws";
}

impl CredentialConverter for AwsCredentialsConverter {
    fn credential_type(&self) -> &str {
        Self::TYPE
    }

    fn convert(&self, secret: &RemoteSecret) -> Result<Credential, ConversionError> {
        let fields = SecretFields::new(secret, Self::TYPE)?;
        let access_key = fields.require_text("accessKey")?;
        let secret_key = fields.require_text("secretKey")?;
        let iam_role_arn = fields.optional_text("iamRoleArn")?;
        let iam_mfa_serial_number = fields.optional_text("iamMfaSerialNumber")?;

        if iam_mfa_serial_number.is_some() && iam_role_arn.is_none() {
            return Err(ConversionError::new(format!(
                "{} credential has an iamMfaSerialNumber but no iamRoleArn",
                Self::TYPE
            )));
        }

        build_credential(
            secret,
            CredentialKind::Aws {
                access_key,
                secret_key: Secret::new(secret_key),
                iam_role_arn,
                iam_mfa_serial_number,
            },
        )
    }
}
