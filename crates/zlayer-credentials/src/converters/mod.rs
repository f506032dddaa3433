//! Built-in credential converters
//!
//! | Type tag | Converter |
//! |---|---|
//! | `usernamePassword` | [`UsernamePasswordConverter`] |
//! | `secretText` | [`SecretTextConverter`] |
//! | `secretFile` | [`SecretFileConverter`] |
//! | `basicSSHUserPrivateKey` | [`SshPrivateKeyConverter`] |
//! | `certificate` | [`CertificateConverter`] |
//! | `x509ClientCert` | [`X509ClientCertConverter`] |
//! | `aws` | [`AwsCredentialsConverter`] |
//! | `gitHubApp` | [`GitHubAppConverter`] |

use std::sync::Arc;

use crate::converter::CredentialConverter;

mod aws;
mod certificate;
mod github_app;
mod secret_file;
mod secret_text;
mod ssh_key;
mod username_password;
mod x509;

pub use aws::AwsCredentialsConverter;
pub use certificate::CertificateConverter;
pub use github_app::GitHubAppConverter;
pub use secret_file::SecretFileConverter;
pub use secret_text::SecretTextConverter;
pub use ssh_key::SshPrivateKeyConverter;
pub use username_password::UsernamePasswordConverter;
pub use x509::X509ClientCertConverter;

/// All built-in converters, one per type tag
#[must_use]
pub fn builtin() -> Vec<Arc<dyn CredentialConverter>> {
    vec![
        Arc::new(UsernamePasswordConverter),
        Arc::new(SecretTextConverter),
        Arc::new(SecretFileConverter),
        Arc::new(SshPrivateKeyConverter),
        Arc::new(CertificateConverter),
        Arc::new(X509ClientCertConverter),
        Arc::new(AwsCredentialsConverter),
        Arc::new(GitHubAppConverter),
    ]
}
