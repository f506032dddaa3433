//! Secret to credential conversion
//!
//! A [`CredentialConverter`] claims one credential type tag and turns a
//! [`RemoteSecret`] carrying that tag into a [`Credential`]. Converters are
//! pure: no I/O and no shared mutable state.
//!
//! The [`ConverterRegistry`] holds the converters and dispatches on the
//! secret's type label. Registering two converters for the same tag is
//! rejected up front rather than resolved by registration order.

use std::fmt;
use std::sync::Arc;

use crate::converters;
use crate::error::{ConversionError, CredentialsError, Result};
use crate::secret::{
    RemoteSecret, CREDENTIAL_ID_LABEL, CREDENTIAL_SCOPE_LABEL, DESCRIPTION_ANNOTATION,
};
use crate::types::{Credential, CredentialKind, CredentialScope};

/// Converts secrets of one type tag into credentials
pub trait CredentialConverter: Send + Sync {
    /// The type tag this converter handles
    fn credential_type(&self) -> &str;

    /// Whether this converter handles `credential_type`
    fn can_convert(&self, credential_type: &str) -> bool {
        credential_type == self.credential_type()
    }

    /// Convert a secret into a fully populated credential
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] with a field-specific message when the
    /// secret's data is missing or malformed.
    fn convert(&self, secret: &RemoteSecret) -> std::result::Result<Credential, ConversionError>;
}

/// Signature of a closure-backed converter
pub type ConvertFn =
    dyn Fn(&RemoteSecret) -> std::result::Result<Credential, ConversionError> + Send + Sync;

/// Adapter registering a plain function under a type tag
pub struct FnConverter {
    credential_type: String,
    convert: Box<ConvertFn>,
}

impl FnConverter {
    /// Wrap `convert` as the converter for `credential_type`
    pub fn new<F>(credential_type: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&RemoteSecret) -> std::result::Result<Credential, ConversionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            credential_type: credential_type.into(),
            convert: Box::new(convert),
        }
    }
}

impl CredentialConverter for FnConverter {
    fn credential_type(&self) -> &str {
        &self.credential_type
    }

    fn convert(&self, secret: &RemoteSecret) -> std::result::Result<Credential, ConversionError> {
        (self.convert)(secret)
    }
}

/// The credential id for a secret: the id label if set, otherwise the name
#[must_use]
pub fn credential_id(secret: &RemoteSecret) -> &str {
    secret
        .label(CREDENTIAL_ID_LABEL)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| secret.name())
}

/// The credential scope for a secret, defaulting to global
///
/// # Errors
///
/// Fails if the scope label holds anything other than `global` or `system`.
pub fn credential_scope(secret: &RemoteSecret) -> std::result::Result<CredentialScope, ConversionError> {
    match secret.label(CREDENTIAL_SCOPE_LABEL) {
        None => Ok(CredentialScope::Global),
        Some(value) => value.parse().map_err(|e: ConversionError| {
            ConversionError::new(format!("secret '{}': {}", secret.name(), e.message()))
        }),
    }
}

/// The description annotation, empty if absent
#[must_use]
pub fn credential_description(secret: &RemoteSecret) -> String {
    secret
        .annotation(DESCRIPTION_ANNOTATION)
        .unwrap_or_default()
        .to_string()
}

/// Attach id, scope and description from the secret's metadata to a payload
///
/// # Errors
///
/// Fails if the scope label is invalid.
pub fn build_credential(
    secret: &RemoteSecret,
    kind: CredentialKind,
) -> std::result::Result<Credential, ConversionError> {
    Ok(Credential {
        id: credential_id(secret).to_string(),
        scope: credential_scope(secret)?,
        description: credential_description(secret),
        kind,
    })
}

/// The set of registered converters
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn CredentialConverter>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("types", &self.credential_types())
            .finish()
    }
}

impl ConverterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding all built-in converters
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            converters: converters::builtin(),
        }
    }

    /// Register a converter
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Config`] if another converter already
    /// claims the same type tag.
    pub fn register<C>(&mut self, converter: C) -> Result<()>
    where
        C: CredentialConverter + 'static,
    {
        let tag = converter.credential_type();
        if let Some(existing) = self
            .converters
            .iter()
            .find(|c| c.can_convert(tag) || converter.can_convert(c.credential_type()))
        {
            return Err(CredentialsError::config(format!(
                "converter for credential type '{tag}' conflicts with the registered '{}' converter",
                existing.credential_type()
            )));
        }

        tracing::debug!(credential_type = %tag, "registered credential converter");
        self.converters.push(Arc::new(converter));
        Ok(())
    }

    /// Register a closure as the converter for `credential_type`
    ///
    /// # Errors
    ///
    /// Same as [`ConverterRegistry::register`].
    pub fn register_fn<F>(&mut self, credential_type: impl Into<String>, convert: F) -> Result<()>
    where
        F: Fn(&RemoteSecret) -> std::result::Result<Credential, ConversionError>
            + Send
            + Sync
            + 'static,
    {
        self.register(FnConverter::new(credential_type, convert))
    }

    /// Find the converter for a type tag
    #[must_use]
    pub fn converter_for(&self, credential_type: &str) -> Option<&dyn CredentialConverter> {
        self.converters
            .iter()
            .find(|c| c.can_convert(credential_type))
            .map(|c| &**c)
    }

    /// Type tags of all registered converters
    #[must_use]
    pub fn credential_types(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.credential_type()).collect()
    }

    /// Number of registered converters
    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converters are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Convert a secret with the converter matching its type label
    ///
    /// # Errors
    ///
    /// - [`CredentialsError::MissingType`] if the secret has no type label
    /// - [`CredentialsError::NoConverter`] if nothing handles the type
    /// - [`CredentialsError::Conversion`] if the converter rejects the secret
    pub fn dispatch(&self, secret: &RemoteSecret) -> Result<Credential> {
        let credential_type =
            secret
                .credential_type()
                .ok_or_else(|| CredentialsError::MissingType {
                    name: secret.name().to_string(),
                })?;

        let converter =
            self.converter_for(credential_type)
                .ok_or_else(|| CredentialsError::NoConverter {
                    credential_type: credential_type.to_string(),
                })?;

        Ok(converter.convert(secret)?)
    }
}
