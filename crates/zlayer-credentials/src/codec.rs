//! Secret field decoding and validation
//!
//! Every value that ends up in a credential goes through
//! [`require_field`] / [`optional_field`] (key resolution, presence) and then
//! [`decode_base64`] / [`decode_utf8_text`]. Decoders never fail loudly: they
//! log and return `None`, and the caller turns that into a
//! [`ConversionError`] naming the field and the expected encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;

use crate::error::ConversionError;
use crate::secret::{RemoteSecret, KEYBINDING_ANNOTATION_PREFIX};

/// Decode standard base64, logging and returning `None` on invalid input
#[must_use]
pub fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    match STANDARD.decode(raw.trim()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "invalid base64 data");
            None
        }
    }
}

/// Encode bytes as standard base64
#[must_use]
pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// Base64-decode then strictly UTF-8 decode
///
/// Malformed UTF-8 yields `None`; bytes are never lossily substituted.
#[must_use]
pub fn decode_utf8_text(raw: &str) -> Option<String> {
    let bytes = decode_base64(raw)?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "base64 data is not valid UTF-8");
            None
        }
    }
}

/// Resolve the data key to read for a logical field name
///
/// A non-empty `<keybinding-prefix><requested_key>` annotation wins. An empty
/// one is ignored with a warning.
#[must_use]
pub fn resolve_field_key<'a>(secret: &'a RemoteSecret, requested_key: &'a str) -> &'a str {
    let annotation = format!("{KEYBINDING_ANNOTATION_PREFIX}{requested_key}");
    match secret.annotation(&annotation) {
        Some(mapped) if !mapped.is_empty() => mapped,
        Some(_) => {
            warn!(
                secret = %secret.name(),
                annotation = %annotation,
                "ignoring empty key binding annotation"
            );
            requested_key
        }
        None => requested_key,
    }
}

/// Fetch the raw (still encoded) value for a required field
///
/// # Errors
///
/// Returns a [`ConversionError`] with `error_message` if the field is absent,
/// suffixed with `(mapped to <key>)` when a key binding was in effect.
pub fn require_field<'a>(
    secret: &'a RemoteSecret,
    requested_key: &'a str,
    error_message: &str,
) -> Result<&'a str, ConversionError> {
    let key = resolve_field_key(secret, requested_key);
    secret
        .data()
        .and_then(|data| data.get(key))
        .map(String::as_str)
        .ok_or_else(|| {
            if key == requested_key {
                ConversionError::new(error_message)
            } else {
                ConversionError::new(format!("{error_message} (mapped to {key})"))
            }
        })
}

/// Fetch the raw value for an optional field
///
/// Looks up the mapped key first and falls back to the logical name. A secret
/// without data has no optional fields either.
#[must_use]
pub fn optional_field<'a>(secret: &'a RemoteSecret, requested_key: &'a str) -> Option<&'a str> {
    let data = secret.data()?;
    let key = resolve_field_key(secret, requested_key);
    data.get(key)
        .or_else(|| data.get(requested_key))
        .map(String::as_str)
}

/// Field accessor used by converters
///
/// Bundles key resolution, decoding and the message conventions so every
/// converter reports failures the same way.
#[derive(Debug, Clone, Copy)]
pub struct SecretFields<'a> {
    secret: &'a RemoteSecret,
    credential_type: &'a str,
}

impl<'a> SecretFields<'a> {
    /// Wrap a secret, checking it carries a non-empty data map
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if the secret contains no data.
    pub fn new(secret: &'a RemoteSecret, credential_type: &'a str) -> Result<Self, ConversionError> {
        if secret.data().is_none() {
            return Err(ConversionError::new(format!(
                "{credential_type} definition '{}' contains no data",
                secret.name()
            )));
        }
        Ok(Self {
            secret,
            credential_type,
        })
    }

    /// The wrapped secret
    #[must_use]
    pub fn secret(&self) -> &'a RemoteSecret {
        self.secret
    }

    /// Required base64 UTF-8 text field
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not base64 encoded UTF-8.
    pub fn require_text(&self, field: &'a str) -> Result<String, ConversionError> {
        let raw = require_field(self.secret, field, &self.missing(field))?;
        decode_utf8_text(raw).ok_or_else(|| self.invalid(field, "base64 encoded UTF-8"))
    }

    /// Required base64 binary field
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not base64 encoded.
    pub fn require_bytes(&self, field: &'a str) -> Result<Vec<u8>, ConversionError> {
        let raw = require_field(self.secret, field, &self.missing(field))?;
        decode_base64(raw).ok_or_else(|| self.invalid(field, "base64 encoded"))
    }

    /// Optional base64 UTF-8 text field
    ///
    /// # Errors
    ///
    /// Fails if the field is present but not base64 encoded UTF-8.
    pub fn optional_text(&self, field: &'a str) -> Result<Option<String>, ConversionError> {
        optional_field(self.secret, field)
            .map(|raw| {
                decode_utf8_text(raw).ok_or_else(|| self.invalid(field, "base64 encoded UTF-8"))
            })
            .transpose()
    }

    fn missing(&self, field: &str) -> String {
        format!("{} credential is missing the {field}", self.credential_type)
    }

    fn invalid(&self, field: &str, encoding: &str) -> ConversionError {
        ConversionError::new(format!(
            "{} credential has an invalid {field} (must be {encoding})",
            self.credential_type
        ))
    }
}
