//! Error types for credential synchronization

use thiserror::Error;

/// A label selector expression could not be compiled
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    /// A clause did not split into one or three tokens
    #[error("invalid selector clause '{clause}': expected 1 or 3 tokens, found {tokens}")]
    TokenCount {
        /// The offending clause as written
        clause: String,
        /// Number of whitespace-separated tokens after operator normalization
        tokens: usize,
    },

    /// A three-token clause used an operator other than `=`, `==`, `!=`, `in` or `notin`
    #[error("invalid selector clause '{clause}': unknown operator '{operator}'")]
    UnknownOperator {
        /// The offending clause as written
        clause: String,
        /// The operator token
        operator: String,
    },

    /// A clause is malformed in some other way (empty key, unbalanced parentheses, ...)
    #[error("invalid selector clause '{clause}': {reason}")]
    Malformed {
        /// The offending clause as written
        clause: String,
        /// What is wrong with it
        reason: String,
    },
}

impl SelectorError {
    /// Create a malformed-clause error
    #[must_use]
    pub fn malformed(clause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            clause: clause.into(),
            reason: reason.into(),
        }
    }
}

/// A single remote secret could not be turned into a credential
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    /// Create a conversion error with a field-specific message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The human readable failure message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by the remote secret store collaborator
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (refused, reset, stream dropped)
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the transport failure
        message: String,
    },

    /// The store rejected our identity or permissions
    #[error("Authentication error: {reason}")]
    Auth {
        /// Reason given by the store
        reason: String,
    },

    /// The store rejected the request itself (bad selector, gone resource version, ...)
    #[error("Request rejected: {message}")]
    Rejected {
        /// Description returned by the store
        message: String,
    },
}

impl SourceError {
    /// Create a connection error from any error type
    #[must_use]
    pub fn connection<E: std::error::Error>(err: E) -> Self {
        Self::Connection {
            message: err.to_string(),
        }
    }

    /// Create a connection error with a message
    #[must_use]
    pub fn connection_msg(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an authentication error
    #[must_use]
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a rejected-request error
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Top-level error for the credentials crate
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Selector expression syntax error
    #[error("Selector syntax error: {0}")]
    Syntax(#[from] SelectorError),

    /// Remote store unreachable or refusing requests
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] SourceError),

    /// A secret's fields are missing or malformed
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// No registered converter handles the secret's type
    #[error("No converter registered for credential type '{credential_type}'")]
    NoConverter {
        /// The declared type tag
        credential_type: String,
    },

    /// The secret carries no type label at all
    #[error("Secret '{name}' has no credential type label")]
    MissingType {
        /// Name of the secret
        name: String,
    },

    /// Invalid configuration (duplicate converter, bad reconnect delay, ...)
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// The controller has been shut down
    #[error("Credential synchronization is shutting down")]
    Shutdown,
}

impl CredentialsError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this failure only affects a single secret
    #[must_use]
    pub fn is_per_secret(&self) -> bool {
        matches!(
            self,
            Self::Conversion(_) | Self::NoConverter { .. } | Self::MissingType { .. }
        )
    }
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, CredentialsError>;
