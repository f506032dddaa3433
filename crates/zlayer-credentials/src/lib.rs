//! `ZLayer` Credentials
//!
//! Keeps an in-memory credential cache synchronized with a remote secret
//! store that supports "list, then watch for changes".
//!
//! ## Selection
//! Only secrets carrying the `zlayer.io/credentials-type` label are
//! considered. Operators can narrow the set further with a label selector
//! such as `team=platform,env in (prod,staging),!legacy`.
//!
//! ## Conversion
//! The type label picks a [`CredentialConverter`] from the
//! [`ConverterRegistry`]. Secret data is base64 encoded; field keys can be
//! remapped per secret with `zlayer.io/credentials-keybinding-<field>`
//! annotations.
//!
//! ## Synchronization
//! The [`WatchController`] lists, replaces the cache, watches, and relists
//! once after a fixed delay whenever the watch is lost. Readers use the
//! [`CredentialsProvider`] view, which never blocks on the network.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod cache;
pub mod codec;
mod config;
mod controller;
mod converter;
pub mod converters;
mod error;
mod logging;
mod secret;
mod selector;
mod source;
mod types;
mod warnings;

pub use cache::{CredentialCache, CredentialsProvider};
pub use config::{CredentialsConfig, LABEL_SELECTOR_ENV, RECONNECT_DELAY_ENV};
pub use controller::{SyncStatus, WatchController, WatchState};
pub use converter::{
    build_credential, credential_description, credential_id, credential_scope, ConvertFn,
    ConverterRegistry, CredentialConverter, FnConverter,
};
pub use error::{ConversionError, CredentialsError, Result, SelectorError, SourceError};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use secret::{
    RemoteSecret, SecretMetadata, CREDENTIAL_ID_LABEL, CREDENTIAL_SCOPE_LABEL,
    CREDENTIAL_TYPE_LABEL, DESCRIPTION_ANNOTATION, KEYBINDING_ANNOTATION_PREFIX,
};
pub use selector::{LabelSelector, Operator, Requirement};
pub use source::{SecretList, SecretSource, WatchEvent, WatchStream};
pub use types::{
    Credential, CredentialKind, CredentialScope, CredentialType, Secret, SecretBytes,
};
pub use warnings::{LoggingWarningSink, WarningSink, SOURCE_UNAVAILABLE_WARNING};
