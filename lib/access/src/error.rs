//! Error types for the access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigError`: invalid or missing configuration values
//! - `AuthenticationError`: failures verifying identity with the provider
//! - `AuthorizationError`: the tenant gate refused an authenticated identity
//! - `SessionError`: session store failures

use std::fmt;

/// Errors from configuration validation.
///
/// The `name` field always carries the environment variable a user has to fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty.
    Missing { name: String },
    /// A value is present but unusable.
    Invalid { name: String, reason: String },
}

impl ConfigError {
    /// Creates a `Missing` error for `name`.
    #[must_use]
    pub fn missing(name: &str) -> Self {
        Self::Missing {
            name: name.to_string(),
        }
    }

    /// Creates an `Invalid` error for `name`.
    #[must_use]
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { name } => {
                write!(f, "missing required configuration value {name}")
            }
            Self::Invalid { name, reason } => {
                write!(f, "invalid configuration value {name}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from authentication operations.
///
/// These represent failures talking to, or trusting, the identity provider.
/// Errors the provider reports about the request itself (such as an invalid
/// grant) are not errors here; they are `AuthResult::ProviderError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The client could not be built from its configuration.
    Configuration { reason: String },
    /// The identity provider could not be reached or answered garbage.
    ProviderUnavailable { reason: String },
    /// The ID token failed validation.
    InvalidToken { reason: String },
    /// Missing required claim in token.
    MissingClaim { claim: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => {
                write!(f, "identity client configuration error: {reason}")
            }
            Self::ProviderUnavailable { reason } => {
                write!(f, "identity provider unavailable: {reason}")
            }
            Self::InvalidToken { reason } => {
                write!(f, "invalid token: {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from authorization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The identity belongs to a tenant other than the configured one.
    TenantMismatch { expected: String, actual: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TenantMismatch { expected, actual } => {
                write!(f, "tenant '{actual}' is not the permitted tenant '{expected}'")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The backing store failed.
    Backend { details: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { details } => write!(f, "session store error: {details}"),
        }
    }
}

impl std::error::Error for SessionError {}
