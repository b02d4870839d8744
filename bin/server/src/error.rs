//! Startup and serving errors for the server binary.
//!
//! Request-level failures are not represented here; they are answered by the
//! `IntoResponse` types in [`crate::auth`] and [`crate::pages`].

use std::fmt;

/// Errors that stop the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration could not be loaded or failed validation.
    Configuration { details: String },
    /// The identity provider's metadata could not be discovered.
    Discovery { details: String },
    /// A page template failed to compile.
    Templates { details: String },
    /// The listening socket could not be bound.
    Bind { address: String, details: String },
    /// The HTTP server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "configuration error: {}", details),
            Self::Discovery { details } => {
                write!(f, "identity provider discovery failed: {}", details)
            }
            Self::Templates { details } => write!(f, "template error: {}", details),
            Self::Bind { address, details } => {
                write!(f, "failed to bind to {}: {}", address, details)
            }
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let err = ServerError::Bind {
            address: "127.0.0.1:5000".to_string(),
            details: "address in use".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:5000"));
        assert!(text.contains("address in use"));
    }

    #[test]
    fn configuration_error_display() {
        let err = ServerError::Configuration {
            details: "missing required configuration value TENANT_ID".to_string(),
        };
        assert!(err.to_string().contains("TENANT_ID"));
    }
}
