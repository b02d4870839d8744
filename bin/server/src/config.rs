//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server, loaded via
//! the `config` crate from environment variables and validated before the
//! server binds a socket. Every required value is read as an empty default so
//! that a missing variable is reported by name instead of as a serde error.
//!
//! See [`OidcConfig`] for the identity provider part of the configuration.

use axum_extra::extract::cookie::Key;
use base64::Engine;
use rootcause::Report;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use tenant_gate_access::{ConfigError, OidcConfig, TenantPolicy};
use url::Url;

/// Minimum decoded length of `SESSION_SECRET`.
const MIN_SECRET_BYTES: usize = 64;

/// Longest accepted session lifetime, one year.
const MAX_SESSION_MINUTES: i64 = 60 * 24 * 365;

/// Longest accepted pause between session sweeps, one day.
const MAX_CLEANUP_INTERVAL_SECONDS: u64 = 60 * 60 * 24;

/// Longest accepted timeout for identity provider calls.
const MAX_HTTP_TIMEOUT_SECONDS: u64 = 300;

/// Routes owned by the application that the callback path must not shadow.
const RESERVED_PATHS: [&str; 3] = ["/", "/login", "/logout"];

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// OAuth2 client ID (`CLIENT_ID`).
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret (`CLIENT_SECRET`).
    #[serde(default)]
    pub client_secret: String,

    /// Identity provider authority URL (`AUTHORITY`).
    #[serde(default)]
    pub authority: String,

    /// Path of the OAuth2 callback route (`REDIRECT_PATH`).
    #[serde(default)]
    pub redirect_path: String,

    /// Downstream API endpoint shown to signed-in users (`ENDPOINT`).
    #[serde(default)]
    pub endpoint: String,

    /// Scopes to request (`SCOPE`), separated by commas or whitespace.
    #[serde(default)]
    pub scope: String,

    /// The only tenant allowed to sign in (`TENANT_ID`).
    #[serde(default)]
    pub tenant_id: String,

    /// Externally visible base URL of this application (`PUBLIC_URL`).
    #[serde(default)]
    pub public_url: String,

    /// Base64-encoded key for signing session cookies (`SESSION_SECRET`).
    #[serde(default)]
    pub session_secret: String,

    /// Socket address to listen on (`BIND_ADDRESS`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Issuer URL override for discovery (`OIDC_ISSUER`).
    #[serde(default)]
    pub oidc_issuer: Option<String>,

    /// End-session path below the authority (`LOGOUT_PATH`).
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Timeout for requests to the identity provider (`HTTP_TIMEOUT_SECONDS`).
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    /// Session configuration (`SESSION__*`).
    #[serde(default)]
    pub session: SessionConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_logout_path() -> String {
    "/oauth2/v2.0/logout".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_session_duration_minutes() -> i64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl SessionConfig {
    /// Returns the session lifetime.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }
}

impl ServerConfig {
    /// Loads and validates configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        Self::from_source(config::Environment::default().separator("__"))
    }

    /// Loads and validates configuration from an arbitrary `config` source.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_source<S>(source: S) -> Result<Self, Report<ConfigError>>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::invalid("environment", e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks every value the server depends on.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, naming the environment variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("CLIENT_ID", &self.client_id),
            ("CLIENT_SECRET", &self.client_secret),
            ("AUTHORITY", &self.authority),
            ("REDIRECT_PATH", &self.redirect_path),
            ("ENDPOINT", &self.endpoint),
            ("SCOPE", &self.scope),
            ("TENANT_ID", &self.tenant_id),
            ("PUBLIC_URL", &self.public_url),
            ("SESSION_SECRET", &self.session_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::missing(name));
            }
        }

        validate_redirect_path(&self.redirect_path)?;

        let public_url = Url::parse(&self.public_url)
            .map_err(|e| ConfigError::invalid("PUBLIC_URL", e.to_string()))?;
        if !matches!(public_url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "PUBLIC_URL",
                "must be an http or https URL",
            ));
        }
        if public_url.query().is_some() || public_url.fragment().is_some() {
            return Err(ConfigError::invalid(
                "PUBLIC_URL",
                "must not carry a query or fragment",
            ));
        }

        Url::parse(&self.endpoint).map_err(|e| ConfigError::invalid("ENDPOINT", e.to_string()))?;

        self.bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDRESS", e.to_string()))?;

        if !(1..=MAX_HTTP_TIMEOUT_SECONDS).contains(&self.http_timeout_seconds) {
            return Err(ConfigError::invalid(
                "HTTP_TIMEOUT_SECONDS",
                format!("must be between 1 and {MAX_HTTP_TIMEOUT_SECONDS}"),
            ));
        }
        if !(1..=MAX_SESSION_MINUTES).contains(&self.session.duration_minutes) {
            return Err(ConfigError::invalid(
                "SESSION__DURATION_MINUTES",
                format!("must be between 1 and {MAX_SESSION_MINUTES}"),
            ));
        }
        if !(1..=MAX_CLEANUP_INTERVAL_SECONDS).contains(&self.session.cleanup_interval_seconds) {
            return Err(ConfigError::invalid(
                "SESSION__CLEANUP_INTERVAL_SECONDS",
                format!("must be between 1 and {MAX_CLEANUP_INTERVAL_SECONDS}"),
            ));
        }

        self.cookie_key()?;
        self.oidc_config().validate()
    }

    /// Returns the absolute callback URL registered with the provider.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{}", self.public_base(), self.redirect_path)
    }

    /// Returns the absolute URL of the index route.
    #[must_use]
    pub fn index_url(&self) -> String {
        format!("{}/", self.public_base())
    }

    /// Returns the identity provider configuration.
    #[must_use]
    pub fn oidc_config(&self) -> OidcConfig {
        OidcConfig::builder(
            self.authority.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri(),
        )
        .add_scopes(&self.scope)
        .issuer_url(self.oidc_issuer.clone().filter(|s| !s.trim().is_empty()))
        .logout_path(self.logout_path.clone())
        .build()
    }

    /// Returns the single-tenant access policy.
    #[must_use]
    pub fn tenant_policy(&self) -> TenantPolicy {
        TenantPolicy::new(self.tenant_id.trim())
    }

    /// Decodes the cookie signing key.
    ///
    /// # Errors
    ///
    /// Returns an error unless `SESSION_SECRET` is base64 for at least 64 bytes.
    pub fn cookie_key(&self) -> Result<Key, ConfigError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.session_secret.trim())
            .map_err(|e| ConfigError::invalid("SESSION_SECRET", e.to_string()))?;

        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::invalid(
                "SESSION_SECRET",
                format!(
                    "decodes to {} bytes, at least {MIN_SECRET_BYTES} are required",
                    bytes.len()
                ),
            ));
        }

        Ok(Key::from(&bytes))
    }

    /// Returns the timeout for calls to the identity provider.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    fn public_base(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

fn validate_redirect_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::invalid("REDIRECT_PATH", "must start with '/'"));
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(ConfigError::invalid(
            "REDIRECT_PATH",
            format!("'{path}' is used by another route"),
        ));
    }
    if path.contains(['{', '}', ':', '*', '?', '#']) || path.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            "REDIRECT_PATH",
            "must be a literal path without parameters, query, or fragment",
        ));
    }
    Ok(())
}
