//! Authentication module for the tenant-gate server.
//!
//! This module provides:
//! - OIDC authentication with the configured identity provider
//! - Signed-cookie session handling backed by a [`SessionStore`]
//! - The login, callback and logout routes
//! - An extractor that requires a signed-in user
//!
//! # Access Model
//!
//! The identity provider decides who the user is. This module decides whether
//! they may stay: the callback admits a user only if the tenant claim of their
//! ID token equals the configured tenant. A session only ever holds a `user`
//! after that check has passed.

pub mod middleware;
pub mod oidc;
pub mod routes;


use axum::extract::FromRef;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::Key;
use handlebars::Handlebars;
use std::sync::Arc;
use tenant_gate_access::{ConfigError, IdentityProvider, SessionStore, TenantPolicy};

use crate::config::{ServerConfig, SessionConfig};

pub use middleware::RequireUser;
pub use oidc::{OidcClient, OidcError};
pub use routes::{callback, login, logout};

/// Values the routes derive from configuration once at startup.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Scopes requested at login.
    pub scopes: Vec<String>,
    /// Path the callback route is mounted at.
    pub redirect_path: String,
    /// Absolute callback URL sent to the provider.
    pub redirect_uri: String,
    /// Provider end-session URL, including the post-logout redirect.
    pub logout_url: String,
    /// Downstream API endpoint shown on the index page.
    pub endpoint: String,
    /// The tenant gate.
    pub policy: TenantPolicy,
    /// Session lifetime and cookie settings.
    pub session: SessionConfig,
}

impl AuthSettings {
    /// Derives route settings from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout URL cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let oidc = config.oidc_config();
        let logout_url = oidc.logout_url(&config.index_url())?;

        Ok(Self {
            scopes: oidc.scopes().to_vec(),
            redirect_path: config.redirect_path.clone(),
            redirect_uri: config.redirect_uri(),
            logout_url: logout_url.to_string(),
            endpoint: config.endpoint.clone(),
            policy: config.tenant_policy(),
            session: config.session.clone(),
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Identity provider used by login and callback.
    pub provider: Arc<dyn IdentityProvider>,
    /// Session records.
    pub sessions: Arc<dyn SessionStore>,
    /// Settings derived from configuration.
    pub settings: Arc<AuthSettings>,
    /// Key signing the session cookie.
    pub cookie_key: Key,
    /// Compiled page templates.
    pub templates: Arc<Handlebars<'static>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionStore>,
        settings: AuthSettings,
        cookie_key: Key,
        templates: Handlebars<'static>,
    ) -> Self {
        Self {
            provider,
            sessions,
            settings: Arc::new(settings),
            cookie_key,
            templates: Arc::new(templates),
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// A `302 Found` redirect to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
