//! OIDC (OpenID Connect) configuration.
//!
//! This module provides the configuration used to connect to the external
//! identity provider. Defaults follow the Microsoft identity platform layout,
//! where the issuer lives at `<authority>/v2.0` and the end-session endpoint at
//! `<authority>/oauth2/v2.0/logout`; both can be overridden for other providers.

use url::Url;

use crate::error::ConfigError;

/// Configuration for the OIDC identity provider.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// The authority base URL (e.g., "https://login.microsoftonline.com/<tenant>").
    authority: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The absolute redirect URI for the OAuth2 callback.
    redirect_uri: String,
    /// OAuth2 scopes to request, without duplicates.
    scopes: Vec<String>,
    /// Explicit issuer URL used for discovery. Default: `<authority>/v2.0`.
    issuer_url: Option<String>,
    /// Path of the end-session endpoint below the authority.
    logout_path: String,
}

fn default_logout_path() -> String {
    "/oauth2/v2.0/logout".to_string()
}

impl OidcConfig {
    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        authority: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> OidcConfigBuilder {
        OidcConfigBuilder::new(authority, client_id, client_secret, redirect_uri)
    }

    /// Returns the authority base URL without a trailing slash.
    #[must_use]
    pub fn authority(&self) -> &str {
        self.authority.trim_end_matches('/')
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the OAuth2 scopes to request, without duplicates.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns the issuer URL used for provider discovery.
    #[must_use]
    pub fn issuer_url(&self) -> String {
        match &self.issuer_url {
            Some(issuer) => issuer.clone(),
            None => format!("{}/v2.0", self.authority()),
        }
    }

    /// Builds the provider end-session URL that sends the browser back to
    /// `post_logout_redirect_uri` once the provider has signed the user out.
    ///
    /// # Errors
    ///
    /// Returns an error if the authority and logout path do not form a URL.
    pub fn logout_url(&self, post_logout_redirect_uri: &str) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&format!("{}{}", self.authority(), self.logout_path))
            .map_err(|e| ConfigError::invalid("LOGOUT_PATH", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", post_logout_redirect_uri);
        Ok(url)
    }

    /// Checks that every value is present and well formed.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, naming the environment variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("CLIENT_ID", &self.client_id)?;
        require("CLIENT_SECRET", &self.client_secret)?;
        require("AUTHORITY", &self.authority)?;
        require_absolute_url("AUTHORITY", &self.authority)?;
        require_absolute_url("REDIRECT_PATH", &self.redirect_uri)?;
        if self.scopes().is_empty() {
            return Err(ConfigError::missing("SCOPE"));
        }
        if let Some(issuer) = &self.issuer_url {
            require_absolute_url("OIDC_ISSUER", issuer)?;
        }
        if !self.logout_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "LOGOUT_PATH",
                "must start with '/'",
            ));
        }
        self.logout_url("https://localhost/")?;
        Ok(())
    }
}

fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::missing(name));
    }
    Ok(())
}

fn require_absolute_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(name, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            name,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

/// Builder for `OidcConfig`.
#[derive(Debug)]
pub struct OidcConfigBuilder {
    authority: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    issuer_url: Option<String>,
    logout_path: String,
}

impl OidcConfigBuilder {
    /// Creates a new builder with required fields.
    #[must_use]
    pub fn new(
        authority: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            authority,
            client_id,
            client_secret,
            redirect_uri,
            scopes: Vec::new(),
            issuer_url: None,
            logout_path: default_logout_path(),
        }
    }

    /// Adds a scope to the list of scopes to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !scope.is_empty() && !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Adds every scope in a list separated by commas or whitespace.
    #[must_use]
    pub fn add_scopes(self, list: &str) -> Self {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .fold(self, |builder, scope| builder.add_scope(scope.to_string()))
    }

    /// Overrides the issuer URL used for discovery.
    #[must_use]
    pub fn issuer_url(mut self, issuer_url: Option<String>) -> Self {
        self.issuer_url = issuer_url;
        self
    }

    /// Sets the end-session path below the authority.
    #[must_use]
    pub fn logout_path(mut self, path: String) -> Self {
        self.logout_path = path;
        self
    }

    /// Builds the `OidcConfig`.
    #[must_use]
    pub fn build(self) -> OidcConfig {
        OidcConfig {
            authority: self.authority,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            scopes: self.scopes,
            issuer_url: self.issuer_url,
            logout_path: self.logout_path,
        }
    }
}
