//! The identity provider capability.
//!
//! The OAuth2 authorization-code flow itself (state, nonce and PKCE generation,
//! token exchange, ID token verification) belongs to the implementation. The
//! rest of the application sees only these two operations.

use async_trait::async_trait;
use tenant_gate_core::Result;

use crate::auth::{AuthResult, CallbackData, FlowState, LoginInitiation};
use crate::error::AuthenticationError;

/// An external OIDC identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Starts an authorization-code flow for `scopes` that returns to
    /// `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built from its configuration.
    fn initiate_flow(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
    ) -> Result<LoginInitiation, AuthenticationError>;

    /// Exchanges the authorization code in `callback` for validated ID token
    /// claims, using the flow stored at login.
    ///
    /// Refusals by the provider and flow mismatches are reported through the
    /// returned [`AuthResult`].
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and tokens that fail validation.
    async fn exchange_code(
        &self,
        callback: &CallbackData,
        flow: &FlowState,
    ) -> Result<AuthResult, AuthenticationError>;
}
