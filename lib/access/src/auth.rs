//! Authentication flow types and the tenant gate.
//!
//! The login lifecycle is:
//! 1. `/login` asks the identity provider for a [`LoginInitiation`] and keeps
//!    its [`FlowState`] in the session.
//! 2. The provider redirects back with [`CallbackData`]; the stored flow and the
//!    callback are exchanged for an [`AuthResult`].
//! 3. [`TenantPolicy::resolve`] turns the exchange result into a
//!    [`CallbackResult`]. Only [`CallbackResult::SignedIn`] may be written to
//!    the session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthenticationError, AuthorizationError};

/// Name of the tenant identifier claim.
pub const TENANT_CLAIM: &str = "tid";

/// Claims extracted from a validated OIDC ID token.
///
/// The tenant identifier is required; every other claim is kept as-is so the
/// full claim set can be shown back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Tenant identifier (`tid`).
    pub tid: String,
    /// All remaining claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdTokenClaims {
    /// Creates claims for the given tenant with no other claims.
    #[must_use]
    pub fn new(tid: impl Into<String>) -> Self {
        Self {
            tid: tid.into(),
            extra: Map::new(),
        }
    }

    /// Builds claims from a decoded ID token payload.
    ///
    /// # Errors
    ///
    /// Returns `MissingClaim` if the payload is not an object or has no string
    /// `tid` claim.
    pub fn from_payload(payload: Value) -> Result<Self, AuthenticationError> {
        let Value::Object(mut extra) = payload else {
            return Err(AuthenticationError::InvalidToken {
                reason: "ID token payload is not a JSON object".to_string(),
            });
        };

        match extra.remove(TENANT_CLAIM) {
            Some(Value::String(tid)) => Ok(Self { tid, extra }),
            _ => Err(AuthenticationError::MissingClaim {
                claim: TENANT_CLAIM.to_string(),
            }),
        }
    }

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tid
    }

    /// Returns a claim other than `tid` by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Returns the subject claim, if present.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Returns a human-readable name from `name` or `preferred_username`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.get_str("name")
            .or_else(|| self.get_str("preferred_username"))
    }

    /// Returns the complete claim map, including `tid`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(TENANT_CLAIM.to_string(), Value::String(self.tid.clone()));
        Value::Object(map)
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}

/// State of an authorization-code flow between `/login` and the callback.
///
/// Opaque to route handlers; only the identity provider interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    /// CSRF token sent as the OAuth2 `state` parameter.
    pub state: String,
    /// Nonce expected in the ID token.
    pub nonce: String,
    /// PKCE code verifier.
    pub pkce_verifier: String,
    /// Redirect URI used when the flow started.
    pub redirect_uri: String,
    /// Scopes requested when the flow started.
    pub scopes: Vec<String>,
}

impl FlowState {
    /// Creates a new flow state.
    #[must_use]
    pub fn new(
        state: String,
        nonce: String,
        pkce_verifier: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            state,
            nonce,
            pkce_verifier,
            redirect_uri,
            scopes,
        }
    }
}

/// Login initiation data for redirecting to the OIDC provider.
#[derive(Debug, Clone)]
pub struct LoginInitiation {
    /// The URL to redirect the user to for authentication.
    pub authorization_url: String,
    /// Flow state to keep in the session until the callback.
    pub flow: FlowState,
}

/// Data the provider sends back to the callback route.
#[derive(Debug, Clone)]
pub struct CallbackData {
    /// The authorization code from the provider.
    pub code: String,
    /// The returned `state` parameter.
    pub state: Option<String>,
}

/// Outcome of exchanging an authorization code.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthResult {
    /// Tokens were issued and the ID token validated.
    Success(Box<IdTokenClaims>),
    /// The provider refused the request.
    ProviderError {
        /// OAuth2 error code (e.g. `invalid_grant`).
        error: String,
        /// Human-readable description supplied by the provider.
        description: String,
    },
    /// The callback does not belong to the stored flow (or no flow exists).
    SessionExpired,
}

/// Outcome of an OIDC callback after the tenant gate.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackResult {
    /// The user is authenticated and belongs to the permitted tenant.
    SignedIn(Box<IdTokenClaims>),
    /// The user authenticated with a different tenant.
    AccessDenied {
        /// The tenant the user actually belongs to.
        tenant_id: String,
    },
    /// The provider reported an error.
    LoginFailure {
        /// Provider-supplied description.
        description: String,
    },
    /// The session or flow was missing, expired, or did not match.
    SessionExpired,
}

/// Restricts access to a single tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPolicy {
    tenant_id: String,
}

impl TenantPolicy {
    /// Creates a policy permitting only `tenant_id`.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }

    /// Returns the permitted tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Checks the tenant claim by exact string equality.
    ///
    /// # Errors
    ///
    /// Returns `TenantMismatch` when the claim differs from the permitted tenant.
    pub fn check(&self, claims: &IdTokenClaims) -> Result<(), AuthorizationError> {
        if claims.tenant_id() == self.tenant_id {
            Ok(())
        } else {
            Err(AuthorizationError::TenantMismatch {
                expected: self.tenant_id.clone(),
                actual: claims.tenant_id().to_string(),
            })
        }
    }

    /// Applies the tenant gate to an exchange result.
    #[must_use]
    pub fn resolve(&self, result: AuthResult) -> CallbackResult {
        match result {
            AuthResult::Success(claims) => match self.check(&claims) {
                Ok(()) => CallbackResult::SignedIn(claims),
                Err(err) => {
                    tracing::warn!(error = %err, "Rejected sign-in from foreign tenant");
                    CallbackResult::AccessDenied {
                        tenant_id: claims.tid,
                    }
                }
            },
            AuthResult::ProviderError { error, description } => {
                tracing::info!(error = %error, description = %description, "Provider rejected login");
                CallbackResult::LoginFailure { description }
            }
            AuthResult::SessionExpired => CallbackResult::SessionExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> TenantPolicy {
        TenantPolicy::new("univ-tenant-123")
    }

    #[test]
    fn claims_from_payload_keeps_all_claims() {
        let claims = IdTokenClaims::from_payload(json!({
            "tid": "univ-tenant-123",
            "sub": "abc",
            "name": "Ada Lovelace",
            "aud": "client-id"
        }))
        .expect("claims");

        assert_eq!(claims.tenant_id(), "univ-tenant-123");
        assert_eq!(claims.subject(), Some("abc"));
        assert_eq!(claims.display_name(), Some("Ada Lovelace"));
        assert_eq!(claims.get("aud"), Some(&json!("client-id")));
        assert_eq!(claims.to_json()["tid"], json!("univ-tenant-123"));
    }

    #[test]
    fn claims_from_payload_requires_string_tid() {
        let err = IdTokenClaims::from_payload(json!({"sub": "abc"})).unwrap_err();
        assert_eq!(
            err,
            AuthenticationError::MissingClaim {
                claim: "tid".to_string()
            }
        );

        assert!(IdTokenClaims::from_payload(json!({"tid": 7})).is_err());
        assert!(IdTokenClaims::from_payload(json!(["tid"])).is_err());
    }

    #[test]
    fn display_name_falls_back_to_preferred_username() {
        let claims = IdTokenClaims::new("t").with_claim("preferred_username", "ada@example.edu");
        assert_eq!(claims.display_name(), Some("ada@example.edu"));
    }

    #[test]
    fn claims_serialize_flat() {
        let claims = IdTokenClaims::new("univ-tenant-123").with_claim("sub", "abc");
        let value = serde_json::to_value(&claims).expect("serialize");
        assert_eq!(value, json!({"tid": "univ-tenant-123", "sub": "abc"}));
    }

    #[test]
    fn check_requires_exact_match() {
        let policy = policy();
        assert!(policy.check(&IdTokenClaims::new("univ-tenant-123")).is_ok());
        assert!(policy.check(&IdTokenClaims::new("UNIV-TENANT-123")).is_err());
        assert!(policy.check(&IdTokenClaims::new("univ-tenant-123 ")).is_err());
        assert!(policy.check(&IdTokenClaims::new("")).is_err());
    }

    #[test]
    fn resolve_signs_in_matching_tenant() {
        let claims = IdTokenClaims::new("univ-tenant-123").with_claim("sub", "abc");
        let result = policy().resolve(AuthResult::Success(Box::new(claims.clone())));
        assert_eq!(result, CallbackResult::SignedIn(Box::new(claims)));
    }

    #[test]
    fn resolve_denies_foreign_tenant() {
        let claims = IdTokenClaims::new("attacker-tenant");
        let result = policy().resolve(AuthResult::Success(Box::new(claims)));
        assert_eq!(
            result,
            CallbackResult::AccessDenied {
                tenant_id: "attacker-tenant".to_string()
            }
        );
    }

    #[test]
    fn resolve_passes_provider_description_through() {
        let result = policy().resolve(AuthResult::ProviderError {
            error: "invalid_grant".to_string(),
            description: "bad code".to_string(),
        });
        assert_eq!(
            result,
            CallbackResult::LoginFailure {
                description: "bad code".to_string()
            }
        );
    }

    #[test]
    fn resolve_session_expired() {
        assert_eq!(
            policy().resolve(AuthResult::SessionExpired),
            CallbackResult::SessionExpired
        );
    }
}
