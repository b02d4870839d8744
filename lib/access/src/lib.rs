//! Authentication, tenant gating, and sessions for tenant-gate.
//!
//! This crate provides:
//! - OIDC configuration (`OidcConfig`)
//! - The identity provider capability (`IdentityProvider`)
//! - Flow and claim types (`FlowState`, `IdTokenClaims`, `AuthResult`)
//! - The single-tenant access policy (`TenantPolicy`)
//! - Session records and storage (`Session`, `SessionStore`)
//!
//! # Access Control Model
//!
//! Authentication is delegated to an external OIDC provider. A user who
//! authenticates successfully is admitted only if the `tid` claim of their ID
//! token equals the configured tenant identifier.
//!
//! # Example
//!
//! ```
//! use tenant_gate_access::{AuthResult, CallbackResult, IdTokenClaims, TenantPolicy};
//!
//! let policy = TenantPolicy::new("univ-tenant-123");
//!
//! let claims = IdTokenClaims::new("univ-tenant-123").with_claim("sub", "abc");
//! let outcome = policy.resolve(AuthResult::Success(Box::new(claims)));
//! assert!(matches!(outcome, CallbackResult::SignedIn(_)));
//!
//! let outsider = IdTokenClaims::new("attacker-tenant");
//! let outcome = policy.resolve(AuthResult::Success(Box::new(outsider)));
//! assert!(matches!(outcome, CallbackResult::AccessDenied { .. }));
//! ```

pub mod auth;
pub mod error;
pub mod oidc;
pub mod provider;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use auth::{
    AuthResult, CallbackData, CallbackResult, FlowState, IdTokenClaims, LoginInitiation,
    TENANT_CLAIM, TenantPolicy,
};
pub use error::{AuthenticationError, AuthorizationError, ConfigError, SessionError};
pub use oidc::{OidcConfig, OidcConfigBuilder};
pub use provider::IdentityProvider;
pub use session::Session;
pub use store::{MemorySessionStore, SessionStore};
pub use tenant_gate_core::SessionId;
