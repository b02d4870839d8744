//! Authentication routes for login, callback, and logout.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use tenant_gate_access::{AuthResult, CallbackData, CallbackResult, Session, SessionId};

use super::{
    AppState, found,
    middleware::{removal_cookie, session_cookie, session_id},
};

/// Query parameters for the OIDC callback.
///
/// The provider sends either `code` and `state`, or `error` and
/// `error_description`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Initiates the OIDC login flow by redirecting to the identity provider.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let settings = &state.settings;
    let scopes: Vec<&str> = settings.scopes.iter().map(String::as_str).collect();

    let initiation = state
        .provider
        .initiate_flow(&scopes, &settings.redirect_uri)
        .map_err(|e| AuthError::Configuration(e.to_string()))?;

    let existing = match session_id(&jar) {
        Some(id) => state
            .sessions
            .load(id)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?,
        None => None,
    };
    let mut session = match existing {
        Some(mut session) => {
            session.touch(settings.session.duration());
            session
        }
        None => Session::new(SessionId::new(), settings.session.duration()),
    };
    session.set_flow(initiation.flow);

    let id = session.id();
    state
        .sessions
        .save(session)
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;

    tracing::info!(session_id = %id, "Starting login");

    let jar = jar.add(session_cookie(id, &settings.session));
    Ok((jar, found(&initiation.authorization_url)))
}

/// Handles the OIDC callback after the user authenticates with the identity provider.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let settings = &state.settings;

    // The stored flow is single-use: it is consumed whatever the outcome.
    let mut session = match session_id(&jar) {
        Some(id) => state
            .sessions
            .load(id)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?,
        None => None,
    };
    let flow = session.as_mut().and_then(Session::take_flow);
    if let (Some(session), Some(_)) = (&session, &flow) {
        state
            .sessions
            .save(session.clone())
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?;
    }

    let result = if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_else(|| error.clone());
        AuthResult::ProviderError { error, description }
    } else {
        match (&session, &flow) {
            (Some(_), Some(flow)) => {
                let code = query.code.ok_or(AuthError::MissingCode)?;
                let callback = CallbackData {
                    code,
                    state: query.state,
                };
                state
                    .provider
                    .exchange_code(&callback, flow)
                    .await
                    .map_err(|e| AuthError::Exchange(e.to_string()))?
            }
            _ => AuthResult::SessionExpired,
        }
    };

    match settings.policy.resolve(result) {
        CallbackResult::SignedIn(claims) => {
            // Only reachable with a session and a flow in hand.
            let session = session.ok_or(AuthError::SessionExpired)?;
            let old_id = session.id();

            tracing::info!(
                subject = claims.subject().unwrap_or_default(),
                tenant_id = %claims.tenant_id(),
                "User signed in"
            );

            let signed_in = session.sign_in(SessionId::new(), *claims, settings.session.duration());
            let new_id = signed_in.id();

            state
                .sessions
                .save(signed_in)
                .await
                .map_err(|e| AuthError::Session(e.to_string()))?;
            state
                .sessions
                .delete(old_id)
                .await
                .map_err(|e| AuthError::Session(e.to_string()))?;

            let jar = jar.add(session_cookie(new_id, &settings.session));
            Ok((jar, found("/")))
        }
        CallbackResult::AccessDenied { .. } => Err(AuthError::AccessDenied),
        CallbackResult::LoginFailure { description } => Err(AuthError::LoginFailure(description)),
        CallbackResult::SessionExpired => Err(AuthError::SessionExpired),
    }
}

/// Logs out the user by deleting their session and ending the provider session.
pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    if let Some(id) = session_id(&jar) {
        if let Err(e) = state.sessions.delete(id).await {
            tracing::warn!(error = %e, session_id = %id, "Failed to delete session on logout");
        }
        tracing::info!(session_id = %id, "User logged out");
    }

    (
        jar.remove(removal_cookie()),
        found(&state.settings.logout_url),
    )
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    /// The provider client could not start a flow.
    Configuration(String),
    /// The session or flow was missing, expired, or did not match.
    SessionExpired,
    /// The callback carried neither a code nor an error.
    MissingCode,
    /// The provider refused the login.
    LoginFailure(String),
    /// The user belongs to another tenant.
    AccessDenied,
    /// Talking to the provider or validating its tokens failed.
    Exchange(String),
    /// The session store failed.
    Session(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Configuration(msg) => {
                tracing::error!("Failed to start login: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error: unable to start login",
                )
                    .into_response()
            }
            Self::SessionExpired => (
                StatusCode::BAD_REQUEST,
                "Invalid Setup or Session Expired",
            )
                .into_response(),
            Self::MissingCode => {
                (StatusCode::BAD_REQUEST, "Missing authorization code").into_response()
            }
            Self::LoginFailure(description) => (
                StatusCode::UNAUTHORIZED,
                format!("Login failure: {}", description),
            )
                .into_response(),
            Self::AccessDenied => (
                StatusCode::FORBIDDEN,
                "Error: Access denied. Only members of the permitted organization may sign in.",
            )
                .into_response(),
            Self::Exchange(msg) => {
                tracing::error!("Token exchange failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Authentication failed").into_response()
            }
            Self::Session(msg) => {
                tracing::error!("Session store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
