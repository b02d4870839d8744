//! Session cookie handling and authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use tenant_gate_access::{IdTokenClaims, SessionId};
use time::Duration as TimeDuration;

use super::{AppState, found};
use crate::config::SessionConfig;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";

/// Reads the session ID from the signed cookie jar.
///
/// A cookie with a bad signature is dropped by the jar; a malformed ID is
/// treated the same way.
pub fn session_id(jar: &SignedCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)?.value().parse().ok()
}

/// Builds the session cookie for `id`.
pub fn session_cookie(id: SessionId, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(config.duration_minutes))
        .build()
}

/// Builds the cookie that removes the session cookie.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Extractor for requiring a signed-in user.
///
/// If there is no signed-in user, the browser is redirected to `/login`.
pub struct RequireUser(pub IdTokenClaims);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let jar = SignedCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::InternalError)?;

        let session_id = session_id(&jar).ok_or(AuthRejection::NotAuthenticated)?;

        let session = app_state
            .sessions
            .load(session_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load session");
                AuthRejection::InternalError
            })?
            .ok_or(AuthRejection::NotAuthenticated)?;

        let user = session
            .user()
            .cloned()
            .ok_or(AuthRejection::NotAuthenticated)?;

        Ok(RequireUser(user))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => found("/login"),
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::http::header::COOKIE;

    fn key() -> Key {
        Key::from(&[3u8; 64])
    }

    #[test]
    fn session_cookie_attributes() {
        let id = SessionId::new();
        let cookie = session_cookie(id, &SessionConfig::default());

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(TimeDuration::minutes(60)));
    }

    #[test]
    fn signed_session_id_is_read_back() {
        let id = SessionId::new();
        let jar = SignedCookieJar::new(key()).add(session_cookie(id, &SessionConfig::default()));

        assert_eq!(session_id(&jar), Some(id));
    }

    #[test]
    fn unsigned_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("{SESSION_COOKIE}={}", SessionId::new())
                .parse()
                .expect("header"),
        );

        let jar = SignedCookieJar::from_headers(&headers, key());
        assert_eq!(session_id(&jar), None);
    }

    #[test]
    fn not_authenticated_redirects_to_login() {
        let response = AuthRejection::NotAuthenticated.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/login");
    }
}
