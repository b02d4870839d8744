//! Index page for signed-in users.

use axum::extract::State;
use axum::response::Html;
use serde_json::json;

use super::{INDEX_TEMPLATE, PageError};
use crate::auth::{AppState, RequireUser};

/// Renders the signed-in user's claims.
///
/// Users without a session are redirected to `/login` by [`RequireUser`].
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, PageError> {
    let claims = serde_json::to_string_pretty(&user.to_json())
        .map_err(|e| PageError::Render(e.to_string()))?;

    let data = json!({
        "display_name": user.display_name().or(user.subject()).unwrap_or("user"),
        "tenant_id": user.tenant_id(),
        "endpoint": state.settings.endpoint,
        "claims": claims,
    });

    state
        .templates
        .render(INDEX_TEMPLATE, &data)
        .map(Html)
        .map_err(|e| PageError::Render(e.to_string()))
}
