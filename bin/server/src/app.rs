//! Router assembly.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::pages;

/// Builds the application router: index, login, the configured callback path, and logout.
pub fn router(state: AppState) -> Router {
    let redirect_path = state.settings.redirect_path.clone();

    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(auth::login))
        .route(&redirect_path, get(auth::callback))
        .route("/logout", get(auth::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
