//! Server-rendered pages.
//!
//! Templates are compiled into the binary and registered once at startup.

pub mod home;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use handlebars::{Handlebars, TemplateError};

pub use home::index;

/// Name of the index page template.
pub const INDEX_TEMPLATE: &str = "index";

/// Builds the template registry with every page registered.
///
/// # Errors
///
/// Returns an error if a template fails to compile.
pub fn templates() -> Result<Handlebars<'static>, TemplateError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_template_string(INDEX_TEMPLATE, include_str!("../templates/index.hbs"))?;
    Ok(handlebars)
}

/// Page rendering errors.
#[derive(Debug)]
pub enum PageError {
    Render(String),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            Self::Render(msg) => {
                tracing::error!("Failed to render page: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
