//! tenant-gate web server.
//!
//! This crate provides the HTTP surface of tenant-gate: OIDC login against an
//! external identity provider, a single-tenant gate on the callback, and a
//! page showing the signed-in user's claims.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pages;
