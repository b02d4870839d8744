//! Core types and utilities for tenant-gate.
//!
//! This crate provides the foundational identifier types and the error
//! handling alias shared by the access library and the web server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId};
