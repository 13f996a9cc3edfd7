//! # Todo Shared Library
//!
//! This crate contains the storage, authentication and rate-limiting logic
//! behind the todo API server.
//!
//! ## Module Organization
//!
//! - `db`: SQLite connection pool and migrations
//! - `models`: Database models and data structures
//! - `auth`: Credential store, token authenticator, auth gate and ownership checks
//! - `todos`: Per-user todo lifecycle
//! - `rate_limit`: Request ceilings and counter stores

pub mod auth;
pub mod db;
pub mod models;
pub mod rate_limit;
pub mod todos;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
