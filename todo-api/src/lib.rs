//! # Todo API Server Library
//!
//! This library provides the HTTP surface of the multi-user todo service.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and auth gate
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
