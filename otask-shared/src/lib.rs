//! # OTask Shared Library
//!
//! This crate contains shared types, utilities, and business logic used across
//! the OTask API server and the email delivery worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Authentication primitives (JWT, password hashing, middleware)
//! - `invite`: Invitation token codec and invitation service
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod invite;
pub mod models;

/// Current version of the OTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
