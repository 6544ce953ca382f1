//! Middleware for the job scaler read API.

pub mod basic_auth;

pub use basic_auth::basic_auth_middleware;
