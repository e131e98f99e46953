//! Middleware for the AgriRent API
//!
//! Request tracing, rate limiting, security headers, and the
//! authenticated-user extractor.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::AuthenticatedUser;
pub use rate_limiter::{rate_limit_layer, RateLimiter};
pub use security::security_headers;
pub use tracing::request_tracing;
