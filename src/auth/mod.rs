//! Authentication: registration, login, password lifecycle, session tokens.

pub mod handlers;
pub mod jwt;
pub mod password;
pub mod reset;
pub mod service;

pub use jwt::{Claims, TokenKeys};

/// Name of the HTTP-only session cookie.
pub const SESSION_COOKIE: &str = "session";
