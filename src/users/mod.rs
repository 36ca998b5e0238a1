//! Admin-only user management.

pub mod handlers;
