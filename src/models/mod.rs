//! Domain models shared across handlers and services.

mod user;

pub use user::{PublicUser, Role};
