//! Request middleware: authentication and role gating.

pub mod auth;
