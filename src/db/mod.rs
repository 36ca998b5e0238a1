//! Database layer: pool and the users credential store (PostgreSQL).

mod pool;
mod users;

pub use pool::{create_pool, DbPool};
pub use users::*;
