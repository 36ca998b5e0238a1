//! Shared application state, built once at startup.

use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DbPool,
    pub token_keys: TokenKeys,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let token_keys = TokenKeys::new(&config.jwt_secret, config.jwt_ttl_minutes);
        Self {
            config: Arc::new(config),
            db,
            token_keys,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn token_keys(&self) -> &TokenKeys {
        &self.token_keys
    }
}
