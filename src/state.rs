use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::auth::{HashCost, TokenService};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub hash_cost: HashCost,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::minutes(config.access_token_minutes),
            chrono::Duration::days(config.refresh_token_days),
        );
        Self {
            db: Arc::new(Mutex::new(conn)),
            hash_cost: HashCost::from(&config),
            config,
            tokens,
        }
    }

    /// All booking reads and writes go through this one connection, which
    /// also serializes the conflict check with the write that follows it.
    ///
    /// A panic while the lock was held leaves the connection usable: any open
    /// transaction was rolled back when it was dropped during unwinding.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("recovering database lock after a panic");
            poisoned.into_inner()
        })
    }
}
