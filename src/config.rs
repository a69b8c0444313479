// src/config.rs

use std::env;
use std::net::SocketAddr;
use dotenvy::dotenv;

/// Time budget of a quiz created without an explicit limit (15 minutes).
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 15 * 60;

/// Lost compare-and-swap races tolerated before a session write gives up.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Default and maximum leaderboard length.
pub const LEADERBOARD_SIZE: usize = 10;
pub const LEADERBOARD_MAX: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. Without one the service keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub default_time_limit_secs: u32,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let default_time_limit_secs = env::var("DEFAULT_TIME_LIMIT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIME_LIMIT_SECS);

        let log_dir = env::var("LOG_DIR")
            .unwrap_or_else(|_| "logs".to_string());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            default_time_limit_secs,
            log_dir,
        }
    }
}
