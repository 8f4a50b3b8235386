//! Typed configuration loaded from the environment (spec §6.4), following
//! the teacher's `Config::from_env` idiom: `dotenvy::dotenv().ok()` then
//! `std::env::var` with parse-and-default, no panics on missing values.

use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_path =
            env::var("LATTICE_DB_PATH").unwrap_or_else(|_| "./data/lattice.db".to_string());
        let port = env::var("LATTICE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        Ok(Self {
            database_path,
            port,
        })
    }
}

/// Tunables the spec calls out as "compiled in" rather than
/// environment-overridable (§4.2, §4.5), gathered in one place so every
/// knob is visible without hunting through the modules that consume them.
pub mod defaults {
    pub use crate::application::services::compactor::{
        DEFAULT_INTERVAL as COMPACTOR_INTERVAL, DEFAULT_KEEP_RECENT as COMPACTOR_KEEP_RECENT,
        DEFAULT_UPDATE_THRESHOLD as COMPACTOR_UPDATE_THRESHOLD,
    };
    pub use crate::infrastructure::realtime::rate_limiter::{
        SWEEP_INTERVAL as RATE_LIMITER_SWEEP_INTERVAL,
        SWEEP_THRESHOLD as RATE_LIMITER_SWEEP_THRESHOLD,
    };
    pub use crate::application::services::version_service::AUTO_VERSION_RETENTION;
}
