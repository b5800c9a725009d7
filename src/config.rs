//! Process configuration read from the environment (`dotenv` + `std::env`),
//! following the teacher's `Config::from_env` idiom in `main.rs`/
//! `vault/fast15m_reactive.rs`: a `Default` impl for the fallback values,
//! then a `from_env` pass that overrides whatever's set, tolerating
//! unparsable values by keeping the default rather than failing startup.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub primary_db_path: String,
    pub unified_db_path: String,
    pub http_bind_addr: String,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_db_path: "funding_primary.db".to_string(),
            unified_db_path: "funding_unified.db".to_string(),
            http_bind_addr: "0.0.0.0:8080".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = env::var("PRIMARY_DB_PATH") {
            cfg.primary_db_path = v;
        }
        if let Ok(v) = env::var("UNIFIED_DB_PATH") {
            cfg.unified_db_path = v;
        }
        if let Ok(v) = env::var("HTTP_BIND_ADDR") {
            cfg.http_bind_addr = v;
        }
        if let Ok(v) = env::var("RUST_LOG") {
            cfg.log_filter = v;
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_any_env_vars() {
        let cfg = Config::default();
        assert!(!cfg.primary_db_path.is_empty());
        assert!(!cfg.unified_db_path.is_empty());
        assert!(cfg.http_bind_addr.contains(':'));
    }
}
