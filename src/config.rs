use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DEADLINE_MS: u64 = 5000;

/// Process settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    /// Upper bound for one workflow transaction.
    pub workflow_deadline: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("environment variable DATABASE_URL not been set")?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS: {}", v))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let deadline_ms = match lookup("WORKFLOW_DEADLINE_MS") {
            Some(v) => v.parse().with_context(|| format!("invalid WORKFLOW_DEADLINE_MS: {}", v))?,
            None => DEFAULT_DEADLINE_MS,
        };
        if deadline_ms == 0 {
            anyhow::bail!("WORKFLOW_DEADLINE_MS must be positive");
        }
        Ok(Config {
            database_url,
            bind_addr,
            max_connections,
            workflow_deadline: Duration::from_millis(deadline_ms),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| env.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/clubhouse")])).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/clubhouse");
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.workflow_deadline, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/clubs"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("WORKFLOW_DEADLINE_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.workflow_deadline, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("DATABASE_MAX_CONNECTIONS", "many")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("WORKFLOW_DEADLINE_MS", "0")])).is_err());
    }
}
