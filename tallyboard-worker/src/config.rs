/// Worker configuration
///
/// Read from the environment (`.env` is loaded first when present):
///
/// - `DATABASE_URL` (required)
/// - `DATABASE_MAX_CONNECTIONS` (default 2)
/// - `SWEEP_INTERVAL_SECS` (default 300, at least 1)

use std::env;
use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub sweep_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?
            .unwrap_or(2);

        let interval_secs = lookup("SWEEP_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("SWEEP_INTERVAL_SECS is invalid: {}", e))?
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        if interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be at least 1");
        }

        Ok(WorkerConfig {
            database_url,
            max_connections,
            sweep_interval: Duration::from_secs(interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgresql://localhost/tallyboard")]).unwrap();

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgresql://localhost/tallyboard"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("SWEEP_INTERVAL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_requires_database_url() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn test_rejects_bad_interval() {
        let url = ("DATABASE_URL", "postgresql://localhost/tallyboard");

        assert!(config_from(&[url, ("SWEEP_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[url, ("SWEEP_INTERVAL_SECS", "soon")]).is_err());
    }
}
