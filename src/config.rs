use crate::game::world::WorldSettings;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    pub token_secret: String,
    pub persist_interval: Duration,
    pub store_timeout: Duration,
    pub nodes_file: Option<PathBuf>,
    pub debug_commands: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let token_secret =
            non_empty("IDENTITY_TOKEN_SECRET").context("missing IDENTITY_TOKEN_SECRET")?;
        let database_url = non_empty("DATABASE_URL").unwrap_or_else(|| {
            let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let default_path = base.join("data").join("world.db");
            format!("sqlite://{}", default_path.display())
        });

        Ok(Self {
            port: non_empty("PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(8787),
            database_url,
            token_secret,
            persist_interval: Duration::from_millis(
                non_empty("PERSIST_INTERVAL_MS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(5_000),
            ),
            store_timeout: Duration::from_millis(
                non_empty("STORE_TIMEOUT_MS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(2_000),
            ),
            nodes_file: non_empty("NODES_FILE").map(PathBuf::from),
            debug_commands: non_empty("ENABLE_DEBUG_COMMANDS")
                .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE"))
                .unwrap_or(false),
        })
    }

    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            persist_interval: self.persist_interval,
            store_timeout: self.store_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn secret_is_required() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("IDENTITY_TOKEN_SECRET", "  ")])).is_err());
    }

    #[test]
    fn defaults_apply_when_values_missing_or_invalid() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("IDENTITY_TOKEN_SECRET", "s3cret"),
            ("PORT", "not-a-port"),
            ("PERSIST_INTERVAL_MS", "0"),
        ]))
        .expect("config");
        assert_eq!(config.port, 8787);
        assert_eq!(config.persist_interval, Duration::from_millis(5_000));
        assert_eq!(config.store_timeout, Duration::from_millis(2_000));
        assert!(config.database_url.starts_with("sqlite://"));
        assert!(config.nodes_file.is_none());
        assert!(!config.debug_commands);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("IDENTITY_TOKEN_SECRET", "s3cret"),
            ("PORT", "9001"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("STORE_TIMEOUT_MS", "250"),
            ("NODES_FILE", "world/nodes.json"),
            ("ENABLE_DEBUG_COMMANDS", "true"),
        ]))
        .expect("config");
        assert_eq!(config.port, 9001);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.world_settings().store_timeout, Duration::from_millis(250));
        assert_eq!(config.nodes_file, Some(PathBuf::from("world/nodes.json")));
        assert!(config.debug_commands);
    }
}
