//! Daemon configuration: TOML file plus environment overrides

use std::path::Path;
use std::time::Duration;

use aggr_client::BackendConfig;
use aggr_gateway::{AggregatorOptions, DEFAULT_FIND_ALL_BATCH};
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregatordConfig {
    pub server: ServerConfig,
    pub features: FeatureConfig,
    pub backends: BackendsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub legacy_routes: bool,
    pub fail_open_liveness: bool,
    pub find_all_batch_size: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            legacy_routes: true,
            fail_open_liveness: true,
            find_all_batch_size: DEFAULT_FIND_ALL_BATCH,
        }
    }
}

/// Backend base URLs; `-` or an empty string disables a backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub permission_search_url: String,
    pub device_repo_url: String,
    pub connection_log_url: String,
    pub process_engine_url: String,
    pub process_deployment_url: String,
    pub event_manager_url: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            permission_search_url: "http://permission-search:8080".to_string(),
            device_repo_url: "http://device-repository:8080".to_string(),
            connection_log_url: "http://connectionlog:8080".to_string(),
            process_engine_url: "http://process-engine-wrapper:8080".to_string(),
            process_deployment_url: "http://process-deployment:8080".to_string(),
            event_manager_url: "-".to_string(),
        }
    }
}

impl BackendsConfig {
    /// Client settings for one backend URL with the shared timeouts
    pub fn client(&self, url: &str) -> BackendConfig {
        BackendConfig::new(url).with_timeouts(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.connect_timeout_ms),
        )
    }
}

impl AggregatordConfig {
    /// Read `path` (or start from defaults) and apply environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVER_PORT") {
            self.server.port = v.trim().parse().context("SERVER_PORT")?;
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.server.log_format = match v.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => anyhow::bail!("LOG_FORMAT must be text or json, got '{}'", other),
            };
        }
        if let Some(v) = get("LEGACY_ROUTES") {
            self.features.legacy_routes = parse_bool("LEGACY_ROUTES", &v)?;
        }
        if let Some(v) = get("FAIL_OPEN_LIVENESS") {
            self.features.fail_open_liveness = parse_bool("FAIL_OPEN_LIVENESS", &v)?;
        }
        if let Some(v) = get("BACKEND_TIMEOUT_MS") {
            self.backends.timeout_ms = v.trim().parse().context("BACKEND_TIMEOUT_MS")?;
        }

        let backends = &mut self.backends;
        for (key, target) in [
            ("PERMISSION_SEARCH_URL", &mut backends.permission_search_url),
            ("DEVICE_REPO_URL", &mut backends.device_repo_url),
            ("CONNECTION_LOG_URL", &mut backends.connection_log_url),
            ("PROCESS_ENGINE_URL", &mut backends.process_engine_url),
            ("PROCESS_DEPLOYMENT_URL", &mut backends.process_deployment_url),
            ("EVENT_MANAGER_URL", &mut backends.event_manager_url),
        ] {
            if let Some(v) = get(key) {
                *target = v.trim().to_string();
            }
        }
        Ok(())
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            fail_open_liveness: self.features.fail_open_liveness,
            find_all_batch_size: self.features.find_all_batch_size,
            ..Default::default()
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: AggregatordConfig = toml::from_str("").unwrap();
        assert_eq!(config, AggregatordConfig::default());
        assert_eq!(config.server.port, 8080);
        assert!(config.features.fail_open_liveness);
        assert_eq!(config.backends.event_manager_url, "-");
    }

    #[test]
    fn test_partial_file() {
        let config: AggregatordConfig = toml::from_str(
            r#"
            [server]
            log_format = "json"

            [features]
            legacy_routes = false

            [backends]
            connection_log_url = "http://localhost:9001"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert!(!config.features.legacy_routes);
        assert_eq!(config.features.find_all_batch_size, 9999);
        assert_eq!(config.backends.connection_log_url, "http://localhost:9001");
        assert_eq!(config.backends.timeout_ms, 10_000);
    }

    #[test]
    fn test_overrides() {
        let mut config = AggregatordConfig::default();
        config
            .apply_overrides(lookup(&[
                ("SERVER_PORT", "9090"),
                ("LOG_FORMAT", "JSON"),
                ("FAIL_OPEN_LIVENESS", "false"),
                ("EVENT_MANAGER_URL", "http://event-manager:8080"),
                ("BACKEND_TIMEOUT_MS", "250"),
                ("DEVICE_REPO_URL", ""),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert!(!config.features.fail_open_liveness);
        assert_eq!(config.backends.event_manager_url, "http://event-manager:8080");
        assert_eq!(config.backends.timeout_ms, 250);
        // Empty values do not override
        assert_eq!(config.backends.device_repo_url, "http://device-repository:8080");

        let options = config.aggregator_options();
        assert!(!options.fail_open_liveness);
        assert_eq!(options.rights, "r");
    }

    #[test]
    fn test_invalid_overrides() {
        for pairs in [
            [("SERVER_PORT", "eighty")],
            [("LEGACY_ROUTES", "maybe")],
            [("LOG_FORMAT", "xml")],
        ] {
            let mut config = AggregatordConfig::default();
            assert!(config.apply_overrides(lookup(&pairs)).is_err());
        }
    }

    #[test]
    fn test_client_config_uses_shared_timeouts() {
        let backends = BackendsConfig {
            timeout_ms: 1500,
            connect_timeout_ms: 200,
            ..Default::default()
        };
        let client = backends.client(&backends.connection_log_url);
        assert_eq!(client.url, "http://connectionlog:8080");
        assert_eq!(client.timeout, Duration::from_millis(1500));
        assert_eq!(client.connect_timeout, Duration::from_millis(200));
    }

    #[test]
    #[serial]
    fn test_load_file_then_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7000\n\n[features]\nlegacy_routes = false").unwrap();

        std::env::set_var("LEGACY_ROUTES", "true");
        let config = AggregatordConfig::load(Some(file.path()));
        std::env::remove_var("LEGACY_ROUTES");

        let config = config.unwrap();
        assert_eq!(config.server.port, 7000);
        assert!(config.features.legacy_routes);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AggregatordConfig::load(Some(&missing)).is_err());
    }
}
