//! `config.yaml` — the default configuration generated for socks-lb.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::settings::Settings;

/// Top-level socks-lb configuration. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub listen_host: String,
    pub listen_port: u16,
    #[serde(default = "ServiceConfig::default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    #[serde(default = "ServiceConfig::default_current_proxy_check_interval")]
    pub current_proxy_check_interval_seconds: u64,
    #[serde(default = "ServiceConfig::default_connection_timeout")]
    pub connection_timeout_ms: u64,
    /// URL fetched through each proxy to measure it.
    #[serde(default = "ServiceConfig::default_test_url")]
    pub test_url: String,
    #[serde(default = "ServiceConfig::default_test_rounds")]
    pub test_rounds: u32,
    /// Forward stdout/stderr of proxy subprocesses into the service log.
    #[serde(default)]
    pub log_subprocess_output: bool,
    #[serde(default)]
    pub proxies: Vec<ProxyEntry>,
}

/// One proxy backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyEntry {
    /// Backend type, e.g. "direct".
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub name: String,
    #[serde(default = "ProxyEntry::default_enabled")]
    pub enabled: bool,
    /// Backend-specific settings; `direct` uses `host` and `port`.
    #[serde(default)]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceConfig {
    fn default_health_check_interval() -> u64 { 30 }
    fn default_current_proxy_check_interval() -> u64 { 10 }
    fn default_connection_timeout() -> u64 { 5000 }
    fn default_test_url() -> String { "http://www.gstatic.com/generate_204".into() }
    fn default_test_rounds() -> u32 { 3 }

    /// The document written at install time.
    pub fn generate(settings: &Settings) -> Self {
        let mut direct = BTreeMap::new();
        direct.insert("host".to_string(), serde_yaml::Value::from("127.0.0.1"));
        direct.insert(
            "port".to_string(),
            serde_yaml::Value::from(u64::from(settings.upstream_port)),
        );

        Self {
            listen_host: settings.listen_host.clone(),
            listen_port: settings.listen_port,
            health_check_interval_seconds: Self::default_health_check_interval(),
            current_proxy_check_interval_seconds: Self::default_current_proxy_check_interval(),
            connection_timeout_ms: Self::default_connection_timeout(),
            test_url: Self::default_test_url(),
            test_rounds: Self::default_test_rounds(),
            log_subprocess_output: false,
            proxies: vec![ProxyEntry {
                proxy_type: "direct".into(),
                name: "upstream".into(),
                enabled: true,
                config: direct,
            }],
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let body = serde_yaml::to_string(self).context("failed to serialize config")?;
        Ok(format!(
            "# socks-lb configuration, generated by socks-lb-installer.\n\
             # Edits are kept across re-installs unless --regenerate-config is given.\n{}",
            body
        ))
    }
}

impl ProxyEntry {
    fn default_enabled() -> bool { true }
}
