use crate::{
    DEFAULT_MIN_BLOCK, DEFAULT_PAGE_SIZE, DEFAULT_WINDOW_SIZE,
    listing::validate_governor_address,
    scanner::ScannerSettings,
};
use alloy::primitives::Address;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{env, fs, num::NonZeroU64, time::Duration};
use tracing::{info, warn};
use utils::errors::{ETHEREUM_NODE_URL_NOT_SET, SCANNER_GOVERNORS_NOT_SET};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub rpc_url: Option<String>,
    pub governors: Vec<String>,
    pub window_size: u64,
    pub min_block: u64,
    pub state_path: String,
    pub scan_interval_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub http_port: u16,
    pub default_page_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            governors: Vec::new(),
            window_size: DEFAULT_WINDOW_SIZE,
            min_block: DEFAULT_MIN_BLOCK,
            state_path: "scanner-state.json".to_string(),
            scan_interval_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 2_000,
            http_port: 3000,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ScannerConfig {
    pub fn rpc_url(&self) -> Result<&str> {
        self.rpc_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .context(ETHEREUM_NODE_URL_NOT_SET)
    }

    pub fn governor_addresses(&self) -> Result<Vec<Address>> {
        if self.governors.is_empty() {
            return Err(anyhow!(SCANNER_GOVERNORS_NOT_SET));
        }

        self.governors
            .iter()
            .map(|governor| {
                validate_governor_address(governor)
                    .with_context(|| format!("Invalid governor address: {governor:?}"))
            })
            .collect()
    }

    pub fn scanner_settings(&self) -> Result<ScannerSettings> {
        let window_size =
            NonZeroU64::new(self.window_size).context("window_size must be greater than zero")?;

        Ok(ScannerSettings {
            window_size,
            min_block: self.min_block,
        })
    }

    pub fn scan_interval(&self) -> Result<Duration> {
        if self.scan_interval_secs == 0 {
            return Err(anyhow!("scan_interval_secs must be greater than zero"));
        }
        Ok(Duration::from_secs(self.scan_interval_secs))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Reads `SCANNER_CONFIG_PATH` (default `scanner.yaml`), then applies
/// environment overrides. A missing or unparsable file falls back to defaults.
pub fn load() -> ScannerConfig {
    let path = env::var("SCANNER_CONFIG_PATH").unwrap_or_else(|_| "scanner.yaml".to_string());
    let mut config = match fs::read_to_string(&path) {
        Ok(contents) => match serde_yaml::from_str::<ScannerConfig>(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, path = %path, "Failed to parse scanner config, using defaults");
                ScannerConfig::default()
            }
        },
        Err(err) => {
            warn!(error = %err, path = %path, "Scanner config not found, using defaults");
            ScannerConfig::default()
        }
    };

    apply_env_overrides(&mut config);

    info!(
        governors = config.governors.len(),
        window_size = config.window_size,
        min_block = config.min_block,
        state_path = %config.state_path,
        "Scanner config loaded"
    );

    config
}

fn apply_env_overrides(config: &mut ScannerConfig) {
    if let Ok(value) = env::var("ETHEREUM_NODE_URL") {
        config.rpc_url = Some(value);
    }

    if let Ok(value) = env::var("SCANNER_GOVERNORS") {
        config.governors = value
            .split(',')
            .map(str::trim)
            .filter(|governor| !governor.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Ok(value) = env::var("SCANNER_STATE_PATH") {
        config.state_path = value;
    }

    if let Ok(value) = env::var("PORT") {
        match value.parse() {
            Ok(port) => config.http_port = port,
            Err(err) => warn!(error = %err, value = %value, "Failed to parse PORT override"),
        }
    }
}
