//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use xel_ledger::{GenesisConfig, LedgerConfig};
use xel_mempool::MempoolConfig;
use xel_types::{ChainParams, NetworkId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for an XEL node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`] or built in
/// code for tests. Every field has a default, so an empty file is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Chain parameter preset.
    #[serde(default)]
    pub network: NetworkId,

    // ── Mempool ─────────────────────────────────────────────────────────
    #[serde(default = "default_max_unconfirmed_transactions")]
    pub max_unconfirmed_transactions: usize,

    #[serde(default = "default_true")]
    pub enable_transaction_rebroadcasting: bool,

    #[serde(default = "default_rebroadcast_after_secs")]
    pub rebroadcast_after_secs: u64,

    #[serde(default = "default_mempool_sweep_interval_secs")]
    pub mempool_sweep_interval_secs: u64,

    // ── Download ────────────────────────────────────────────────────────
    #[serde(default = "default_download_interval_secs")]
    pub download_interval_secs: u64,

    /// Workers fetching block segments in parallel.
    #[serde(default = "default_download_threads")]
    pub download_threads: usize,

    #[serde(default = "default_segment_timeout_ms")]
    pub segment_timeout_ms: u64,

    /// Other peers that must confirm a fork before it is applied.
    #[serde(default = "default_number_of_fork_confirmations")]
    pub number_of_fork_confirmations: usize,

    // ── Derived state ───────────────────────────────────────────────────
    #[serde(default = "default_true")]
    pub trim_derived_tables: bool,

    /// Trim every this many blocks.
    #[serde(default = "default_trim_frequency")]
    pub trim_frequency: u32,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub genesis: GenesisConfig,

    // ── Forging ─────────────────────────────────────────────────────────
    #[serde(default)]
    pub forging_secret_phrases: Vec<String>,

    /// Skip the generation signature hit check. Test networks only.
    #[serde(default)]
    pub allow_fake_forging: bool,

    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./xel_data")
}

fn default_map_size() -> usize {
    1 << 34
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_unconfirmed_transactions() -> usize {
    2000
}

fn default_rebroadcast_after_secs() -> u64 {
    30
}

fn default_mempool_sweep_interval_secs() -> u64 {
    20
}

fn default_download_interval_secs() -> u64 {
    10
}

fn default_download_threads() -> usize {
    4
}

fn default_segment_timeout_ms() -> u64 {
    20_000
}

fn default_number_of_fork_confirmations() -> usize {
    2
}

fn default_trim_frequency() -> u32 {
    1000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams::for_network(self.network)
    }

    pub fn mempool(&self) -> MempoolConfig {
        MempoolConfig {
            max_unconfirmed_transactions: self.max_unconfirmed_transactions,
            enable_transaction_rebroadcasting: self.enable_transaction_rebroadcasting,
            ..MempoolConfig::default()
        }
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_millis(self.segment_timeout_ms)
    }

    fn check(&self) -> Result<(), NodeError> {
        if self.trim_frequency == 0 {
            return Err(NodeError::Config("trim_frequency must be positive".into()));
        }
        if self.download_threads == 0 {
            return Err(NodeError::Config("download_threads must be positive".into()));
        }
        if self.ledger.log_unconfirmed > 2 {
            return Err(NodeError::Config(format!(
                "ledger.log_unconfirmed must be 0, 1 or 2, got {}",
                self.ledger.log_unconfirmed
            )));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            network: NetworkId::default(),
            max_unconfirmed_transactions: default_max_unconfirmed_transactions(),
            enable_transaction_rebroadcasting: true,
            rebroadcast_after_secs: default_rebroadcast_after_secs(),
            mempool_sweep_interval_secs: default_mempool_sweep_interval_secs(),
            download_interval_secs: default_download_interval_secs(),
            download_threads: default_download_threads(),
            segment_timeout_ms: default_segment_timeout_ms(),
            number_of_fork_confirmations: default_number_of_fork_confirmations(),
            trim_derived_tables: true,
            trim_frequency: default_trim_frequency(),
            ledger: LedgerConfig::default(),
            genesis: GenesisConfig::default(),
            forging_secret_phrases: Vec::new(),
            allow_fake_forging: false,
            enable_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.trim_frequency, 1000);
        assert_eq!(config.rebroadcast_after_secs, 30);
        assert_eq!(config.ledger.trim_keep, 30_000);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = NodeConfig::from_toml_str(
            r#"
            network = "test"
            log_format = "json"
            trim_frequency = 50
            forging_secret_phrases = ["alpha"]

            [ledger]
            accounts = ["*"]
            log_unconfirmed = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.network, NetworkId::Test);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.trim_frequency, 50);
        assert_eq!(config.forging_secret_phrases, vec!["alpha".to_string()]);
        assert_eq!(config.ledger.accounts, vec!["*".to_string()]);
        assert_eq!(config.ledger.log_unconfirmed, 2);
        assert_eq!(config.chain_params().network, NetworkId::Test);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = NodeConfig::default();
        config.download_threads = 7;
        config.allow_fake_forging = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(NodeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_nonsense() {
        assert!(NodeConfig::from_toml_str("trim_frequency = 0").is_err());
        assert!(NodeConfig::from_toml_str("download_threads = 0").is_err());
        assert!(NodeConfig::from_toml_str("[ledger]\nlog_unconfirmed = 5").is_err());
        assert!(NodeConfig::from_toml_str("data_dir = 5").is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = NodeConfig::from_toml_file("/nonexistent/xel.toml").unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
