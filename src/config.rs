//! Configuration management.

use crate::error::{Result, RoomnetError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Persistent configuration for the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Technology used when a room does not specify one.
    pub default_technology: String,
    /// How long a member may be silent before the offline sweep evicts them.
    pub session_timeout_secs: u64,
    pub n2n: N2nConfig,
    pub zerotier: ZeroTierConfig,
    pub cleanup: CleanupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_technology: "n2n".to_string(),
            session_timeout_secs: 30 * 60,
            n2n: N2nConfig::default(),
            zerotier: ZeroTierConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// N2N backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct N2nConfig {
    /// host:port of the supernode edges rendezvous through.
    pub supernode_address: String,
    pub subnet_cidr: String,
    pub max_users_per_network: u32,
    /// Append `-r` to the edge command so clients reconnect on drops.
    pub auto_reconnect: bool,
}

impl Default for N2nConfig {
    fn default() -> Self {
        Self {
            supernode_address: "127.0.0.1:9527".to_string(),
            subnet_cidr: "10.0.0.0/24".to_string(),
            max_users_per_network: 250,
            auto_reconnect: true,
        }
    }
}

/// ZeroTier backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroTierConfig {
    pub subnet_cidr: String,
    pub max_users_per_network: u32,
}

impl Default for ZeroTierConfig {
    fn default() -> Self {
        Self { subnet_cidr: "10.144.0.0/16".to_string(), max_users_per_network: 250 }
    }
}

/// Orphan-network reclamation settings.
///
/// The engine exposes the sweeps as plain methods; `sweep_interval_secs` is
/// advisory for whatever external scheduler drives them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    /// A network idle longer than this with zero assignments is reclaimed.
    pub max_idle_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { enabled: true, sweep_interval_secs: 6 * 60 * 60, max_idle_secs: 24 * 60 * 60 }
    }
}

impl CleanupConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Load configuration from disk, falling back to defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| RoomnetError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| RoomnetError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RoomnetError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            RoomnetError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| RoomnetError::IoError { path: path.to_path_buf(), source: e })
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_technology, "n2n");
        assert_eq!(config.n2n.supernode_address, "127.0.0.1:9527");
        assert_eq!(config.n2n.subnet_cidr, "10.0.0.0/24");
        assert!(config.n2n.auto_reconnect);
        assert_eq!(config.zerotier.subnet_cidr, "10.144.0.0/16");
        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.max_idle(), Duration::from_secs(86400));
        assert_eq!(config.session_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.default_technology, "n2n");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.default_technology = "zerotier".to_string();
        config.n2n.auto_reconnect = false;
        config.cleanup.max_idle_secs = 60;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.default_technology, "zerotier");
        assert!(!loaded.n2n.auto_reconnect);
        assert_eq!(loaded.cleanup.max_idle_secs, 60);
        // Untouched sections keep their defaults
        assert_eq!(loaded.zerotier.subnet_cidr, "10.144.0.0/16");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_technology":"zerotier"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_technology, "zerotier");
        assert_eq!(config.n2n.subnet_cidr, "10.0.0.0/24");
        assert_eq!(config.session_timeout_secs, 1800);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(RoomnetError::InvalidConfig { .. })));
    }
}
