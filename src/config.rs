//! WolfQuorum Configuration
//!
//! Node-level settings loaded from TOML. The quorum membership itself lives
//! in a separate dynamic configuration file (see [`crate::quorum::QuorumConfig`]),
//! referenced from here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::quorum::{PolicyKind, QuorumConfig, ServerId};
use crate::reconfig::ReconfigDriver;

/// Main WolfQuorum configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfQuorumConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Quorum configuration
    #[serde(default)]
    pub quorum: QuorumSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This server's id in the quorum configuration
    pub id: ServerId,
}

/// Quorum configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumSettings {
    /// Policy override (default: chosen from the dynamic config contents)
    #[serde(default)]
    pub policy: Option<PolicyKind>,

    /// Allow membership changes at runtime
    #[serde(default = "default_true")]
    pub reconfig_enabled: bool,

    /// Path of the dynamic membership file
    #[serde(default)]
    pub dynamic_config: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for QuorumSettings {
    fn default() -> Self {
        Self {
            policy: None,
            reconfig_enabled: true,
            dynamic_config: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WolfQuorumConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: WolfQuorumConfig = toml::from_str(&content)?;
        config.validate()?;

        // relative dynamic config paths are resolved against the TOML file
        if let (Some(dynamic), Some(dir)) = (&config.quorum.dynamic_config, path.parent()) {
            if dynamic.is_relative() {
                config.quorum.dynamic_config = Some(dir.join(dynamic));
            }
        }
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfQuorumConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id == 0 {
            return Err(crate::Error::Config("node.id must be positive".into()));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(crate::Error::Config(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Load the dynamic membership file, if one is configured
    pub fn load_quorum_config(&self) -> crate::Result<Option<QuorumConfig>> {
        let Some(path) = &self.quorum.dynamic_config else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(path)?;
        let config = QuorumConfig::parse_with_policy(&content, self.quorum.policy)?;

        if config.all_members().get(&self.node.id).is_none() {
            tracing::warn!(
                "Node {} is not a member of the configuration in {:?}",
                self.node.id,
                path
            );
        }
        tracing::info!(
            "Loaded quorum config v{:x}: {} voters, {} observers, {} policy",
            config.version(),
            config.voting_members().len(),
            config.observing_members().len(),
            config.policy_kind()
        );
        Ok(Some(config))
    }

    /// Build a reconfiguration driver from the dynamic membership file
    pub fn reconfig_driver(&self) -> crate::Result<ReconfigDriver> {
        let committed = self.load_quorum_config()?.ok_or_else(|| {
            crate::Error::Config("quorum.dynamic_config is not set".into())
        })?;
        Ok(ReconfigDriver::new(
            Arc::new(committed),
            self.quorum.reconfig_enabled,
        ))
    }
}
