use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModesError, Result};
use crate::scanner::{ScanRules, DEFAULT_EXCLUDED_NAMES, DEFAULT_INCLUDED_HIDDEN, DEFAULT_MAX_DEPTH};

const CONFIG_FILE: &str = "custom-modes.toml";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# custom-modes engine configuration
# Location: <global storage>/settings/custom-modes.toml

[scan]
# Entry names that are never descended into or read while scanning
# mode directories
exclude = [".git", ".svn", ".hg", "node_modules", "target", "dist", "build", "out", "__pycache__", ".cache", ".DS_Store", "Thumbs.db"]

# Hidden directories that are still walked (overrides exclude)
include = [".kilocode"]

# Maximum directory depth below a mode directory root
max_depth = 16
"#;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Directory scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    /// Entry names to skip
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Hidden names to walk anyway (overrides exclude)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_include() -> Vec<String> {
    DEFAULT_INCLUDED_HIDDEN.iter().map(|s| s.to_string()).collect()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            include: default_include(),
            max_depth: default_max_depth(),
        }
    }
}

impl EngineConfig {
    /// Load config from the settings directory
    pub fn load(settings_dir: &Path) -> Result<Self> {
        let path = settings_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| ModesError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Save config to the settings directory
    pub fn save(&self, settings_dir: &Path) -> Result<()> {
        let path = settings_dir.join(CONFIG_FILE);
        fs::create_dir_all(settings_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| ModesError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(settings_dir: &Path) -> PathBuf {
        settings_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(settings_dir: &Path) -> Result<PathBuf> {
        let path = settings_dir.join(CONFIG_FILE);
        fs::create_dir_all(settings_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "scan.exclude" => Some(format!("{:?}", self.scan.exclude)),
            "scan.include" => Some(format!("{:?}", self.scan.include)),
            "scan.max_depth" => Some(self.scan.max_depth.to_string()),
            _ => None,
        }
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "scan.exclude" => {
                self.scan.exclude = parse_string_list(value);
                Ok(())
            }
            "scan.include" => {
                self.scan.include = parse_string_list(value);
                Ok(())
            }
            "scan.max_depth" => {
                let depth = value.trim().parse().map_err(|_| ModesError::ConfigParse {
                    path: PathBuf::from(CONFIG_FILE),
                    message: format!("scan.max_depth must be a number, got '{}'", value),
                })?;
                self.scan.max_depth = depth;
                Ok(())
            }
            _ => Err(ModesError::ConfigKeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        ["scan.exclude", "scan.include", "scan.max_depth"]
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Convert to the rules the directory scanner applies
    pub fn to_scan_rules(&self) -> ScanRules {
        ScanRules {
            excluded_names: self.scan.exclude.clone(),
            included_hidden: self.scan.include.clone(),
            max_depth: self.scan.max_depth,
        }
    }
}

/// Parse a comma-separated or JSON-like list string
fn parse_string_list(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    let inner = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
