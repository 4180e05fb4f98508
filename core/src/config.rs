use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BuildError, Result};
use crate::idmap::{IdMap, IdMappings};

/// Default build-file name inside a build context.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Default bound on symlink expansions during one path resolution.
pub const DEFAULT_MAX_SYMLINKS: usize = 255;

/// Builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Build-file name used when the caller passes an empty path
    pub dockerfile: String,

    /// Platform the image is built for
    pub target_os: TargetOs,

    /// Maximum symlink expansions per path resolution
    pub max_symlinks: usize,

    /// Container-to-host UID ranges
    pub uid_map: Vec<IdMap>,

    /// Container-to-host GID ranges
    pub gid_map: Vec<IdMap>,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            target_os: TargetOs::current(),
            max_symlinks: DEFAULT_MAX_SYMLINKS,
            uid_map: Vec::new(),
            gid_map: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl BuilderConfig {
    /// Parse a YAML document. JSON is accepted too, being a YAML subset.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: BuilderConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: BuilderConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(BuildError::ConfigError(format!(
                    "Unsupported config format: {}",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dockerfile.is_empty() {
            return Err(BuildError::ConfigError(
                "dockerfile name must not be empty".to_string(),
            ));
        }
        if self.max_symlinks == 0 {
            return Err(BuildError::ConfigError(
                "max_symlinks must be at least 1".to_string(),
            ));
        }
        for map in self.uid_map.iter().chain(self.gid_map.iter()) {
            map.validate()?;
        }
        Ok(())
    }

    /// ID mapping table for this build.
    pub fn id_mappings(&self) -> IdMappings {
        IdMappings::from_maps(self.uid_map.clone(), self.gid_map.clone())
    }
}

/// Target platform of the image being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Linux,
    Windows,
}

impl Default for TargetOs {
    fn default() -> Self {
        Self::current()
    }
}

impl TargetOs {
    /// Platform of the running builder.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// Shell used to wrap shell-form commands.
    pub fn default_shell(&self) -> Vec<String> {
        let shell: &[&str] = match self {
            Self::Linux => &["/bin/sh", "-c"],
            Self::Windows => &["cmd", "/S", "/C"],
        };
        shell.iter().map(|s| s.to_string()).collect()
    }
}

impl std::fmt::Display for TargetOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

impl std::str::FromStr for TargetOs {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(format!("unsupported target os: '{}' (supported: linux, windows)", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}
