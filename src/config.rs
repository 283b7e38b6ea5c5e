//! Configuration for autotty.
//!
//! Settings are read from `~/.autotty/config.toml` unless another path is
//! given on the command line. A missing file yields the defaults.
//!
//! ```toml
//! # Program to host (optional, defaults to $SHELL or cmd.exe)
//! shell = "/bin/bash"
//! args = ["-l"]
//!
//! # Snapshot cadence in milliseconds (16-33)
//! render_interval_ms = 16
//!
//! # Bytes of recent output the rules are matched against
//! match_window_bytes = 4096
//!
//! [env]
//! LANG = "en_US.UTF-8"
//!
//! [[rule]]
//! name = "confirm"
//! pattern = '\[Y/n\]'
//! response = "Y\n"
//! once = true
//! case_sensitive = false
//! delay_ms = 0
//!
//! [[preset]]
//! label = "status"
//! command = "git status"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::automation::window::{DEFAULT_CAPACITY, MIN_CAPACITY};
use crate::core::automation::{AutomationRule, RuleError, RuleSpec};
use crate::core::pty::SpawnSpec;
use crate::core::session::Preset;

/// Fastest allowed snapshot cadence
pub const MIN_RENDER_INTERVAL_MS: u64 = 16;
/// Slowest allowed snapshot cadence
pub const MAX_RENDER_INTERVAL_MS: u64 = 33;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    InvalidRule(#[from] RuleError),

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Program to host
    pub shell: Option<String>,
    /// Arguments for the program
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
    pub render_interval_ms: u64,
    pub match_window_bytes: usize,
    #[serde(rename = "rule")]
    pub rules: Vec<RuleSpec>,
    #[serde(rename = "preset")]
    pub presets: Vec<Preset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            render_interval_ms: MIN_RENDER_INTERVAL_MS,
            match_window_bytes: DEFAULT_CAPACITY,
            rules: Vec::new(),
            presets: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content, &path)?;
        tracing::info!(
            "Loaded config from {} ({} rules, {} presets)",
            path.display(),
            config.rules.len(),
            config.presets.len()
        );
        Ok(config)
    }

    /// Parse and validate TOML text. `path` only labels errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.match_window_bytes < MIN_CAPACITY {
            return Err(ConfigError::InvalidValue {
                key: "match_window_bytes".to_string(),
                reason: format!("must be at least {}", MIN_CAPACITY),
            });
        }
        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "shell".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        for preset in &self.presets {
            if preset.command.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "preset".to_string(),
                    reason: format!("preset `{}` has no command", preset.label),
                });
            }
        }
        if self.presets.len() > 9 {
            tracing::warn!("Only the first 9 of {} presets have key bindings", self.presets.len());
        }
        // Compile once here so a bad rule stops startup
        self.compile_rules()?;
        Ok(())
    }

    /// Default config file path: `~/.autotty/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        Some(home_dir()?.join(".autotty").join("config.toml"))
    }

    /// `~/.autotty`, created if missing
    pub fn data_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".autotty");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    pub fn compile_rules(&self) -> Result<Vec<AutomationRule>, ConfigError> {
        Ok(AutomationRule::compile_all(&self.rules)?)
    }

    /// Snapshot cadence, clamped to 16-33 ms
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(
            self.render_interval_ms
                .clamp(MIN_RENDER_INTERVAL_MS, MAX_RENDER_INTERVAL_MS),
        )
    }

    /// Command to host. A command given on the command line replaces the
    /// configured shell and its arguments; the environment always applies.
    pub fn spawn_spec(&self, command: Option<&[String]>) -> SpawnSpec {
        let mut spec = match command {
            Some([program, args @ ..]) => args
                .iter()
                .fold(SpawnSpec::new(program.as_str()), |spec, arg| spec.arg(arg)),
            _ => {
                let program = self.shell.clone().unwrap_or_else(default_shell);
                self.args.iter().fold(SpawnSpec::new(program), |spec, arg| spec.arg(arg))
            }
        };
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }
        spec
    }
}

/// `$SHELL` or `/bin/sh` on POSIX, `cmd.exe` on Windows
pub fn default_shell() -> String {
    if cfg!(windows) {
        "cmd.exe".to_string()
    } else {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
