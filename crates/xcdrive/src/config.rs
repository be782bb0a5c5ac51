//! Configuration file support for xcdrive.
//!
//! This module provides support for `xcdrive.toml` configuration files so
//! that per-project settings (which Xcode to script, how long to wait for a
//! workspace to load) do not have to be passed on every invocation.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The path given with `--config`
//! 2. Current working directory (`./xcdrive.toml`)
//! 3. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [xcode]
//! application = "Xcode-beta"
//! osascript = "/usr/bin/osascript"
//!
//! [load]
//! attempts = 100
//! interval_ms = 1000
//!
//! [behavior]
//! strict = true
//! ```
//!
//! ## Precedence
//!
//! CLI flags, then `XCDRIVE_*` environment variables (a `.env` file is
//! honoured), then the config file, then built-in defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use xcdrive_sdk::LoadPolicy;
use xcdrive_sdk::host::osascript::{DEFAULT_APPLICATION, DEFAULT_OSASCRIPT};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcdrive.toml";

/// Environment variable overriding `xcode.application`.
pub const ENV_APPLICATION: &str = "XCDRIVE_APPLICATION";
/// Environment variable overriding `load.attempts`.
pub const ENV_LOAD_ATTEMPTS: &str = "XCDRIVE_LOAD_ATTEMPTS";
/// Environment variable overriding `load.interval_ms`.
pub const ENV_POLL_INTERVAL_MS: &str = "XCDRIVE_POLL_INTERVAL_MS";

/// Root configuration structure for `xcdrive.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XcdriveConfig {
    /// Which application to script and how.
    pub xcode: XcodeConfig,

    /// Workspace load polling.
    pub load: LoadConfig,

    /// Exit status behaviour.
    pub behavior: BehaviorConfig,
}

/// Scripting target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XcodeConfig {
    /// Application name passed to `Application(...)`.
    ///
    /// Defaults to "Xcode". Use "Xcode-beta" to drive a beta install.
    pub application: String,

    /// Path or name of the `osascript` binary.
    pub osascript: PathBuf,
}

impl Default for XcodeConfig {
    fn default() -> Self {
        Self {
            application: DEFAULT_APPLICATION.to_string(),
            osascript: PathBuf::from(DEFAULT_OSASCRIPT),
        }
    }
}

/// Loaded-flag polling after opening a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Number of checks before giving up.
    ///
    /// Defaults to 100. Must be at least 1.
    pub attempts: u32,

    /// Milliseconds between checks.
    ///
    /// Defaults to 1000.
    pub interval_ms: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            attempts: LoadPolicy::DEFAULT_ATTEMPTS,
            interval_ms: LoadPolicy::DEFAULT_INTERVAL.as_millis() as u64,
        }
    }
}

/// Exit status behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Exit non-zero when there is no active workspace (17) or the scheme
    /// does not exist (18). Both exit 0 otherwise.
    pub strict: bool,
}

impl XcdriveConfig {
    /// Loads configuration from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Ok(XcdriveConfig)` - Successfully loaded configuration
    /// * `Err` - If the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcdriveConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }
}

/// Values read from `XCDRIVE_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub application: Option<String>,
    pub load_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}

impl EnvOverrides {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let load_attempts: Option<u32> = match get(ENV_LOAD_ATTEMPTS) {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number, got {:?}", ENV_LOAD_ATTEMPTS, raw))?,
            ),
            None => None,
        };
        let poll_interval_ms: Option<u64> = match get(ENV_POLL_INTERVAL_MS) {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{} must be milliseconds, got {:?}", ENV_POLL_INTERVAL_MS, raw))?,
            ),
            None => None,
        };

        Ok(Self {
            application: get(ENV_APPLICATION),
            load_attempts,
            poll_interval_ms,
        })
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub application: Option<String>,
    pub load_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub strict: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub application: String,
    pub osascript: PathBuf,
    pub load_policy: LoadPolicy,
    pub strict: bool,
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over environment variables, which
/// take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcdriveConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a resolver from an explicit file, or by discovery when `explicit` is `None`.
    ///
    /// An explicit file that cannot be read is an error; discovery finding
    /// nothing is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = XcdriveConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }

        match XcdriveConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcdriveConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Merges CLI flags, environment and config file into [`Settings`].
    pub fn settings(&self, cli: &CliOverrides, env: &EnvOverrides) -> Result<Settings> {
        let defaults = XcdriveConfig::default();

        let application = self.resolve(
            cli.application.clone().or_else(|| env.application.clone()),
            |c| Some(c.xcode.application.clone()),
            defaults.xcode.application,
        );
        let osascript = self.resolve(None, |c| Some(c.xcode.osascript.clone()), defaults.xcode.osascript);
        let attempts = self.resolve(
            cli.load_attempts.or(env.load_attempts),
            |c| Some(c.load.attempts),
            defaults.load.attempts,
        );
        let interval_ms = self.resolve(
            cli.poll_interval_ms.or(env.poll_interval_ms),
            |c| Some(c.load.interval_ms),
            defaults.load.interval_ms,
        );
        let strict = cli.strict || self.config.as_ref().is_some_and(|c| c.behavior.strict);

        if attempts == 0 {
            bail!("load attempts must be at least 1 (check --load-attempts, {} or [load] attempts)", ENV_LOAD_ATTEMPTS);
        }
        if application.trim().is_empty() {
            bail!("application name must not be empty (check --application, {} or [xcode] application)", ENV_APPLICATION);
        }

        Ok(Settings {
            application,
            osascript,
            load_policy: LoadPolicy::new(attempts, Duration::from_millis(interval_ms)),
            strict,
        })
    }
}
