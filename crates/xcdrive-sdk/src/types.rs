//! Core types for xcdrive-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`DriveError`] - Error types for bridge calls and workspace loading
//! - [`Selector`] - The `.` sentinel or an explicit workspace path / scheme name
//! - [`LoadPolicy`] - Attempt budget and interval for the loaded-flag poll
//! - [`Outcome`] - How a run ended when it did not fail

use std::fmt;
use std::time::Duration;

/// Argument value meaning "use the one that is currently active in Xcode".
pub const CURRENT_SENTINEL: &str = ".";

/// Process exit status reserved for a workspace that never finished loading.
pub const EXIT_LOAD_TIMEOUT: i32 = 16;

/// Exit status for [`Outcome::NoActiveWorkspace`] in strict mode.
pub const EXIT_NO_ACTIVE_WORKSPACE: i32 = 17;

/// Exit status for [`Outcome::SchemeNotFound`] in strict mode.
pub const EXIT_SCHEME_NOT_FOUND: i32 = 18;

/// Error types for xcdrive-sdk operations.
///
/// # Example
///
/// ```ignore
/// use xcdrive_sdk::{drive, DriveError};
///
/// match drive(&host, &workspace, &scheme, &mut std::io::stdout()) {
///     Ok(outcome) => println!("{:?}", outcome),
///     Err(DriveError::LoadTimeout { attempts, .. }) => {
///         eprintln!("gave up after {} polls", attempts);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    /// The loaded flag never turned true within the attempt budget.
    #[error("workspace {path} did not finish loading after {attempts} attempts, try again later")]
    LoadTimeout { path: String, attempts: u32 },

    /// A workspace path could not be turned into an absolute file URL.
    #[error("invalid workspace path: {0}")]
    InvalidPath(String),

    /// The scripting bridge could not be reached or rejected a script.
    ///
    /// Common causes:
    /// - `osascript` is missing (not running on macOS)
    /// - the terminal has not been granted automation access to Xcode
    /// - the workspace was closed between two calls
    #[error("automation bridge error: {0}")]
    Bridge(String),

    /// A bridge script rendered with unreplaced placeholders or does not exist.
    #[error("script error: {0}")]
    Script(String),

    /// A bridge script printed something that is not the expected JSON value.
    #[error("could not decode bridge output: {0}")]
    Decode(#[from] serde_json::Error),

    /// An I/O error occurred while writing diagnostics or resolving paths.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    /// Process exit status for this error.
    ///
    /// Load timeouts use the reserved [`EXIT_LOAD_TIMEOUT`]; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriveError::LoadTimeout { .. } => EXIT_LOAD_TIMEOUT,
            _ => 1,
        }
    }
}

/// Workspace or scheme selection from the command line.
///
/// # Example
///
/// ```
/// use xcdrive_sdk::Selector;
///
/// assert_eq!(Selector::parse("."), Selector::Current);
/// assert_eq!(Selector::parse("Release"), Selector::Named("Release".into()));
/// assert_eq!(Selector::from_optional(None), Selector::Current);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Use the workspace or scheme that is active in Xcode.
    Current,
    /// A workspace path or exact scheme name.
    Named(String),
}

impl Selector {
    /// Parses a raw argument, mapping the `.` sentinel to [`Selector::Current`].
    pub fn parse(raw: &str) -> Self {
        if raw == CURRENT_SENTINEL {
            Selector::Current
        } else {
            Selector::Named(raw.to_string())
        }
    }

    /// Like [`Selector::parse`], treating a missing argument as [`Selector::Current`].
    pub fn from_optional(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or(Selector::Current)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Current => f.write_str(CURRENT_SENTINEL),
            Selector::Named(name) => f.write_str(name),
        }
    }
}

/// Bounded wait for a freshly opened workspace.
///
/// The loaded flag is checked up to `attempts` times with `interval`
/// between checks, so the wait is at most `(attempts - 1) * interval`
/// plus bridge latency.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use xcdrive_sdk::LoadPolicy;
///
/// let policy = LoadPolicy::default();
/// assert_eq!(policy.attempts, 100);
/// assert_eq!(policy.interval, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Number of times the loaded flag is checked.
    pub attempts: u32,
    /// Sleep between two checks.
    pub interval: Duration,
}

impl LoadPolicy {
    /// Default number of loaded-flag checks.
    pub const DEFAULT_ATTEMPTS: u32 = 100;

    /// Default sleep between checks.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

/// How a run ended when no error occurred.
///
/// Only [`Outcome::Built`] means a build request reached Xcode. The other
/// variants are early exits that the CLI reports with exit status 0 unless
/// strict mode is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A build was requested with the named scheme active.
    Built { scheme: String },
    /// The `.` workspace selector was used but Xcode has no active workspace.
    NoActiveWorkspace,
    /// The requested scheme does not exist in the workspace.
    SchemeNotFound {
        name: String,
        /// Scheme names the workspace does contain.
        available: Vec<String>,
    },
    /// Schemes were listed instead of building.
    Listed { schemes: Vec<String> },
}

impl Outcome {
    /// Exit status for this outcome.
    ///
    /// Early exits are only distinguished from success when `strict` is set.
    pub fn exit_code(&self, strict: bool) -> i32 {
        match (self, strict) {
            (Outcome::NoActiveWorkspace, true) => EXIT_NO_ACTIVE_WORKSPACE,
            (Outcome::SchemeNotFound { .. }, true) => EXIT_SCHEME_NOT_FOUND,
            _ => 0,
        }
    }
}
