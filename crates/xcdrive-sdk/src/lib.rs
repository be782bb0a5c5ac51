//! Xcode build driving for Rust
//!
//! `xcdrive-sdk` opens (or reuses) an Xcode workspace, selects a scheme and
//! asks Xcode to build it, all through Xcode's JavaScript for Automation
//! bridge. Xcode does the actual work; this crate only sequences the calls.
//!
//! # Quick Start
//!
//! ```no_run
//! use xcdrive_sdk::{Driver, OsascriptHost, Outcome, Selector};
//!
//! let host = OsascriptHost::new("Xcode");
//! let outcome = Driver::new(&host).run(
//!     &Selector::parse("MyApp.xcworkspace"),
//!     &Selector::parse("MyApp"),
//!     &mut std::io::stdout(),
//! )?;
//! assert!(matches!(outcome, Outcome::Built { .. }));
//! # Ok::<(), xcdrive_sdk::DriveError>(())
//! ```
//!
//! # Architecture
//!
//! - **Host**: [`host::XcodeHost`] is the bridge surface; [`OsascriptHost`]
//!   implements it with embedded JXA scripts run by `osascript`
//! - **Driver**: [`Driver`] resolves the workspace, waits for it to load,
//!   resolves the scheme and requests the build
//! - **Types**: [`Selector`], [`LoadPolicy`], [`Outcome`] and [`DriveError`]
//!
//! The build request is fire-and-forget. Nothing here reports whether the
//! build Xcode starts eventually succeeds.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod driver;
pub mod host;
pub mod types;

pub use driver::{Driver, LoadWait, SchemeResolution, drive, resolve_scheme, resolve_workspace, wait_until_loaded};
pub use host::{OsascriptHost, XcodeHost, workspace_url};
pub use types::{
    CURRENT_SENTINEL, DriveError, EXIT_LOAD_TIMEOUT, EXIT_NO_ACTIVE_WORKSPACE,
    EXIT_SCHEME_NOT_FOUND, LoadPolicy, Outcome, Selector,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
