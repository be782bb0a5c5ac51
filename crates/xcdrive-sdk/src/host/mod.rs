//! Access to Xcode's automation bridge.
//!
//! [`XcodeHost`] is the narrow surface the driver needs from Xcode. The
//! real implementation, [`OsascriptHost`], renders the JXA scripts in
//! [`script`] and runs them through `osascript -l JavaScript`; tests use a
//! recording fake instead.
//!
//! ## Bridge calls
//!
//! | Method | JXA equivalent |
//! |--------|----------------|
//! | [`XcodeHost::open`] | `xcode.open(path)` |
//! | [`XcodeHost::active_workspace_document`] | `xcode.activeWorkspaceDocument()` |
//! | [`XcodeHost::loaded`] | `workspace.loaded()` |
//! | [`XcodeHost::active_scheme`] | `workspace.activeScheme()` |
//! | [`XcodeHost::scheme_by_name`] | `workspace.schemes.byName(name)` |
//! | [`XcodeHost::set_active_scheme`] | `workspace.activeScheme = scheme` |
//! | [`XcodeHost::build`] | `workspace.build()` |
//! | [`XcodeHost::scheme_name`] | `scheme.name()` |
//! | [`XcodeHost::scheme_exists`] | `scheme.exists()` |
//! | [`XcodeHost::scheme_names`] | `workspace.schemes().map(s => s.name())` |

pub mod osascript;
pub mod script;

pub use osascript::OsascriptHost;

use std::path::{Path, absolute};

use url::Url;

use crate::types::DriveError;

/// Xcode's automation interface as seen by the driver.
///
/// Handles are opaque to the driver. Xcode owns the documents behind
/// them; nothing here closes or releases a workspace.
pub trait XcodeHost {
    /// Reference to an open workspace document.
    type Workspace: Clone + std::fmt::Debug;
    /// Reference to a scheme inside a workspace.
    type Scheme: Clone + std::fmt::Debug;

    /// Asks Xcode to open the workspace at `url` (a `file://` URL).
    fn open(&self, url: &Url) -> Result<Self::Workspace, DriveError>;

    /// Returns the workspace focused in Xcode, if any.
    fn active_workspace_document(&self) -> Result<Option<Self::Workspace>, DriveError>;

    /// Whether Xcode has finished loading the workspace.
    fn loaded(&self, workspace: &Self::Workspace) -> Result<bool, DriveError>;

    fn active_scheme(&self, workspace: &Self::Workspace) -> Result<Self::Scheme, DriveError>;

    /// Looks a scheme up by exact name. The handle may refer to a scheme
    /// that does not exist; check with [`XcodeHost::scheme_exists`].
    fn scheme_by_name(
        &self,
        workspace: &Self::Workspace,
        name: &str,
    ) -> Result<Self::Scheme, DriveError>;

    fn set_active_scheme(
        &self,
        workspace: &Self::Workspace,
        scheme: &Self::Scheme,
    ) -> Result<(), DriveError>;

    /// Requests a build of the active scheme. Does not wait for the result.
    fn build(&self, workspace: &Self::Workspace) -> Result<(), DriveError>;

    fn scheme_name(&self, scheme: &Self::Scheme) -> Result<String, DriveError>;

    fn scheme_exists(&self, scheme: &Self::Scheme) -> Result<bool, DriveError>;

    /// Names of every scheme in the workspace, in Xcode's order.
    fn scheme_names(&self, workspace: &Self::Workspace) -> Result<Vec<String>, DriveError>;
}

/// Converts a workspace path into an absolute `file://` URL.
///
/// Relative paths are resolved against the current directory. A path that
/// exists is canonicalized so it matches the document path Xcode reports
/// (`/tmp` is `/private/tmp` on macOS); a missing one is only made absolute
/// and left for Xcode to reject.
pub fn workspace_url(path: &Path) -> Result<Url, DriveError> {
    let absolute = match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => absolute(path).map_err(|e| {
            DriveError::InvalidPath(format!("{}: {}", path.display(), e))
        })?,
    };
    Url::from_file_path(&absolute).map_err(|_| {
        DriveError::InvalidPath(format!(
            "{} cannot be expressed as a file URL",
            absolute.display()
        ))
    })
}
