//! [`XcodeHost`] backed by `osascript -l JavaScript`.
//!
//! Each bridge call renders one script from [`super::script`], pipes it to
//! a fresh `osascript` process and decodes the single JSON value the
//! script returns. Because nothing survives between processes, handles
//! carry the workspace document path and are re-resolved on every call.
//!
//! ## Error Messages
//!
//! Failures include the script that was running, the exit status and
//! both output streams, plus the usual fix: granting the terminal
//! automation access to Xcode under System Settings > Privacy & Security >
//! Automation.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use super::XcodeHost;
use super::script::{self, Script, ScriptVar};
use crate::types::DriveError;

/// Default application name passed to `Application(...)`.
pub const DEFAULT_APPLICATION: &str = "Xcode";

/// Default interpreter binary.
pub const DEFAULT_OSASCRIPT: &str = "osascript";

/// Workspace reference used by [`OsascriptHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRef {
    /// Document path as reported by Xcode.
    pub path: String,
}

/// Scheme reference used by [`OsascriptHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRef {
    pub workspace: String,
    pub name: String,
}

/// Talks to Xcode by running JXA scripts through `osascript`.
///
/// # Example
///
/// ```no_run
/// use xcdrive_sdk::host::{OsascriptHost, XcodeHost};
///
/// let host = OsascriptHost::new("Xcode").verbose(true);
/// if let Some(workspace) = host.active_workspace_document()? {
///     host.build(&workspace)?;
/// }
/// # Ok::<(), xcdrive_sdk::DriveError>(())
/// ```
#[derive(Clone)]
pub struct OsascriptHost {
    /// Application name, e.g. "Xcode" or "Xcode-beta"
    application: String,
    /// Interpreter binary
    program: PathBuf,
    /// Whether to echo each bridge call
    verbose: bool,
    /// Print calls instead of running them
    dry_run: bool,
    /// Where `[dry-run]` and `Running:` lines go
    console: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for OsascriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsascriptHost")
            .field("application", &self.application)
            .field("program", &self.program)
            .field("verbose", &self.verbose)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl OsascriptHost {
    /// Creates a host that scripts the given application.
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            program: PathBuf::from(DEFAULT_OSASCRIPT),
            verbose: false,
            dry_run: false,
            console: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
        }
    }

    /// Overrides the `osascript` binary.
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Enables printing every bridge call before it runs.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Prints bridge calls instead of running them.
    ///
    /// Queries then answer with neutral values so a whole run can be
    /// previewed: workspaces are loaded, looked-up schemes exist.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sends echoed bridge calls to `console` instead of stdout.
    pub fn console(mut self, console: impl Write + Send + 'static) -> Self {
        self.console = Arc::new(Mutex::new(Box::new(console)));
        self
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    fn call<T: DeserializeOwned>(
        &self,
        script: Script,
        vars: &[ScriptVar<'_>],
        dry_value: T,
    ) -> Result<T, DriveError> {
        let source = script::render(script, &self.application, vars)?;
        let described = describe(script, vars);

        if self.dry_run {
            self.echo(format_args!("[dry-run] {} -l JavaScript {}", self.program.display(), described))?;
            trace!(script = script.file_name(), %source, "dry-run script");
            return Ok(dry_value);
        }
        if self.verbose {
            self.echo(format_args!("  Running: {} -l JavaScript {}", self.program.display(), described))?;
        }
        debug!(script = script.file_name(), "running bridge script");
        trace!(%source, "bridge script source");

        let stdout = self.run_osascript(script, &source)?;
        debug!(script = script.file_name(), output = %stdout.trim(), "bridge script finished");

        serde_json::from_str(stdout.trim()).map_err(DriveError::from)
    }

    fn echo(&self, line: fmt::Arguments<'_>) -> Result<(), DriveError> {
        let mut console = self.console.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        console.write_fmt(line)?;
        console.write_all(b"\n")?;
        console.flush()?;
        Ok(())
    }

    fn run_osascript(&self, script: Script, source: &str) -> Result<String, DriveError> {
        let mut child = Command::new(&self.program)
            .args(["-l", "JavaScript", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DriveError::Bridge(format!(
                    "Failed to start {}.\n\n\
                     Error: {}\n\n\
                     xcdrive needs macOS with Xcode installed; set `osascript` in xcdrive.toml \
                     if the interpreter lives elsewhere.",
                    self.program.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriveError::Bridge(format!(
                "{} failed.\n\n\
                 Exit status: {}\n\n\
                 Stdout:\n{}\n\n\
                 Stderr:\n{}\n\n\
                 If {} refused the Apple Event, allow your terminal to control it under \
                 System Settings > Privacy & Security > Automation.",
                script.file_name(),
                output.status,
                stdout.trim(),
                stderr.trim(),
                self.application
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for OsascriptHost {
    fn default() -> Self {
        Self::new(DEFAULT_APPLICATION)
    }
}

fn describe(script: Script, vars: &[ScriptVar<'_>]) -> String {
    let mut line = script.file_name().to_string();
    for var in vars {
        line.push_str(&format!(" {}={:?}", var.name, var.value));
    }
    line
}

fn path_var(path: &str) -> ScriptVar<'_> {
    ScriptVar { name: "PATH", value: path }
}

impl XcodeHost for OsascriptHost {
    type Workspace = WorkspaceRef;
    type Scheme = SchemeRef;

    fn open(&self, url: &Url) -> Result<WorkspaceRef, DriveError> {
        let path = url
            .to_file_path()
            .map_err(|_| DriveError::InvalidPath(format!("{} is not a file URL", url)))?;
        let path = path.to_string_lossy();
        let opened: String = self.call(Script::Open, &[path_var(&path)], path.to_string())?;
        Ok(WorkspaceRef { path: opened })
    }

    fn active_workspace_document(&self) -> Result<Option<WorkspaceRef>, DriveError> {
        let path: Option<String> = self.call(
            Script::ActiveWorkspace,
            &[],
            Some("<active workspace>".to_string()),
        )?;
        Ok(path.map(|path| WorkspaceRef { path }))
    }

    fn loaded(&self, workspace: &WorkspaceRef) -> Result<bool, DriveError> {
        self.call(Script::Loaded, &[path_var(&workspace.path)], true)
    }

    fn active_scheme(&self, workspace: &WorkspaceRef) -> Result<SchemeRef, DriveError> {
        let name: String = self.call(
            Script::ActiveScheme,
            &[path_var(&workspace.path)],
            "<active scheme>".to_string(),
        )?;
        Ok(SchemeRef {
            workspace: workspace.path.clone(),
            name,
        })
    }

    fn scheme_by_name(&self, workspace: &WorkspaceRef, name: &str) -> Result<SchemeRef, DriveError> {
        // Lazy like `schemes.byName`; existence is checked separately.
        Ok(SchemeRef {
            workspace: workspace.path.clone(),
            name: name.to_string(),
        })
    }

    fn set_active_scheme(
        &self,
        workspace: &WorkspaceRef,
        scheme: &SchemeRef,
    ) -> Result<(), DriveError> {
        let _: bool = self.call(
            Script::SetActiveScheme,
            &[
                path_var(&workspace.path),
                ScriptVar {
                    name: "SCHEME",
                    value: &scheme.name,
                },
            ],
            true,
        )?;
        Ok(())
    }

    fn build(&self, workspace: &WorkspaceRef) -> Result<(), DriveError> {
        let _: bool = self.call(Script::Build, &[path_var(&workspace.path)], true)?;
        Ok(())
    }

    fn scheme_name(&self, scheme: &SchemeRef) -> Result<String, DriveError> {
        Ok(scheme.name.clone())
    }

    fn scheme_exists(&self, scheme: &SchemeRef) -> Result<bool, DriveError> {
        self.call(
            Script::SchemeExists,
            &[
                path_var(&scheme.workspace),
                ScriptVar {
                    name: "SCHEME",
                    value: &scheme.name,
                },
            ],
            true,
        )
    }

    fn scheme_names(&self, workspace: &WorkspaceRef) -> Result<Vec<String>, DriveError> {
        self.call(Script::Schemes, &[path_var(&workspace.path)], Vec::new())
    }
}
