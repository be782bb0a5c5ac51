//! The open/select/build sequence.
//!
//! A run is strictly linear: resolve the workspace, resolve the scheme,
//! request a build. Every handle is a local value passed from one step to
//! the next; nothing is cached between runs. Progress lines are written to
//! the caller's sink, one per step.
//!
//! The only wait is the loaded-flag poll after opening a workspace. It
//! blocks the calling thread for at most [`LoadPolicy::attempts`] checks;
//! Ctrl-C terminates the process as usual.

use std::io::Write;
use std::path::Path;
use std::thread;

use tracing::{debug, warn};

use crate::host::{XcodeHost, workspace_url};
use crate::types::{DriveError, LoadPolicy, Outcome, Selector};

/// Result of waiting for a workspace to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWait {
    /// The loaded flag turned true on the given check (1-based).
    Loaded { attempts: u32 },
    /// Every check in the budget answered false.
    Exhausted { attempts: u32 },
}

/// Result of resolving a scheme selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeResolution<S> {
    /// The scheme is active in the workspace and exists.
    Selected { scheme: S, name: String },
    /// No scheme with the requested name exists.
    NotFound { name: String, available: Vec<String> },
}

/// Checks the workspace's loaded flag until it is true or the budget runs out.
///
/// Sleeps `policy.interval` between checks, never after the last one.
pub fn wait_until_loaded<H: XcodeHost>(
    host: &H,
    workspace: &H::Workspace,
    policy: &LoadPolicy,
) -> Result<LoadWait, DriveError> {
    for attempt in 1..=policy.attempts {
        if host.loaded(workspace)? {
            debug!(attempt, "workspace loaded");
            return Ok(LoadWait::Loaded { attempts: attempt });
        }
        if attempt < policy.attempts {
            thread::sleep(policy.interval);
        }
    }
    Ok(LoadWait::Exhausted {
        attempts: policy.attempts,
    })
}

/// Resolves the workspace selector to a loaded workspace.
///
/// * `.` asks Xcode for its active workspace; `Ok(None)` when there is none.
/// * A path is opened as a `file://` URL and polled until loaded.
///
/// # Errors
///
/// [`DriveError::LoadTimeout`] when the workspace never reports loaded.
pub fn resolve_workspace<H: XcodeHost, W: Write>(
    host: &H,
    selector: &Selector,
    policy: &LoadPolicy,
    out: &mut W,
) -> Result<Option<H::Workspace>, DriveError> {
    match selector {
        Selector::Current => {
            writeln!(out, "get active workspace")?;
            let workspace = host.active_workspace_document()?;
            if workspace.is_none() {
                writeln!(out, "no active workspace, choose one with path or in xcode")?;
            }
            Ok(workspace)
        }
        Selector::Named(path) => {
            writeln!(out, "open workspace {}", path)?;
            let url = workspace_url(Path::new(path))?;
            let workspace = host.open(&url)?;
            match wait_until_loaded(host, &workspace, policy)? {
                LoadWait::Loaded { .. } => Ok(Some(workspace)),
                LoadWait::Exhausted { attempts } => {
                    writeln!(out, "workspace loaded timedout, try again later")?;
                    Err(DriveError::LoadTimeout {
                        path: path.clone(),
                        attempts,
                    })
                }
            }
        }
    }
}

/// Resolves the scheme selector inside `workspace`.
///
/// `.` reports the active scheme and changes nothing. A name is looked up
/// exactly; when it exists it becomes the workspace's active scheme, which
/// Xcode shows to the user and to any other tool watching it.
pub fn resolve_scheme<H: XcodeHost, W: Write>(
    host: &H,
    workspace: &H::Workspace,
    selector: &Selector,
    out: &mut W,
) -> Result<SchemeResolution<H::Scheme>, DriveError> {
    match selector {
        Selector::Current => {
            let scheme = host.active_scheme(workspace)?;
            let name = host.scheme_name(&scheme)?;
            writeln!(out, "active scheme is {}", name)?;
            Ok(SchemeResolution::Selected { scheme, name })
        }
        Selector::Named(wanted) => {
            writeln!(out, "get scheme by {}", wanted)?;
            let scheme = host.scheme_by_name(workspace, wanted)?;
            if !host.scheme_exists(&scheme)? {
                writeln!(out, "scheme not exist in workspace")?;
                let available = host.scheme_names(workspace).unwrap_or_else(|e| {
                    warn!(error = %e, "could not list schemes");
                    Vec::new()
                });
                if !available.is_empty() {
                    writeln!(out, "available schemes: {}", available.join(", "))?;
                }
                return Ok(SchemeResolution::NotFound {
                    name: wanted.clone(),
                    available,
                });
            }
            let name = host.scheme_name(&scheme)?;
            writeln!(out, "active scheme {}", name)?;
            host.set_active_scheme(workspace, &scheme)?;
            Ok(SchemeResolution::Selected { scheme, name })
        }
    }
}

/// Runs the open/select/build sequence with the default [`LoadPolicy`].
///
/// # Example
///
/// ```no_run
/// use xcdrive_sdk::{drive, OsascriptHost, Selector};
///
/// let host = OsascriptHost::new("Xcode");
/// let outcome = drive(
///     &host,
///     &Selector::parse("App.xcworkspace"),
///     &Selector::parse("Release"),
///     &mut std::io::stdout(),
/// )?;
/// println!("{:?}", outcome);
/// # Ok::<(), xcdrive_sdk::DriveError>(())
/// ```
pub fn drive<H: XcodeHost, W: Write>(
    host: &H,
    workspace: &Selector,
    scheme: &Selector,
    out: &mut W,
) -> Result<Outcome, DriveError> {
    Driver::new(host).run(workspace, scheme, out)
}

/// Builder for a run against one host.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use xcdrive_sdk::{Driver, LoadPolicy, OsascriptHost, Selector};
///
/// let host = OsascriptHost::new("Xcode-beta");
/// let outcome = Driver::new(&host)
///     .load_policy(LoadPolicy::new(30, Duration::from_millis(500)))
///     .run(&Selector::Current, &Selector::Current, &mut std::io::stdout())?;
/// # Ok::<(), xcdrive_sdk::DriveError>(())
/// ```
#[derive(Debug)]
pub struct Driver<'h, H> {
    host: &'h H,
    load_policy: LoadPolicy,
}

impl<'h, H: XcodeHost> Driver<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self {
            host,
            load_policy: LoadPolicy::default(),
        }
    }

    /// Sets the loaded-flag polling budget
    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    /// Resolves workspace and scheme, then requests a build.
    ///
    /// The build is fire-and-forget: this returns as soon as Xcode has
    /// accepted the request, and the build result is never observed.
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome::Built)` - A build was requested
    /// * `Ok(Outcome::NoActiveWorkspace)` / `Ok(Outcome::SchemeNotFound)` - Stopped early, nothing built
    /// * `Err(DriveError)` - Load timeout or bridge failure
    pub fn run<W: Write>(
        &self,
        workspace: &Selector,
        scheme: &Selector,
        out: &mut W,
    ) -> Result<Outcome, DriveError> {
        let Some(resolved) = resolve_workspace(self.host, workspace, &self.load_policy, out)?
        else {
            return Ok(Outcome::NoActiveWorkspace);
        };

        let name = match resolve_scheme(self.host, &resolved, scheme, out)? {
            SchemeResolution::Selected { name, .. } => name,
            SchemeResolution::NotFound { name, available } => {
                return Ok(Outcome::SchemeNotFound { name, available });
            }
        };

        writeln!(out, "build")?;
        self.host.build(&resolved)?;
        Ok(Outcome::Built { scheme: name })
    }

    /// Resolves the workspace and prints its scheme names, one per line.
    pub fn list_schemes<W: Write>(
        &self,
        workspace: &Selector,
        out: &mut W,
    ) -> Result<Outcome, DriveError> {
        let Some(resolved) = resolve_workspace(self.host, workspace, &self.load_policy, out)?
        else {
            return Ok(Outcome::NoActiveWorkspace);
        };

        let schemes = self.host.scheme_names(&resolved)?;
        for name in &schemes {
            writeln!(out, "{}", name)?;
        }
        Ok(Outcome::Listed { schemes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;
    use url::Url;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Open(String),
        ActiveWorkspace,
        Loaded,
        ActiveScheme,
        SchemeByName(String),
        SetActiveScheme(String),
        Build,
        SchemeName,
        SchemeExists(String),
        SchemeNames,
    }

    /// Xcode stand-in that records every bridge call.
    struct FakeXcode {
        active_workspace: Option<u32>,
        loaded_on_poll: Option<u32>,
        schemes: Vec<String>,
        active: RefCell<String>,
        polls: Cell<u32>,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeXcode {
        fn new() -> Self {
            Self {
                active_workspace: Some(1),
                loaded_on_poll: Some(1),
                schemes: vec!["App".into(), "Release".into()],
                active: RefCell::new("App".into()),
                polls: Cell::new(0),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.borrow().iter().filter(|c| *c == call).count()
        }

        fn record(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl XcodeHost for FakeXcode {
        type Workspace = u32;
        type Scheme = String;

        fn open(&self, url: &Url) -> Result<u32, DriveError> {
            self.record(Call::Open(url.to_string()));
            Ok(7)
        }

        fn active_workspace_document(&self) -> Result<Option<u32>, DriveError> {
            self.record(Call::ActiveWorkspace);
            Ok(self.active_workspace)
        }

        fn loaded(&self, _workspace: &u32) -> Result<bool, DriveError> {
            self.record(Call::Loaded);
            let poll = self.polls.get() + 1;
            self.polls.set(poll);
            Ok(self.loaded_on_poll.is_some_and(|n| poll >= n))
        }

        fn active_scheme(&self, _workspace: &u32) -> Result<String, DriveError> {
            self.record(Call::ActiveScheme);
            Ok(self.active.borrow().clone())
        }

        fn scheme_by_name(&self, _workspace: &u32, name: &str) -> Result<String, DriveError> {
            self.record(Call::SchemeByName(name.to_string()));
            Ok(name.to_string())
        }

        fn set_active_scheme(&self, _workspace: &u32, scheme: &String) -> Result<(), DriveError> {
            self.record(Call::SetActiveScheme(scheme.clone()));
            *self.active.borrow_mut() = scheme.clone();
            Ok(())
        }

        fn build(&self, _workspace: &u32) -> Result<(), DriveError> {
            self.record(Call::Build);
            Ok(())
        }

        fn scheme_name(&self, scheme: &String) -> Result<String, DriveError> {
            self.record(Call::SchemeName);
            Ok(scheme.clone())
        }

        fn scheme_exists(&self, scheme: &String) -> Result<bool, DriveError> {
            self.record(Call::SchemeExists(scheme.clone()));
            Ok(self.schemes.contains(scheme))
        }

        fn scheme_names(&self, _workspace: &u32) -> Result<Vec<String>, DriveError> {
            self.record(Call::SchemeNames);
            Ok(self.schemes.clone())
        }
    }

    fn fast_policy(attempts: u32) -> LoadPolicy {
        LoadPolicy::new(attempts, Duration::ZERO)
    }

    fn run(host: &FakeXcode, workspace: &str, scheme: Option<&str>) -> (Result<Outcome, DriveError>, String) {
        let mut out = Vec::new();
        let result = Driver::new(host).load_policy(fast_policy(100)).run(
            &Selector::parse(workspace),
            &Selector::from_optional(scheme),
            &mut out,
        );
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_current_workspace_queried_once() {
        let host = FakeXcode::new();
        let (result, output) = run(&host, ".", None);
        assert_eq!(result.unwrap(), Outcome::Built { scheme: "App".into() });
        assert_eq!(host.count(&Call::ActiveWorkspace), 1);
        assert_eq!(host.count(&Call::Loaded), 0);
        assert!(output.starts_with("get active workspace\n"));
    }

    #[test]
    fn test_no_active_workspace_stops_before_build() {
        let mut host = FakeXcode::new();
        host.active_workspace = None;
        let (result, output) = run(&host, ".", Some("Release"));
        assert_eq!(result.unwrap(), Outcome::NoActiveWorkspace);
        assert!(output.contains("no active workspace, choose one with path or in xcode"));
        assert_eq!(host.calls(), vec![Call::ActiveWorkspace]);
    }

    #[test]
    fn test_path_opened_once_as_absolute_file_url() {
        let host = FakeXcode::new();
        let (result, output) = run(&host, "/Users/dev/App/App.xcworkspace", None);
        assert!(result.is_ok());
        let calls = host.calls();
        let opens: Vec<&Call> = calls.iter().filter(|c| matches!(c, Call::Open(_))).collect();
        assert_eq!(
            opens,
            vec![&Call::Open("file:///Users/dev/App/App.xcworkspace".into())]
        );
        assert!(output.starts_with("open workspace /Users/dev/App/App.xcworkspace\n"));
    }

    #[test]
    fn test_relative_path_resolved_against_cwd() {
        let host = FakeXcode::new();
        let (result, _) = run(&host, "App.xcworkspace", None);
        assert!(result.is_ok());
        let expected = Url::from_file_path(std::env::current_dir().unwrap().join("App.xcworkspace"))
            .unwrap()
            .to_string();
        assert_eq!(host.calls()[0], Call::Open(expected));
    }

    #[test]
    fn test_loaded_on_third_poll_builds_active_scheme() {
        let mut host = FakeXcode::new();
        host.loaded_on_poll = Some(3);
        let (result, output) = run(&host, "/tmp/App.xcworkspace", Some("."));
        assert_eq!(result.unwrap(), Outcome::Built { scheme: "App".into() });
        assert_eq!(
            host.calls(),
            vec![
                Call::Open("file:///tmp/App.xcworkspace".into()),
                Call::Loaded,
                Call::Loaded,
                Call::Loaded,
                Call::ActiveScheme,
                Call::SchemeName,
                Call::Build,
            ]
        );
        assert!(output.contains("active scheme is App\n"));
        assert!(output.ends_with("build\n"));
    }

    #[test]
    fn test_load_timeout_after_budget() {
        let mut host = FakeXcode::new();
        host.loaded_on_poll = None;
        let mut out = Vec::new();
        let err = Driver::new(&host)
            .load_policy(fast_policy(5))
            .run(
                &Selector::parse("/tmp/App.xcworkspace"),
                &Selector::Current,
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(err, DriveError::LoadTimeout { attempts: 5, .. }));
        assert_eq!(err.exit_code(), crate::types::EXIT_LOAD_TIMEOUT);
        assert_eq!(host.count(&Call::Loaded), 5);
        assert_eq!(host.count(&Call::Build), 0);
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("workspace loaded timedout, try again later"));
    }

    #[test]
    fn test_default_budget_is_one_hundred_polls() {
        let mut host = FakeXcode::new();
        host.loaded_on_poll = None;
        let policy = LoadPolicy {
            interval: Duration::ZERO,
            ..LoadPolicy::default()
        };
        let wait = wait_until_loaded(&host, &7, &policy).unwrap();
        assert_eq!(wait, LoadWait::Exhausted { attempts: 100 });
        assert_eq!(host.count(&Call::Loaded), 100);
    }

    #[test]
    fn test_wait_reports_attempt_that_loaded() {
        let mut host = FakeXcode::new();
        host.loaded_on_poll = Some(4);
        let wait = wait_until_loaded(&host, &7, &fast_policy(10)).unwrap();
        assert_eq!(wait, LoadWait::Loaded { attempts: 4 });
    }

    #[test]
    fn test_missing_scheme_never_builds() {
        let mut host = FakeXcode::new();
        host.schemes = vec!["App".into(), "AppTests".into()];
        let (result, output) = run(&host, ".", Some("Release"));
        assert_eq!(
            result.unwrap(),
            Outcome::SchemeNotFound {
                name: "Release".into(),
                available: vec!["App".into(), "AppTests".into()],
            }
        );
        assert!(output.contains("scheme not exist in workspace\n"));
        assert!(output.contains("available schemes: App, AppTests\n"));
        assert_eq!(host.count(&Call::Build), 0);
        assert!(!host.calls().iter().any(|c| matches!(c, Call::SetActiveScheme(_))));
    }

    #[test]
    fn test_named_scheme_assigned_before_build() {
        let host = FakeXcode::new();
        let (result, output) = run(&host, ".", Some("Release"));
        assert_eq!(result.unwrap(), Outcome::Built { scheme: "Release".into() });
        let calls = host.calls();
        let assigned = calls
            .iter()
            .position(|c| *c == Call::SetActiveScheme("Release".into()))
            .expect("scheme assigned");
        let built = calls.iter().position(|c| *c == Call::Build).expect("build requested");
        assert!(assigned < built);
        assert_eq!(host.count(&Call::Build), 1);
        assert_eq!(*host.active.borrow(), "Release");
        assert!(output.contains("get scheme by Release\n"));
        assert!(output.contains("active scheme Release\n"));
        assert!(!calls.contains(&Call::ActiveScheme));
    }

    #[test]
    fn test_repeated_runs_same_assignment() {
        let host = FakeXcode::new();
        let (first, _) = run(&host, ".", Some("Release"));
        let (second, _) = run(&host, ".", Some("Release"));
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(host.count(&Call::SetActiveScheme("Release".into())), 2);
        assert_eq!(host.count(&Call::Build), 2);
        assert_eq!(*host.active.borrow(), "Release");
    }

    #[test]
    fn test_list_schemes_does_not_build() {
        let host = FakeXcode::new();
        let mut out = Vec::new();
        let outcome = Driver::new(&host)
            .list_schemes(&Selector::Current, &mut out)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Listed {
                schemes: vec!["App".into(), "Release".into()],
            }
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "get active workspace\nApp\nRelease\n"
        );
        assert_eq!(host.count(&Call::Build), 0);
    }

    #[test]
    fn test_drive_uses_default_policy() {
        let host = FakeXcode::new();
        let mut out = Vec::new();
        let outcome = drive(&host, &Selector::Current, &Selector::Current, &mut out).unwrap();
        assert_eq!(outcome, Outcome::Built { scheme: "App".into() });
    }
}
