//! # xcdrive
//!
//! Command-line tool for opening an Xcode workspace, picking a scheme and
//! starting a build, without touching the Xcode window.
//!
//! ## Usage
//!
//! ```bash
//! # Build the active scheme of the workspace Xcode has open
//! xcdrive .
//!
//! # Open a workspace (waiting for it to load) and build its active scheme
//! xcdrive ./App.xcworkspace
//!
//! # Open a workspace and build the "Release" scheme
//! xcdrive ./App.xcworkspace Release
//!
//! # Use whatever is open, but switch to "AppTests" first
//! xcdrive . AppTests
//! ```
//!
//! `.` in either position means "the one that is currently active in Xcode".
//! The build is requested and not awaited: `xcdrive` exits as soon as Xcode
//! has accepted it.
//!
//! ## Exit Status
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0` | Build requested, or stopped early without `--strict` |
//! | `16` | The workspace never finished loading |
//! | `17` | No active workspace (`--strict` only) |
//! | `18` | Scheme does not exist (`--strict` only) |
//! | `1` | Any other error (bridge failure, bad configuration) |
//!
//! ## Global Flags
//!
//! - **`--dry-run`** - Print each bridge call instead of running it
//! - **`--verbose` / `-v`** - Print every `osascript` invocation and debug logs
//!
//! Settings can also come from `xcdrive.toml`; see [`config`].

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use xcdrive_sdk::{DriveError, Driver, OsascriptHost, Outcome, Selector};

pub mod config;

use config::{CliOverrides, ConfigResolver, EnvOverrides};

/// Opens an Xcode workspace, selects a scheme and requests a build.
#[derive(Parser, Debug)]
#[command(
    name = "xcdrive",
    author,
    version,
    about = "Open an Xcode workspace, pick a scheme and start a build",
    long_about = None,
    override_usage = "xcdrive <path_to_workspace> [scheme]",
    after_help = "path_to_workspace, scheme can use . as current"
)]
pub struct Cli {
    /// Workspace or project path, or `.` for the active workspace
    #[arg(value_name = "path_to_workspace")]
    workspace: Option<String>,

    /// Scheme name, or `.` (the default) for the active scheme
    #[arg(value_name = "scheme")]
    scheme: Option<String>,

    /// Path to an xcdrive.toml (otherwise discovered from the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Application to script, e.g. "Xcode-beta"
    #[arg(long)]
    application: Option<String>,

    /// How many times to check whether an opened workspace has loaded
    #[arg(long)]
    load_attempts: Option<u32>,

    /// Milliseconds between two load checks
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Exit non-zero when there is no active workspace or the scheme is missing
    #[arg(long)]
    strict: bool,

    /// Print the workspace's schemes instead of building
    #[arg(long)]
    list_schemes: bool,

    /// Print what would be done without actually doing it
    #[arg(long)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Entry point used by the `xcdrive` binary.
///
/// Returns the process exit status for runs that did not fail.
pub fn run() -> Result<i32> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli, EnvOverrides::from_env, &mut std::io::stdout(), std::io::stdout())
}

/// Maps an error returned by [`run`] to a process exit status.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DriveError>()
        .map(DriveError::exit_code)
        .unwrap_or(1)
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded in another tool.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs a parsed command line.
///
/// Driver progress goes to `out` and echoed bridge calls to `console`. The
/// environment is only read once there is something to run, so usage is
/// printed even when an `XCDRIVE_*` variable is malformed.
fn execute<W, E>(cli: Cli, env: E, out: &mut W, console: impl Write + Send + 'static) -> Result<i32>
where
    W: Write,
    E: FnOnce() -> Result<EnvOverrides>,
{
    let Some(workspace) = cli.workspace.as_deref() else {
        Cli::command().write_help(out)?;
        writeln!(out)?;
        return Ok(0);
    };

    let env = env()?;

    let resolver = ConfigResolver::load(cli.config.as_deref())?;
    if cli.verbose {
        if let Some(path) = &resolver.config_path {
            writeln!(out, "Using config {}", path.display())?;
        }
    }

    let overrides = CliOverrides {
        application: cli.application.clone(),
        load_attempts: cli.load_attempts,
        poll_interval_ms: cli.poll_interval_ms,
        strict: cli.strict,
    };
    let settings = resolver.settings(&overrides, &env)?;
    debug!(?settings, "resolved settings");

    let host = OsascriptHost::new(settings.application.as_str())
        .program(settings.osascript.clone())
        .verbose(cli.verbose)
        .dry_run(cli.dry_run)
        .console(console);
    let driver = Driver::new(&host).load_policy(settings.load_policy);

    let workspace = Selector::parse(workspace);
    let outcome = if cli.list_schemes {
        driver.list_schemes(&workspace, out)?
    } else {
        driver.run(&workspace, &Selector::from_optional(cli.scheme.as_deref()), out)?
    };
    debug!(?outcome, "run finished");

    if let Outcome::Built { scheme } = &outcome {
        if cli.dry_run {
            writeln!(out, "[dry-run] would build {}", scheme)?;
        }
    }

    Ok(outcome.exit_code(settings.strict))
}
