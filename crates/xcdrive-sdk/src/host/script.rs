//! JXA bridge scripts and their rendering.
//!
//! Every script under `scripts/` is embedded at compile time. A rendered
//! script is `prelude.js` followed by the named script, with `{{NAME}}`
//! placeholders replaced by JSON literals so arbitrary paths and scheme
//! names cannot break out of their string.

use include_dir::{Dir, include_dir};

use crate::types::DriveError;

const SCRIPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/scripts");

const PRELUDE: &str = "prelude.js";

/// A bridge script shipped with the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    ActiveWorkspace,
    Open,
    Loaded,
    ActiveScheme,
    SchemeExists,
    SetActiveScheme,
    Schemes,
    Build,
}

impl Script {
    /// File name under `scripts/`.
    pub fn file_name(&self) -> &'static str {
        match self {
            Script::ActiveWorkspace => "active_workspace.js",
            Script::Open => "open.js",
            Script::Loaded => "loaded.js",
            Script::ActiveScheme => "active_scheme.js",
            Script::SchemeExists => "scheme_exists.js",
            Script::SetActiveScheme => "set_active_scheme.js",
            Script::Schemes => "schemes.js",
            Script::Build => "build.js",
        }
    }
}

/// Template variable substituted into a script as a JSON string literal.
#[derive(Debug, Clone)]
pub struct ScriptVar<'a> {
    pub name: &'static str,
    pub value: &'a str,
}

/// Renders `script` with the shared prelude and the given variables.
///
/// `APPLICATION` is always provided from `application`; every other
/// placeholder the script uses must be present in `vars`.
pub fn render(
    script: Script,
    application: &str,
    vars: &[ScriptVar<'_>],
) -> Result<String, DriveError> {
    let prelude = embedded(PRELUDE)?;
    let body = embedded(script.file_name())?;

    let mut all = Vec::with_capacity(vars.len() + 1);
    all.push(ScriptVar {
        name: "APPLICATION",
        value: application,
    });
    all.extend_from_slice(vars);

    render_template(&format!("{}\n{}", prelude, body), &all, script)
}

fn embedded(file_name: &str) -> Result<&'static str, DriveError> {
    SCRIPTS
        .get_file(file_name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| DriveError::Script(format!("embedded script {} not found", file_name)))
}

// Single pass, so a value that itself contains `{{...}}` is never expanded.
fn render_template(
    input: &str,
    vars: &[ScriptVar<'_>],
    script: Script,
) -> Result<String, DriveError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            DriveError::Script(format!(
                "{} has an unterminated placeholder",
                script.file_name()
            ))
        })?;
        let name = &after[..end];
        let var = vars.iter().find(|var| var.name == name).ok_or_else(|| {
            DriveError::Script(format!(
                "{} has no value for placeholder {{{{{}}}}}",
                script.file_name(),
                name
            ))
        })?;
        output.push_str(&serde_json::to_string(var.value)?);
        rest = &after[end + 2..];
    }
    output.push_str(rest);
    Ok(output)
}
