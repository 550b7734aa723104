//! User-facing output for the pinsmith CLI.
//!
//! Progress, warnings, and the fatal failure line all go to stderr; stdout
//! is reserved for machine-readable results. Writes are best-effort.

use crate::error::ForgeError;
use crate::graph::BuildPlan;
use std::io::Write;

/// Prefix of non-fatal warning lines.
pub const WARNING_PREFIX: &str = "WARNING:";

/// Write a single line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Emit a non-fatal warning on both the log facade and `stderr`.
///
/// Warnings are shown even in quiet mode.
pub fn emit_warning(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    log::warn!("{message}");
    write_stderr_line(stderr, format!("{WARNING_PREFIX} {message}"));
}

/// Render the process-level failure line, e.g.
/// `FATAL [IntegrityError]: integrity check failed for ...`.
///
/// # Example
///
/// ```
/// use pinsmith::error::ForgeError;
/// use pinsmith::output::fatal_line;
///
/// let line = fatal_line(&ForgeError::config("unknown feature \"ip5\""));
/// assert!(line.starts_with("FATAL [ConfigError]: "));
/// ```
#[must_use]
pub fn fatal_line(err: &ForgeError) -> String {
    format!("FATAL [{}]: {err}", err.kind())
}

/// Format a build plan for `build --dry-run`.
#[must_use]
pub fn plan_text(plan: &BuildPlan) -> String {
    let mut lines = vec![
        "Dry run - nothing will be downloaded or built".to_owned(),
        String::new(),
        format!("Variant: {}", plan.variant),
        format!("Link directive: {}", plan.link_mode),
    ];
    if let Some(jobs) = plan.jobs {
        lines.push(format!("Parallel jobs: {jobs}"));
    }
    lines.push(String::new());
    lines.push("Units in build order:".to_owned());
    for unit in &plan.units {
        let version = unit.version_pin.as_deref().unwrap_or("latest");
        lines.push(format!("  - {} ({version})", unit.name));
        if !unit.configure_flags.is_empty() {
            lines.push(format!("      {}", unit.configure_flags.join(" ")));
        }
    }
    lines.join("\n")
}
