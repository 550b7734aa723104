//! Configure-and-make orchestration for one source unit.
//!
//! A [`BuildUnit`] carries everything a unit needs: its unpacked source
//! tree, configure flags, the search paths contributed by earlier units,
//! and the link directive. [`BuildExecutor`] runs the configure script,
//! `make`, and for dependencies `make install`, failing on the first
//! non-zero exit with the tail of the tool output attached.

use crate::error::{ForgeError, Result};
use crate::executor::{CommandExecutor, Invocation};
use crate::resolution::PackageRelease;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;

/// Maximum number of bytes kept from each of stdout and stderr when a step
/// fails.
pub const OUTPUT_TAIL_BYTES: usize = 4096;

/// How the final link is directed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LinkMode {
    /// Link statically (`-static`); the default when nothing is configured.
    #[default]
    Static,
    /// Pass no directive and let the toolchain decide.
    ToolchainDefault,
    /// Use the caller's linker flags verbatim.
    Custom(String),
}

impl LinkMode {
    /// Interpret a configured value: `None` is unset, `""` the toolchain
    /// default, anything else a custom directive.
    #[must_use]
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => Self::Static,
            Some("") => Self::ToolchainDefault,
            Some(custom) => Self::Custom(custom.to_owned()),
        }
    }

    /// The linker flags to add, if any.
    #[must_use]
    pub fn directive(&self) -> Option<&str> {
        match self {
            Self::Static => Some("-static"),
            Self::ToolchainDefault => None,
            Self::Custom(flags) => Some(flags),
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("-static"),
            Self::ToolchainDefault => f.write_str("toolchain default"),
            Self::Custom(flags) => f.write_str(flags),
        }
    }
}

/// Header and library directories contributed by installed dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    include: Vec<PathBuf>,
    lib: Vec<PathBuf>,
}

impl SearchPaths {
    /// Add `<prefix>/include` and `<prefix>/lib`.
    pub fn push_prefix(&mut self, prefix: &Path) {
        self.include.push(prefix.join("include"));
        self.lib.push(prefix.join("lib"));
    }

    /// Library directories in build order.
    #[must_use]
    pub fn lib_dirs(&self) -> &[PathBuf] {
        &self.lib
    }

    /// `CPPFLAGS` value, or `None` when there are no header directories.
    #[must_use]
    pub fn cppflags(&self) -> Option<String> {
        join_flags(self.include.iter().map(|dir| format!("-I{}", dir.display())))
    }

    /// `LDFLAGS` value combining library directories and `link`.
    #[must_use]
    pub fn ldflags(&self, link: &LinkMode) -> Option<String> {
        join_flags(
            self.lib
                .iter()
                .map(|dir| format!("-L{}", dir.display()))
                .chain(link.directive().map(str::to_owned)),
        )
    }
}

fn join_flags(flags: impl Iterator<Item = String>) -> Option<String> {
    let joined = flags.collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Where and how a dependency installs itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// Install prefix passed to the configure script.
    pub prefix: PathBuf,
    /// Make target that performs the installation.
    pub target: String,
}

/// One configure-and-compile unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    /// The verified release this unit is built from.
    pub release: PackageRelease,
    /// Root of the unpacked source tree.
    pub source_dir: PathBuf,
    /// Configure script filename within `source_dir`.
    pub configure_script: String,
    /// Configure flags in order, excluding `--prefix`.
    pub configure_flags: Vec<String>,
    /// Search paths from earlier units.
    pub search_paths: SearchPaths,
    /// Link directive.
    pub link_mode: LinkMode,
    /// Installation step for dependencies; `None` for the target.
    pub install: Option<InstallStep>,
}

impl BuildUnit {
    /// Full configure argument list, with `--prefix` first for dependencies.
    #[must_use]
    pub fn configure_args(&self) -> Vec<String> {
        self.install
            .iter()
            .map(|step| format!("--prefix={}", step.prefix.display()))
            .chain(self.configure_flags.iter().cloned())
            .collect()
    }
}

/// Runs the configure and compile steps of build units.
pub struct BuildExecutor<'a> {
    executor: &'a dyn CommandExecutor,
    jobs: Option<usize>,
}

impl<'a> BuildExecutor<'a> {
    /// Create an executor running commands through `executor`, passing
    /// `-j<jobs>` to make when set.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, jobs: Option<usize>) -> Self {
        Self { executor, jobs }
    }

    /// Configure, compile, and (for dependencies) install `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Build`] when any step exits unsuccessfully and
    /// [`ForgeError::Io`] when a step cannot be spawned.
    pub fn build(&self, unit: &BuildUnit) -> Result<()> {
        let name = &unit.release.name;
        log::info!("building {name} {}", unit.release.version);

        let configure = self
            .with_flags_env(
                Invocation::new(
                    unit.source_dir
                        .join(&unit.configure_script)
                        .to_string_lossy(),
                ),
                unit,
            )
            .args(unit.configure_args());
        self.step(name, "configure", &configure)?;

        let mut make = Invocation::new("make").current_dir(&unit.source_dir);
        if let Some(jobs) = self.jobs {
            make = make.arg(format!("-j{jobs}"));
        }
        self.step(name, "make", &make)?;

        if let Some(install) = &unit.install {
            let install_cmd = Invocation::new("make")
                .arg(&install.target)
                .current_dir(&unit.source_dir);
            self.step(name, "install", &install_cmd)?;
        }
        Ok(())
    }

    fn with_flags_env(&self, invocation: Invocation, unit: &BuildUnit) -> Invocation {
        let mut invocation = invocation.current_dir(&unit.source_dir);
        if let Some(cppflags) = unit.search_paths.cppflags() {
            invocation = invocation.env("CPPFLAGS", cppflags);
        }
        if let Some(ldflags) = unit.search_paths.ldflags(&unit.link_mode) {
            invocation = invocation.env("LDFLAGS", ldflags);
        }
        invocation
    }

    fn step(&self, unit: &str, step: &'static str, invocation: &Invocation) -> Result<()> {
        log::debug!("{unit}: {step}: {invocation}");
        let output = self.executor.run(invocation)?;
        if output.status.success() {
            return Ok(());
        }
        Err(ForgeError::Build {
            unit: unit.to_owned(),
            step,
            status: output.status.to_string(),
            output: captured_output(&output),
        })
    }
}

/// Render the tails of stdout and stderr for an error report.
fn captured_output(output: &Output) -> String {
    let stdout = tail(&output.stdout, OUTPUT_TAIL_BYTES);
    let stderr = tail(&output.stderr, OUTPUT_TAIL_BYTES);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => "(no output)".to_owned(),
        (false, true) => stdout,
        (true, false) => stderr,
        (false, false) => format!("{stdout}\n--- stderr ---\n{stderr}"),
    }
}

/// The last `max` bytes of `bytes` as lossy UTF-8, marked when truncated.
fn tail(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    let text = String::from_utf8_lossy(bytes.get(start..).unwrap_or(bytes));
    if start > 0 {
        format!("[... {start} bytes omitted]\n{text}")
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
