//! CLI argument definitions for pinsmith.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::Overrides;
use crate::graph::Variant;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Default directory the verified artifact is copied into.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Build a pinned, checksum-verified, feature-checked static binary.
#[derive(Parser, Debug)]
#[command(name = "pinsmith")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build a pinned, checksum-verified, feature-checked static binary.\n\n",
    "pinsmith resolves a pinned or latest release of the target package (socat by ",
    "default) and, for the full variant, its ncurses, readline, and OpenSSL ",
    "dependencies. Every archive is checked against the caller's pin or the ",
    "upstream-published SHA-256 before it is unpacked. The target is configured with ",
    "the selected optional features, linked, and run to confirm it reports the ",
    "resolved version and exactly the requested features.\n\n",
    "On success the artifact record is written to stdout as JSON.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  PINSMITH_VERSION         Target version pin\n",
    "  PINSMITH_SHA256          Target archive checksum pin\n",
    "  PINSMITH_<NAME>_VERSION  Dependency version pin, e.g. PINSMITH_OPENSSL_VERSION\n",
    "  PINSMITH_DISABLE         Features to disable (empty disables none)\n",
    "  PINSMITH_ENABLE          Features to enable (empty enables none)\n",
    "  PINSMITH_LDFLAGS         Link directive (empty uses the toolchain default)\n\n",
    "EXAMPLES:\n",
    "  Build the latest socat with the default features:\n",
    "    $ pinsmith\n\n",
    "  Pin the version and checksum:\n",
    "    $ pinsmith --version-pin 1.8.0.0 --checksum-pin 6010f4f3...\n\n",
    "  Build with readline and OpenSSL from source:\n",
    "    $ pinsmith --variant full --enable ip4,ip6,tcp,listen,exec\n\n",
    "  Preview the build plan:\n",
    "    $ pinsmith --dry-run\n\n",
    "  List the optional features:\n",
    "    $ pinsmith flags --list",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Build arguments (used when no subcommand is given).
    #[command(flatten)]
    pub build: BuildArgs,

    /// TOML configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Echo every external command (repeatable).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve, fetch, build, and verify (default when no subcommand given).
    Build(BuildArgs),

    /// Resolve every unit and print what would be downloaded.
    Resolve(SelectionArgs),

    /// Print the configure flags for a feature selection.
    Flags(FlagsArgs),
}

/// Version, checksum, feature, and link selection shared by subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Exact target version [default: latest].
    #[arg(long, value_name = "VERSION")]
    pub version_pin: Option<String>,

    /// Expected SHA-256 of the target archive.
    #[arg(long, value_name = "SHA256")]
    pub checksum_pin: Option<String>,

    /// Exact dependency version (repeatable).
    #[arg(
        long = "dep-version",
        value_name = "NAME=VERSION",
        value_parser = parse_dependency_pin
    )]
    pub dep_version: Vec<(String, String)>,

    /// Feature lists.
    #[command(flatten)]
    pub features: FeatureArgs,

    /// Link directive; an empty value uses the toolchain default [default: -static].
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub link_flags: Option<String>,

    /// Dependency variant [default: minimal].
    #[arg(long, value_enum)]
    pub variant: Option<Variant>,
}

/// Disabled and enabled feature lists.
#[derive(Parser, Debug, Clone, Default)]
pub struct FeatureArgs {
    /// Features to disable, comma separated [default: all].
    #[arg(long, value_name = "LIST")]
    pub disable: Option<String>,

    /// Features to enable, comma separated [default: help,ip4].
    #[arg(long, value_name = "LIST")]
    pub enable: Option<String>,
}

/// Arguments for the build command.
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// What to build.
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Directory the verified artifact is copied into.
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: Utf8PathBuf,

    /// Number of parallel make jobs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Working directory; must be empty or absent [default: a temporary directory].
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<Utf8PathBuf>,

    /// Keep the scratch directory and print its path.
    #[arg(long)]
    pub keep_scratch: bool,

    /// Show the build plan and exit without downloading or building.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the flags command.
#[derive(Parser, Debug, Clone, Default)]
pub struct FlagsArgs {
    /// List every optional feature instead.
    #[arg(long)]
    pub list: bool,

    /// Feature lists to compose.
    #[command(flatten)]
    pub features: FeatureArgs,
}

impl Default for BuildArgs {
    /// Creates `BuildArgs` with no selection and the default output
    /// directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinsmith::cli::BuildArgs;
    ///
    /// let args = BuildArgs::default();
    /// assert_eq!(args.output_dir, "dist");
    /// assert!(!args.dry_run);
    /// ```
    fn default() -> Self {
        Self {
            selection: SelectionArgs::default(),
            output_dir: Utf8PathBuf::from(DEFAULT_OUTPUT_DIR),
            jobs: None,
            scratch_dir: None,
            keep_scratch: false,
            dry_run: false,
        }
    }
}

impl SelectionArgs {
    /// The command-line settings layer.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            version: self.version_pin.clone(),
            sha256: self.checksum_pin.clone(),
            dependencies: self.dep_version.clone(),
            link_flags: self.link_flags.clone(),
            variant: self.variant,
            ..self.features.overrides()
        }
    }
}

impl FeatureArgs {
    /// The command-line settings layer for the feature lists alone.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            disabled: self.disable.clone(),
            enabled: self.enable.clone(),
            ..Overrides::default()
        }
    }
}

impl Cli {
    /// Returns the effective build arguments.
    ///
    /// If a `Build` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened build arguments.
    #[must_use]
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Some(Command::Build(args)) => args,
            Some(Command::Resolve(_) | Command::Flags(_)) | None => &self.build,
        }
    }
}

/// Parse `name=version` for `--dep-version`.
fn parse_dependency_pin(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, version)) if !name.trim().is_empty() && !version.trim().is_empty() => {
            Ok((name.trim().to_owned(), version.trim().to_owned()))
        }
        _ => Err(format!("expected NAME=VERSION, got \"{value}\"")),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
