//! Dependency ordering for the target build.
//!
//! The graph is static: the full variant builds `ncurses`, `readline`, and
//! `openssl` in that order before the target, each installing into its own
//! prefix under the scratch directory. Every installed prefix is added to
//! the search paths of all later units.

use crate::builder::{LinkMode, SearchPaths};
use crate::error::Result;
use crate::upstream::UpstreamSet;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Dependencies of the full variant in build order.
pub const FULL_DEPENDENCIES: [&str; 3] = ["ncurses", "readline", "openssl"];

/// Directory under the scratch root that holds dependency prefixes.
pub const DEPS_DIR: &str = "deps";

/// Which dependency graph to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Target only, linked against the system's libraries.
    #[default]
    Minimal,
    /// Target plus its readline and TLS stacks built from source.
    Full,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimal => f.write_str("minimal"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Ordered prerequisite units of a target build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyBuildGraph {
    dependencies: Vec<String>,
}

impl DependencyBuildGraph {
    /// The graph for `variant`.
    #[must_use]
    pub fn for_variant(variant: Variant) -> Self {
        let dependencies = match variant {
            Variant::Minimal => Vec::new(),
            Variant::Full => FULL_DEPENDENCIES.map(str::to_owned).to_vec(),
        };
        Self { dependencies }
    }

    /// Dependency names in build order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns true when only the target is built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Target features the built dependencies must light up, in build
    /// order.
    #[must_use]
    pub fn required_features<'a>(&self, upstreams: &'a UpstreamSet) -> Vec<&'a str> {
        self.dependencies
            .iter()
            .filter_map(|name| upstreams.get(name))
            .filter_map(|upstream| upstream.feature.as_deref())
            .collect()
    }

    /// Install prefix of dependency `name`.
    #[must_use]
    pub fn prefix_for(scratch: &Path, name: &str) -> PathBuf {
        scratch.join(DEPS_DIR).join(name)
    }

    /// Build every dependency in order with `build_one`, which receives the
    /// dependency name, the search paths of all earlier units, and its
    /// install prefix. Returns the search paths for the target.
    ///
    /// # Errors
    ///
    /// Returns the first error from `build_one`; later units are not built.
    ///
    /// # Example
    ///
    /// ```
    /// use pinsmith::graph::{DependencyBuildGraph, Variant};
    /// use std::path::Path;
    ///
    /// let mut order = Vec::new();
    /// let paths = DependencyBuildGraph::for_variant(Variant::Full)
    ///     .build_all(Path::new("/scratch"), |name, _paths, _prefix| {
    ///         order.push(name.to_owned());
    ///         Ok(())
    ///     })
    ///     .expect("all dependencies build");
    /// assert_eq!(order, ["ncurses", "readline", "openssl"]);
    /// assert_eq!(paths.lib_dirs().len(), 3);
    /// ```
    pub fn build_all<F>(&self, scratch: &Path, mut build_one: F) -> Result<SearchPaths>
    where
        F: FnMut(&str, &SearchPaths, &Path) -> Result<()>,
    {
        let mut paths = SearchPaths::default();
        for name in &self.dependencies {
            let prefix = Self::prefix_for(scratch, name);
            log::info!("building dependency {name} into {}", prefix.display());
            build_one(name, &paths, &prefix)?;
            paths.push_prefix(&prefix);
        }
        Ok(paths)
    }
}

/// One unit of a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    /// Package name.
    pub name: String,
    /// Exact version requested, or `None` for latest.
    pub version_pin: Option<String>,
    /// Configure flags the unit will receive.
    pub configure_flags: Vec<String>,
}

/// Everything `build` would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Selected variant.
    pub variant: Variant,
    /// Link directive for the target.
    pub link_mode: LinkMode,
    /// Parallel make jobs.
    pub jobs: Option<usize>,
    /// Dependencies in order, then the target.
    pub units: Vec<PlannedUnit>,
}
