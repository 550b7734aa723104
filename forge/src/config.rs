//! Layered build settings.
//!
//! Settings come from four layers, highest precedence first: command-line
//! overrides, `PINSMITH_*` environment variables, an optional TOML file,
//! and built-in defaults. Every layer keeps "not supplied" distinct from
//! "supplied as empty", so an empty `PINSMITH_ENABLE` or `enabled = []`
//! switches every optional feature off instead of falling back to the
//! defaults.

use crate::builder::LinkMode;
use crate::digest::Sha256Digest;
use crate::error::{ForgeError, Result};
use crate::features::{FeatureList, FeatureToggleSet};
use crate::graph::Variant;
use crate::upstream::{DEFAULT_TARGET, UpstreamSet, UpstreamSource};
use camino::Utf8Path;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Prefix of every environment variable pinsmith reads.
pub const ENV_PREFIX: &str = "PINSMITH_";

/// Contents of a `--config` TOML file.
///
/// # Examples
///
/// ```
/// use pinsmith::config::FileConfig;
///
/// let config = FileConfig::parse(r#"
///     version = "1.8.0.0"
///     enabled = []
///     [dependencies]
///     openssl = "3.0.13"
/// "#).expect("valid config");
/// assert_eq!(config.version.as_deref(), Some("1.8.0.0"));
/// assert_eq!(config.enabled, Some(Vec::new()));
/// assert!(config.disabled.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Package to build; defaults to `socat`.
    #[serde(default)]
    pub target: Option<String>,
    /// Exact target version.
    #[serde(default)]
    pub version: Option<String>,
    /// Expected SHA-256 of the target archive.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Exact dependency versions by package name.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Features to disable.
    #[serde(default)]
    pub disabled: Option<Vec<String>>,
    /// Features to enable.
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
    /// Linker directive for the target.
    #[serde(default)]
    pub link_flags: Option<String>,
    /// Dependency variant.
    #[serde(default)]
    pub variant: Option<Variant>,
    /// Upstream definitions replacing or extending the built-in set.
    #[serde(default)]
    pub upstream: Vec<UpstreamSource>,
}

impl FileConfig {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] for malformed TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| ForgeError::config(err.to_string()))
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ForgeError::config(format!("cannot read {path}: {err}")))?;
        Self::parse(&text).map_err(|err| match err {
            ForgeError::Config { reason } => ForgeError::config(format!("{path}: {reason}")),
            other => other,
        })
    }
}

/// Values read from `PINSMITH_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvLayer {
    /// `PINSMITH_VERSION`.
    pub version: Option<String>,
    /// `PINSMITH_SHA256`.
    pub sha256: Option<String>,
    /// `PINSMITH_<NAME>_VERSION` for each known package.
    pub dependencies: BTreeMap<String, String>,
    /// `PINSMITH_DISABLE`.
    pub disabled: Option<String>,
    /// `PINSMITH_ENABLE`.
    pub enabled: Option<String>,
    /// `PINSMITH_LDFLAGS`.
    pub link_flags: Option<String>,
}

impl EnvLayer {
    /// Read the layer through `lookup`, probing a version variable for each
    /// of `packages`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinsmith::config::EnvLayer;
    ///
    /// let env = EnvLayer::from_lookup(&["openssl"], |key| match key {
    ///     "PINSMITH_ENABLE" => Some(String::new()),
    ///     "PINSMITH_OPENSSL_VERSION" => Some("3.0.13".to_owned()),
    ///     _ => None,
    /// });
    /// assert_eq!(env.enabled.as_deref(), Some(""));
    /// assert_eq!(env.dependencies.get("openssl").map(String::as_str), Some("3.0.13"));
    /// assert!(env.disabled.is_none());
    /// ```
    pub fn from_lookup<F>(packages: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let dependencies = packages
            .iter()
            .filter_map(|name| {
                var(&format!("{}_VERSION", env_name(name)))
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| ((*name).to_owned(), value))
            })
            .collect();
        Self {
            version: var("VERSION"),
            sha256: var("SHA256"),
            dependencies,
            disabled: var("DISABLE"),
            enabled: var("ENABLE"),
            link_flags: var("LDFLAGS"),
        }
    }

    /// Read the layer from the process environment.
    #[must_use]
    pub fn from_process(packages: &[&str]) -> Self {
        Self::from_lookup(packages, |key| std::env::var(key).ok())
    }
}

/// Upper-case a package name for use in a variable name.
fn env_name(package: &str) -> String {
    package.to_ascii_uppercase().replace('-', "_")
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--version-pin`.
    pub version: Option<String>,
    /// `--checksum-pin`.
    pub sha256: Option<String>,
    /// `--dep-version name=version`, in order given.
    pub dependencies: Vec<(String, String)>,
    /// `--disable`.
    pub disabled: Option<String>,
    /// `--enable`.
    pub enabled: Option<String>,
    /// `--link-flags`.
    pub link_flags: Option<String>,
    /// `--variant`.
    pub variant: Option<Variant>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Package to build.
    pub target: String,
    /// Exact target version, or `None` for latest.
    pub version: Option<String>,
    /// Caller checksum pin for the target archive.
    pub checksum: Option<Sha256Digest>,
    /// Exact dependency versions.
    pub dependency_versions: BTreeMap<String, String>,
    /// Feature selection for the target.
    pub toggles: FeatureToggleSet,
    /// Link directive for the target.
    pub link_mode: LinkMode,
    /// Dependency variant.
    pub variant: Variant,
    /// Upstream definitions in effect.
    pub upstreams: UpstreamSet,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_owned(),
            version: None,
            checksum: None,
            dependency_versions: BTreeMap::new(),
            toggles: FeatureToggleSet::default(),
            link_mode: LinkMode::default(),
            variant: Variant::default(),
            upstreams: UpstreamSet::default(),
        }
    }
}

impl BuildSettings {
    /// Merge the layers, validating every value.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] for unknown features, malformed
    /// checksum pins, unknown targets, or pins naming unknown packages.
    pub fn from_layers(file: FileConfig, env: &EnvLayer, cli: &Overrides) -> Result<Self> {
        let upstreams = UpstreamSet::with_overrides(file.upstream);
        let target = file.target.unwrap_or_else(|| DEFAULT_TARGET.to_owned());
        if upstreams.get(&target).is_none() {
            return Err(ForgeError::config(format!("no upstream defined for target {target}")));
        }

        let version = first_set([cli.version.clone(), env.version.clone(), file.version])
            .filter(|version| !version.trim().is_empty())
            .map(|version| version.trim().to_owned());
        let checksum = first_set([cli.sha256.clone(), env.sha256.clone(), file.sha256])
            .filter(|pin| !pin.trim().is_empty())
            .map(|pin| {
                Sha256Digest::normalise(&pin)
                    .map_err(|err| ForgeError::config(format!("checksum pin: {err}")))
            })
            .transpose()?;

        let mut dependency_versions = file.dependencies;
        dependency_versions.extend(env.dependencies.clone());
        dependency_versions.extend(cli.dependencies.iter().cloned());
        if let Some(unknown) = dependency_versions
            .keys()
            .find(|name| upstreams.get(name).is_none())
        {
            return Err(ForgeError::config(format!(
                "version pin for unknown package {unknown}"
            )));
        }

        let disabled = feature_layer(cli.disabled.as_deref(), env.disabled.as_deref(), file.disabled)?;
        let enabled = feature_layer(cli.enabled.as_deref(), env.enabled.as_deref(), file.enabled)?;
        let link_flags = first_set([cli.link_flags.clone(), env.link_flags.clone(), file.link_flags]);

        Ok(Self {
            target,
            version,
            checksum,
            dependency_versions,
            toggles: FeatureToggleSet::new(disabled, enabled),
            link_mode: LinkMode::from_setting(link_flags.as_deref()),
            variant: cli.variant.or(file.variant).unwrap_or_default(),
            upstreams,
        })
    }

    /// Load the optional file at `config`, read the process environment,
    /// and merge both with `cli`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] when any layer is invalid.
    pub fn load(config: Option<&Utf8Path>, cli: &Overrides) -> Result<Self> {
        let file = config.map(FileConfig::load).transpose()?.unwrap_or_default();
        let known = UpstreamSet::with_overrides(file.upstream.clone());
        let packages: Vec<&str> = known.iter().map(|upstream| upstream.name.as_str()).collect();
        let env = EnvLayer::from_process(&packages);
        Self::from_layers(file, &env, cli)
    }

    /// The pinned version of `package`, target or dependency.
    #[must_use]
    pub fn version_for(&self, package: &str) -> Option<&str> {
        if package == self.target {
            return self.version.as_deref();
        }
        self.dependency_versions.get(package).map(String::as_str)
    }

    /// The target's upstream definition.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] when the target has no definition.
    pub fn target_upstream(&self) -> Result<&UpstreamSource> {
        self.upstream(&self.target)
    }

    /// The upstream definition of `package`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Config`] when `package` has no definition.
    pub fn upstream(&self, package: &str) -> Result<&UpstreamSource> {
        self.upstreams
            .get(package)
            .ok_or_else(|| ForgeError::config(format!("no upstream defined for {package}")))
    }
}

fn first_set<const N: usize>(layers: [Option<String>; N]) -> Option<String> {
    layers.into_iter().flatten().next()
}

/// Pick the highest feature list layer that was supplied.
fn feature_layer(
    cli: Option<&str>,
    env: Option<&str>,
    file: Option<Vec<String>>,
) -> Result<FeatureList> {
    match (cli.or(env), file) {
        (Some(text), _) => FeatureList::parse(Some(text)),
        (None, Some(names)) => FeatureList::from_names(names),
        (None, None) => Ok(FeatureList::Unset),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
