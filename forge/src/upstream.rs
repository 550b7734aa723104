//! Upstream source definitions.
//!
//! An [`UpstreamSource`] describes where a package's releases are listed,
//! how its archives are named, and how its source tree is configured and
//! installed. The built-in set covers the default `socat` target and the
//! native dependencies of its full-feature variant; configuration files may
//! replace or extend it.

use serde::Deserialize;

use crate::version::VersionPattern;

/// The package built by default.
pub const DEFAULT_TARGET: &str = "socat";

/// How an upstream publishes its list of releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingKind {
    /// An HTML directory index whose links name the archives.
    DirectoryIndex,
    /// A `SHA256SUMS`-style manifest listing digests and filenames.
    ChecksumManifest,
}

/// Where and how to obtain one upstream package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSource {
    /// Package name, also the archive filename prefix.
    pub name: String,
    /// URL of the directory index or checksum manifest.
    pub listing_url: String,
    /// Format of `listing_url`.
    pub listing: ListingKind,
    /// Base URL archives are downloaded from; defaults to the listing's
    /// directory.
    #[serde(default)]
    pub download_url: Option<String>,
    /// Archive extension without the leading dot.
    #[serde(default = "default_extension")]
    pub archive_extension: String,
    /// Accepted version shapes when resolving the latest release.
    #[serde(default)]
    pub version_pattern: VersionPattern,
    /// Suffix of the per-archive checksum sidecar, when the upstream
    /// publishes one next to each archive.
    #[serde(default)]
    pub checksum_suffix: Option<String>,
    /// Name of the configuration script in the source root.
    #[serde(default = "default_configure_script")]
    pub configure_script: String,
    /// Extra flags passed to the configuration script.
    #[serde(default)]
    pub configure_flags: Vec<String>,
    /// Make target that installs headers and libraries into the prefix.
    #[serde(default = "default_install_target")]
    pub install_target: String,
    /// Target feature that a built copy of this package must light up.
    #[serde(default)]
    pub feature: Option<String>,
    /// Binary produced in the source root (targets only).
    #[serde(default)]
    pub binary: Option<String>,
}

fn default_extension() -> String {
    "tar.gz".to_owned()
}

fn default_configure_script() -> String {
    "configure".to_owned()
}

fn default_install_target() -> String {
    "install".to_owned()
}

impl UpstreamSource {
    /// Archive filename for `version`, e.g. `socat-1.8.0.0.tar.gz`.
    #[must_use]
    pub fn archive_name(&self, version: &str) -> String {
        format!("{}-{version}.{}", self.name, self.archive_extension)
    }

    /// Extract the version text from an archive filename belonging to this
    /// package, or `None` for unrelated entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinsmith::upstream::builtin_upstreams;
    ///
    /// let socat = builtin_upstreams()
    ///     .into_iter()
    ///     .find(|u| u.name == "socat")
    ///     .expect("socat is built in");
    /// assert_eq!(socat.version_of("socat-1.8.0.0.tar.gz"), Some("1.8.0.0"));
    /// assert_eq!(socat.version_of("socat-1.8.0.0.tar.bz2"), None);
    /// ```
    #[must_use]
    pub fn version_of<'a>(&self, archive: &'a str) -> Option<&'a str> {
        archive
            .strip_prefix(self.name.as_str())?
            .strip_prefix('-')?
            .strip_suffix(self.archive_extension.as_str())?
            .strip_suffix('.')
            .filter(|version| !version.is_empty())
    }

    /// URL an archive is downloaded from.
    #[must_use]
    pub fn archive_url(&self, archive: &str) -> String {
        let base = self
            .download_url
            .as_deref()
            .unwrap_or_else(|| directory_of(&self.listing_url));
        format!("{}/{archive}", base.trim_end_matches('/'))
    }

    /// The binary this upstream produces, defaulting to the package name.
    #[must_use]
    pub fn binary_name(&self) -> &str {
        self.binary.as_deref().unwrap_or(&self.name)
    }
}

/// Return the directory part of a URL (everything up to the last `/`).
fn directory_of(url: &str) -> &str {
    if url.ends_with('/') {
        return url;
    }
    url.rfind('/')
        .and_then(|idx| url.get(..=idx))
        .unwrap_or(url)
}

/// Upstream definitions shipped with pinsmith.
#[must_use]
pub fn builtin_upstreams() -> Vec<UpstreamSource> {
    vec![
        UpstreamSource {
            name: DEFAULT_TARGET.to_owned(),
            listing_url: "http://www.dest-unreach.org/socat/download/".to_owned(),
            listing: ListingKind::DirectoryIndex,
            download_url: None,
            archive_extension: default_extension(),
            version_pattern: VersionPattern::exact(4),
            checksum_suffix: Some(".sha256".to_owned()),
            configure_script: default_configure_script(),
            configure_flags: Vec::new(),
            install_target: default_install_target(),
            feature: None,
            binary: Some(DEFAULT_TARGET.to_owned()),
        },
        UpstreamSource {
            name: "ncurses".to_owned(),
            listing_url: "https://ftp.gnu.org/gnu/ncurses/".to_owned(),
            listing: ListingKind::DirectoryIndex,
            download_url: None,
            archive_extension: default_extension(),
            version_pattern: VersionPattern::exact(2),
            checksum_suffix: None,
            configure_script: default_configure_script(),
            configure_flags: [
                "--without-shared",
                "--without-debug",
                "--without-ada",
                "--without-cxx-binding",
                "--without-manpages",
                "--without-progs",
                "--without-tests",
            ]
            .map(str::to_owned)
            .to_vec(),
            install_target: default_install_target(),
            feature: None,
            binary: None,
        },
        UpstreamSource {
            name: "readline".to_owned(),
            listing_url: "https://ftp.gnu.org/gnu/readline/".to_owned(),
            listing: ListingKind::DirectoryIndex,
            download_url: None,
            archive_extension: default_extension(),
            version_pattern: VersionPattern::exact(2),
            checksum_suffix: None,
            configure_script: default_configure_script(),
            configure_flags: ["--disable-shared", "--enable-static", "--with-curses"]
                .map(str::to_owned)
                .to_vec(),
            install_target: default_install_target(),
            feature: Some("readline".to_owned()),
            binary: None,
        },
        UpstreamSource {
            name: "openssl".to_owned(),
            listing_url: "https://www.openssl.org/source/".to_owned(),
            listing: ListingKind::DirectoryIndex,
            download_url: None,
            archive_extension: default_extension(),
            version_pattern: VersionPattern::exact(3).with_letter(),
            checksum_suffix: Some(".sha256".to_owned()),
            configure_script: "Configure".to_owned(),
            configure_flags: ["no-shared", "no-tests", "--libdir=lib"]
                .map(str::to_owned)
                .to_vec(),
            install_target: "install_sw".to_owned(),
            feature: Some("openssl".to_owned()),
            binary: None,
        },
    ]
}

/// A named collection of upstream definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSet {
    sources: Vec<UpstreamSource>,
}

impl UpstreamSet {
    /// Build a set from the built-in definitions plus `overrides`; an
    /// override replaces a built-in of the same name.
    #[must_use]
    pub fn with_overrides(overrides: Vec<UpstreamSource>) -> Self {
        let mut sources = builtin_upstreams();
        for source in overrides {
            match sources.iter_mut().find(|s| s.name == source.name) {
                Some(existing) => *existing = source,
                None => sources.push(source),
            }
        }
        Self { sources }
    }

    /// Look up a definition by package name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UpstreamSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Iterate over every definition.
    pub fn iter(&self) -> impl Iterator<Item = &UpstreamSource> {
        self.sources.iter()
    }
}

impl Default for UpstreamSet {
    fn default() -> Self {
        Self::with_overrides(Vec::new())
    }
}
