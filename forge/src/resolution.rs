//! Release resolution.
//!
//! Turns a package name and an optional exact version into a
//! [`PackageRelease`] by consulting the package's [`ReleaseCatalog`].

use crate::catalog::ReleaseCatalog;
use crate::digest::Sha256Digest;
use crate::error::{ForgeError, Result};
use crate::upstream::UpstreamSource;
use crate::version::Version;

/// A release chosen for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRelease {
    /// Upstream package name.
    pub name: String,
    /// Version text exactly as it appears in the archive name.
    pub version: String,
    /// Archive filename, e.g. `socat-1.8.0.0.tar.gz`.
    pub archive_name: String,
    /// Checksum published by the upstream, if any.
    pub checksum: Option<Sha256Digest>,
    /// Download URL of the archive.
    pub url: String,
}

/// Resolves releases of one upstream package.
pub struct VersionResolver<'a> {
    upstream: &'a UpstreamSource,
    catalog: &'a dyn ReleaseCatalog,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver for `upstream` reading from `catalog`.
    #[must_use]
    pub fn new(upstream: &'a UpstreamSource, catalog: &'a dyn ReleaseCatalog) -> Self {
        Self { upstream, catalog }
    }

    /// Resolve `wanted` exactly, or the latest release when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Network`] if the listing cannot be fetched,
    /// [`ForgeError::NotFound`] if no entry matches, and
    /// [`ForgeError::Integrity`] if the published checksum record is
    /// unreadable.
    pub fn resolve(&self, wanted: Option<&str>) -> Result<PackageRelease> {
        let archives = self.catalog.archives()?;
        let version = match wanted {
            Some(version) => self.exact(&archives, version)?,
            None => self.latest(&archives)?,
        };
        let archive_name = self.upstream.archive_name(&version);
        let checksum = self.catalog.published_checksum(&archive_name)?;
        log::info!(
            "resolved {} {version} ({})",
            self.upstream.name,
            if checksum.is_some() {
                "checksum published"
            } else {
                "no published checksum"
            }
        );
        Ok(PackageRelease {
            name: self.upstream.name.clone(),
            url: self.upstream.archive_url(&archive_name),
            version,
            archive_name,
            checksum,
        })
    }

    fn exact(&self, archives: &[String], version: &str) -> Result<String> {
        let archive_name = self.upstream.archive_name(version);
        if archives.iter().any(|entry| *entry == archive_name) {
            Ok(version.to_owned())
        } else {
            Err(self.not_found(version))
        }
    }

    fn latest(&self, archives: &[String]) -> Result<String> {
        let pattern = &self.upstream.version_pattern;
        archives
            .iter()
            .filter_map(|entry| self.upstream.version_of(entry))
            .filter_map(|text| pattern.parse(text))
            .max_by(compare_versions)
            .map(|version| version.as_str().to_owned())
            .ok_or_else(|| self.not_found("latest"))
    }

    fn not_found(&self, wanted: &str) -> ForgeError {
        ForgeError::NotFound {
            package: self.upstream.name.clone(),
            wanted: wanted.to_owned(),
        }
    }
}

/// Numeric order, falling back to the text so `1.8` and `1.8.0` resolve
/// deterministically.
fn compare_versions(a: &Version, b: &Version) -> std::cmp::Ordering {
    a.cmp(b).then_with(|| a.as_str().cmp(b.as_str()))
}

#[cfg(test)]
#[path = "resolution_tests.rs"]
mod tests;
