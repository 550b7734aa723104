//! Catalog backed by a `SHA256SUMS`-style manifest.
//!
//! The manifest is both the listing and the checksum source, so it is
//! fetched once and cached for the lifetime of the catalog.

use std::cell::RefCell;

use super::transport::Transport;
use super::{CatalogError, ReleaseCatalog, push_unique};
use crate::digest::Sha256Digest;
use crate::upstream::UpstreamSource;

/// One `<digest>  <filename>` manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ManifestEntry {
    archive: String,
    digest: Sha256Digest,
}

/// Catalog reading a checksum manifest.
pub struct ChecksumManifestCatalog<'a> {
    upstream: &'a UpstreamSource,
    transport: &'a dyn Transport,
    entries: RefCell<Option<Vec<ManifestEntry>>>,
}

impl<'a> ChecksumManifestCatalog<'a> {
    /// Create a catalog for `upstream` fetching through `transport`.
    #[must_use]
    pub fn new(upstream: &'a UpstreamSource, transport: &'a dyn Transport) -> Self {
        Self {
            upstream,
            transport,
            entries: RefCell::new(None),
        }
    }

    fn entries(&self) -> Result<Vec<ManifestEntry>, CatalogError> {
        if let Some(cached) = self.entries.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let text = self.transport.fetch_text(&self.upstream.listing_url)?;
        let parsed = parse_manifest(&text);
        log::debug!(
            "{} lists {} entries",
            self.upstream.listing_url,
            parsed.len()
        );
        self.entries.replace(Some(parsed.clone()));
        Ok(parsed)
    }
}

impl ReleaseCatalog for ChecksumManifestCatalog<'_> {
    fn archives(&self) -> Result<Vec<String>, CatalogError> {
        let mut names = Vec::new();
        for entry in self.entries()? {
            push_unique(&mut names, &entry.archive);
        }
        Ok(names)
    }

    fn published_checksum(&self, archive: &str) -> Result<Option<Sha256Digest>, CatalogError> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.archive == archive)
            .map(|entry| entry.digest))
    }
}

/// Parse manifest text, skipping blank, comment, and unrecognised lines.
fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (hex, rest) = line.split_once(char::is_whitespace)?;
    let digest = Sha256Digest::normalise(hex).ok()?;
    let path = rest.trim_start().trim_start_matches('*');
    let archive = path.rsplit('/').next().filter(|name| !name.is_empty())?;
    Some(ManifestEntry {
        archive: archive.to_owned(),
        digest,
    })
}
