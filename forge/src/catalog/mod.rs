//! Release catalogs: discovering which archives an upstream publishes.
//!
//! Resolution logic never scrapes listings directly. It talks to a
//! [`ReleaseCatalog`], which has one implementation per listing format, so an
//! API-backed source can be added without touching the resolver.
//!
//! # Sub-modules
//!
//! - [`directory`] - HTML directory index scraping with checksum sidecars.
//! - [`manifest`] - `SHA256SUMS`-style manifests (listing and digests in one).
//! - [`transport`] - HTTP access behind a mockable trait.

pub mod directory;
pub mod manifest;
pub mod transport;

use crate::digest::Sha256Digest;
use crate::error::{ForgeError, IntegrityStage};
use crate::upstream::{ListingKind, UpstreamSource};
use transport::{FetchError, Transport};

/// Errors arising while reading a release catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The listing or a checksum record could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A checksum record exists but holds no usable digest.
    #[error("checksum record for {archive} is malformed")]
    MalformedChecksum {
        /// Archive the record belongs to.
        archive: String,
    },
}

impl From<CatalogError> for ForgeError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Fetch(fetch) => fetch.into(),
            CatalogError::MalformedChecksum { archive } => Self::Integrity {
                archive,
                stage: IntegrityStage::PublishedRecord,
                reason: "published checksum record holds no SHA-256 digest".to_owned(),
            },
        }
    }
}

/// A source of published release archives for one package.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseCatalog {
    /// List every archive filename the upstream advertises, in listing
    /// order without duplicates. Unrelated entries may be included; the
    /// resolver filters them.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Fetch`] if the listing cannot be retrieved.
    fn archives(&self) -> Result<Vec<String>, CatalogError>;

    /// Return the checksum published for `archive`, or `None` when the
    /// upstream publishes none.
    ///
    /// # Errors
    ///
    /// Returns an error if a published record exists but cannot be fetched
    /// or parsed.
    fn published_checksum(&self, archive: &str) -> Result<Option<Sha256Digest>, CatalogError>;
}

/// Build the catalog matching `upstream`'s listing format.
#[must_use]
pub fn catalog_for<'a>(
    upstream: &'a UpstreamSource,
    transport: &'a dyn Transport,
) -> Box<dyn ReleaseCatalog + 'a> {
    match upstream.listing {
        ListingKind::DirectoryIndex => {
            Box::new(directory::DirectoryListingCatalog::new(upstream, transport))
        }
        ListingKind::ChecksumManifest => {
            Box::new(manifest::ChecksumManifestCatalog::new(upstream, transport))
        }
    }
}

/// Append `entry` unless it is already present.
fn push_unique(entries: &mut Vec<String>, entry: &str) {
    if !entries.iter().any(|existing| existing == entry) {
        entries.push(entry.to_owned());
    }
}
