//! Archive download and checksum enforcement.
//!
//! The verifier is fail-closed: a caller pin that disagrees with the
//! upstream-published checksum stops the run before any download, and an
//! archive whose digest differs from the expected value is deleted without
//! ever reaching its final name. The one permitted degradation is an
//! upstream that publishes no checksum while the caller supplied no pin; the
//! archive is then used with a warning.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalog::transport::Transport;
use crate::digest::{Sha256Digest, compute_sha256};
use crate::error::{ForgeError, IntegrityStage, Result};
use crate::output::emit_warning;
use crate::resolution::PackageRelease;

/// Suffix of the temporary name an archive is downloaded under.
const PARTIAL_SUFFIX: &str = ".part";

/// How strongly a downloaded archive has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The digest matched a pinned or published checksum.
    Verified,
    /// No checksum was available; the archive was used with a warning.
    Unverified,
}

/// A downloaded archive at its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArchive {
    /// Location of the archive in the scratch directory.
    pub path: PathBuf,
    /// Digest of the downloaded bytes.
    pub digest: Sha256Digest,
    /// Whether the digest was checked against an expected value.
    pub verification: Verification,
}

/// Decide the digest a download must match.
///
/// A caller pin must agree with the published checksum when both exist and
/// otherwise stands in for it.
///
/// # Errors
///
/// Returns [`ForgeError::Integrity`] when the pin and the published
/// checksum disagree.
///
/// # Example
///
/// ```
/// use pinsmith::digest::Sha256Digest;
/// use pinsmith::integrity::expected_digest;
/// use pinsmith::resolution::PackageRelease;
///
/// let published = Sha256Digest::try_from("a".repeat(64)).expect("digest");
/// let release = PackageRelease {
///     name: "socat".to_owned(),
///     version: "1.8.0.0".to_owned(),
///     archive_name: "socat-1.8.0.0.tar.gz".to_owned(),
///     checksum: Some(published.clone()),
///     url: "http://www.dest-unreach.org/socat/download/socat-1.8.0.0.tar.gz".to_owned(),
/// };
/// let pin = Sha256Digest::try_from("b".repeat(64)).expect("digest");
///
/// assert!(expected_digest(&release, Some(&pin)).is_err());
/// assert_eq!(expected_digest(&release, None).expect("no pin"), Some(published));
/// ```
pub fn expected_digest(
    release: &PackageRelease,
    pin: Option<&Sha256Digest>,
) -> Result<Option<Sha256Digest>> {
    match (pin, release.checksum.as_ref()) {
        (Some(pin), Some(published)) if pin != published => Err(ForgeError::Integrity {
            archive: release.archive_name.clone(),
            stage: IntegrityStage::PinVersusPublished,
            reason: format!("pinned {pin}, upstream publishes {published}"),
        }),
        (Some(pin), _) => Ok(Some(pin.clone())),
        (None, published) => Ok(published.cloned()),
    }
}

/// Downloads archives and enforces checksum agreement.
pub struct IntegrityVerifier<'a> {
    transport: &'a dyn Transport,
}

impl<'a> IntegrityVerifier<'a> {
    /// Create a verifier downloading through `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Download `release` into `dest_dir` and verify it.
    ///
    /// The pin check happens before any bytes are fetched. Warnings for
    /// unverified downloads are written to `stderr` regardless of quiet
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Integrity`] on any checksum disagreement,
    /// [`ForgeError::Network`] if the download fails, and
    /// [`ForgeError::Io`] for local filesystem failures.
    pub fn fetch(
        &self,
        release: &PackageRelease,
        pin: Option<&Sha256Digest>,
        dest_dir: &Path,
        stderr: &mut dyn Write,
    ) -> Result<VerifiedArchive> {
        let expected = expected_digest(release, pin)?;
        let final_path = dest_dir.join(&release.archive_name);
        let partial_path = dest_dir.join(format!("{}{PARTIAL_SUFFIX}", release.archive_name));

        if let Err(err) = self.transport.download(&release.url, &partial_path) {
            discard(&partial_path);
            return Err(err.into());
        }
        let actual = match compute_sha256(&partial_path) {
            Ok(digest) => digest,
            Err(err) => {
                discard(&partial_path);
                return Err(err.into());
            }
        };

        let verification = match expected {
            Some(expected) if expected != actual => {
                discard(&partial_path);
                return Err(ForgeError::Integrity {
                    archive: release.archive_name.clone(),
                    stage: IntegrityStage::PublishedVersusDownloaded,
                    reason: format!("expected {expected}, downloaded {actual}"),
                });
            }
            Some(_) => Verification::Verified,
            None => {
                emit_warning(
                    stderr,
                    format!(
                        "no published checksum for {}; downloaded, unverified (sha256 {actual})",
                        release.archive_name
                    ),
                );
                Verification::Unverified
            }
        };

        std::fs::rename(&partial_path, &final_path)?;
        log::debug!("{} ready at {}", release.archive_name, final_path.display());
        Ok(VerifiedArchive {
            path: final_path,
            digest: actual,
            verification,
        })
    }
}

/// Remove a partial download, ignoring failures.
fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        log::debug!("could not remove {}: {err}", path.display());
    }
}
