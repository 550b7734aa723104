//! The artifact record handed to the publishing step.
//!
//! After verification the binary is described by an [`ArtifactRecord`]:
//! location, size, modification time, SHA-256, binary type, the version and
//! features it reported, and the releases it was built from. A
//! `<hash>  <filename>` sidecar is written next to the binary.

use crate::digest::{Sha256Digest, compute_sha256};
use crate::error::{ForgeError, Result};
use crate::executor::{CommandExecutor, Invocation};
use crate::integrity::Verification;
use crate::verify::FeatureReport;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Binary type recorded when `file` is unavailable or fails.
pub const UNKNOWN_BINARY_TYPE: &str = "unknown";

/// Extension of the checksum sidecar.
pub const SIDECAR_EXTENSION: &str = "sha256";

/// One source release that went into the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    /// Package name.
    pub name: String,
    /// Resolved version.
    pub version: String,
    /// Archive digest.
    pub sha256: String,
    /// Whether the archive digest was checked against a pin or a published
    /// checksum.
    pub verified: bool,
}

impl SourceRecord {
    /// Describe a downloaded release.
    #[must_use]
    pub fn new(name: &str, version: &str, digest: &Sha256Digest, verification: Verification) -> Self {
        Self {
            name: name.to_owned(),
            version: version.to_owned(),
            sha256: digest.to_string(),
            verified: verification == Verification::Verified,
        }
    }
}

/// Metadata describing a verified artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    /// Artifact name (the binary name).
    pub name: String,
    /// Location of the artifact.
    pub path: Utf8PathBuf,
    /// Version the artifact reported, equal to the resolved version.
    pub version: String,
    /// Catalog features the artifact reported as compiled in.
    pub features: Vec<String>,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, ISO 8601 UTC.
    pub modified: String,
    /// SHA-256 of the artifact.
    pub sha256: String,
    /// Location of the `<hash>  <filename>` sidecar.
    pub sidecar: Utf8PathBuf,
    /// Output of `file -b`, or `unknown`.
    pub binary_type: String,
    /// Link directive used for the target.
    pub link: String,
    /// Releases the artifact was built from, dependencies first.
    pub sources: Vec<SourceRecord>,
}

/// Inputs for [`describe_artifact`] that come from earlier stages.
#[derive(Debug, Clone)]
pub struct ArtifactContext<'a> {
    /// Artifact name.
    pub name: &'a str,
    /// Verified self-report.
    pub report: &'a FeatureReport,
    /// Rendered link directive.
    pub link: String,
    /// Source releases, dependencies first.
    pub sources: Vec<SourceRecord>,
}

/// Hash and describe the verified artifact at `path` and write its
/// sidecar.
///
/// # Errors
///
/// Returns [`ForgeError::Io`] if the artifact cannot be read or the
/// sidecar cannot be written.
pub fn describe_artifact(
    path: &Utf8Path,
    context: ArtifactContext<'_>,
    executor: &dyn CommandExecutor,
) -> Result<ArtifactRecord> {
    let metadata = std::fs::metadata(path)?;
    let digest = compute_sha256(path.as_std_path())?;
    let sidecar = write_sidecar(path, &digest)?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or_else(now_epoch_secs, |age| age.as_secs());

    Ok(ArtifactRecord {
        name: context.name.to_owned(),
        path: path.to_owned(),
        version: context.report.version.clone().unwrap_or_default(),
        features: context
            .report
            .compiled_in()
            .into_iter()
            .map(str::to_owned)
            .collect(),
        size: metadata.len(),
        modified: format_epoch_secs(modified),
        sha256: digest.to_string(),
        sidecar,
        binary_type: describe_binary(executor, path),
        link: context.link,
        sources: context.sources,
    })
}

/// Write `<path>.sha256` containing `<hash>  <filename>`.
///
/// # Errors
///
/// Returns [`ForgeError::Io`] if the file cannot be written.
pub fn write_sidecar(path: &Utf8Path, digest: &Sha256Digest) -> Result<Utf8PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ForgeError::config(format!("artifact path {path} has no file name")))?;
    let sidecar = path.with_file_name(format!("{file_name}.{SIDECAR_EXTENSION}"));
    std::fs::write(&sidecar, format!("{digest}  {file_name}\n"))?;
    Ok(sidecar)
}

/// Describe the binary with `file -b`, falling back to `unknown`.
#[must_use]
pub fn describe_binary(executor: &dyn CommandExecutor, path: &Utf8Path) -> String {
    let invocation = Invocation::new("file").arg("-b").arg(path.as_str());
    match executor.run(&invocation) {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            if text.is_empty() {
                UNKNOWN_BINARY_TYPE.to_owned()
            } else {
                text
            }
        }
        Ok(_) | Err(_) => {
            log::debug!("file -b unavailable for {path}");
            UNKNOWN_BINARY_TYPE.to_owned()
        }
    }
}

/// Copy the artifact into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`ForgeError::Io`] if the copy fails.
pub fn copy_into(path: &Utf8Path, dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ForgeError::config(format!("artifact path {path} has no file name")))?;
    std::fs::create_dir_all(dir)?;
    let dest = dir.join(file_name);
    std::fs::copy(path, &dest)?;
    Ok(dest)
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs())
}

/// Format a Unix timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn format_epoch_secs(epoch_secs: u64) -> String {
    let (year, month, day) = civil_from_epoch(epoch_secs);
    let day_secs = epoch_secs % 86_400;
    let hour = day_secs / 3_600;
    let minute = (day_secs % 3_600) / 60;
    let second = day_secs % 60;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

/// Convert a Unix epoch timestamp to a `(year, month, day)` triple.
///
/// Howard Hinnant's `civil_from_days`, restricted to post-epoch dates so
/// the arithmetic stays unsigned.
fn civil_from_epoch(epoch_secs: u64) -> (u64, u64, u64) {
    let z = epoch_secs / 86_400 + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}
