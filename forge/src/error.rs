//! Error types for the pinsmith build orchestrator.
//!
//! Every fail-closed condition in the pipeline maps onto one [`ForgeError`]
//! variant. [`ForgeError::kind`] collapses the variants onto the public
//! taxonomy printed in the process-level failure line.

use crate::unpack::UnpackError;
use std::fmt;
use thiserror::Error;

/// Which comparison an integrity failure was detected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStage {
    /// The caller's checksum pin disagrees with the upstream-published value.
    PinVersusPublished,
    /// The downloaded bytes disagree with the expected digest.
    PublishedVersusDownloaded,
    /// The upstream checksum record could not be read.
    PublishedRecord,
}

impl fmt::Display for IntegrityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinVersusPublished => write!(f, "pinned checksum vs published checksum"),
            Self::PublishedVersusDownloaded => {
                write!(f, "expected checksum vs downloaded archive")
            }
            Self::PublishedRecord => write!(f, "published checksum record"),
        }
    }
}

/// Errors that terminate a pinsmith invocation.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A listing, manifest, or archive could not be fetched.
    #[error("failed to fetch {url}: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of the transport failure.
        reason: String,
    },

    /// No upstream release matched the request.
    #[error("no release of {package} matches {wanted}")]
    NotFound {
        /// Name of the upstream package.
        package: String,
        /// What was looked for (an exact version or "latest").
        wanted: String,
    },

    /// Checksums disagree, or the published record is unusable.
    #[error("integrity check failed for {archive} ({stage}): {reason}")]
    Integrity {
        /// Archive filename the check applied to.
        archive: String,
        /// Which comparison failed.
        stage: IntegrityStage,
        /// Description including the digests involved.
        reason: String,
    },

    /// A configure, compile, or install step exited unsuccessfully.
    #[error("{step} failed for {unit} ({status}):\n{output}")]
    Build {
        /// Name of the unit being built.
        unit: String,
        /// The step that failed (configure, make, install).
        step: &'static str,
        /// Rendered exit status.
        status: String,
        /// Captured tool output.
        output: String,
    },

    /// The artifact reports a different version than was resolved.
    #[error("artifact reports version {reported}, expected {expected}")]
    VersionMismatch {
        /// The version resolved at the start of the run.
        expected: String,
        /// The version token from the self-report, or a placeholder.
        reported: String,
    },

    /// The artifact's compiled-in features differ from what was requested.
    #[error("feature {feature} ({marker}) expected {expected}, artifact reports {reported}")]
    FeatureMismatch {
        /// Feature name from the catalog or dependency graph.
        feature: String,
        /// The self-report marker inspected.
        marker: String,
        /// Expected marker state.
        expected: &'static str,
        /// Reported marker state.
        reported: &'static str,
    },

    /// The supplied configuration is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Description of the problem.
        reason: String,
    },

    /// Extracting a verified archive failed.
    #[error("unpacking failed: {0}")]
    Unpack(#[from] UnpackError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Public failure taxonomy used in the process-level error line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Listing unreachable or timed out.
    Network,
    /// No matching release.
    NotFound,
    /// Checksum disagreement.
    Integrity,
    /// Non-zero exit from configure or compile.
    Build,
    /// Artifact version differs from the resolved version.
    VersionMismatch,
    /// Artifact feature markers differ from expectations.
    FeatureMismatch,
    /// Invalid caller configuration.
    Config,
    /// Local filesystem or process spawning failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "NetworkError",
            Self::NotFound => "NotFound",
            Self::Integrity => "IntegrityError",
            Self::Build => "BuildError",
            Self::VersionMismatch => "VersionMismatch",
            Self::FeatureMismatch => "FeatureMismatch",
            Self::Config => "ConfigError",
            Self::Io => "IoError",
        };
        f.write_str(name)
    }
}

impl ForgeError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Build { .. } => ErrorKind::Build,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::FeatureMismatch { .. } => ErrorKind::FeatureMismatch,
            Self::Config { .. } => ErrorKind::Config,
            Self::Unpack(_) | Self::Io(_) => ErrorKind::Io,
            #[cfg(any(test, feature = "test-support"))]
            Self::StubMismatch { .. } => ErrorKind::Io,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`ForgeError`].
pub type Result<T> = std::result::Result<T, ForgeError>;
