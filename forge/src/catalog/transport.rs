//! HTTP transport for listings, checksum records, and archives.
//!
//! Provides a trait-based abstraction over network access so catalogs and
//! the integrity verifier can be exercised without a network.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Timeout for listing, manifest, and checksum fetches.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching upstream resources.
///
/// # Examples
///
/// ```
/// use pinsmith::catalog::transport::HttpTransport;
///
/// let transport = HttpTransport;
/// // Use transport.fetch_text(url) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Fetch a small text resource such as a listing or checksum file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] for HTTP 404 and
    /// [`FetchError::Http`] for any other failure, including timeouts.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Stream a (possibly large) archive into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Errors arising from transport operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed or timed out.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for crate::error::ForgeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http { url, reason } => Self::Network { url, reason },
            FetchError::NotFound { url } => Self::Network {
                url,
                reason: "not found (HTTP 404)".to_owned(),
            },
            FetchError::Io(source) => Self::Io(source),
        }
    }
}

/// HTTP transport using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        log::debug!("fetching {url}");
        let response = listing_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::Http {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        log::debug!("downloading {url} to {}", dest.display());
        let response = archive_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(FetchError::Io)?;
        Ok(())
    }
}

/// Agent for small fetches, bounded by [`LISTING_TIMEOUT`] end to end.
fn listing_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(LISTING_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Agent for archives; only connection setup is bounded.
fn archive_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(LISTING_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
