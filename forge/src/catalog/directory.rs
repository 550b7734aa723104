//! Catalog backed by an HTML directory index.
//!
//! Archive names are scraped from `href` attributes. Published checksums
//! live in per-archive sidecar files (for example `socat-1.8.0.0.tar.gz.sha256`)
//! when the upstream declares a sidecar suffix.

use std::sync::LazyLock;

use regex::Regex;

use super::transport::{FetchError, Transport};
use super::{CatalogError, ReleaseCatalog, push_unique};
use crate::digest::Sha256Digest;
use crate::upstream::UpstreamSource;

/// Catalog that scrapes a directory index page.
pub struct DirectoryListingCatalog<'a> {
    upstream: &'a UpstreamSource,
    transport: &'a dyn Transport,
}

impl<'a> DirectoryListingCatalog<'a> {
    /// Create a catalog for `upstream` fetching through `transport`.
    #[must_use]
    pub fn new(upstream: &'a UpstreamSource, transport: &'a dyn Transport) -> Self {
        Self {
            upstream,
            transport,
        }
    }
}

impl ReleaseCatalog for DirectoryListingCatalog<'_> {
    fn archives(&self) -> Result<Vec<String>, CatalogError> {
        let page = self.transport.fetch_text(&self.upstream.listing_url)?;
        let entries = scrape_hrefs(&page);
        log::debug!(
            "{} lists {} entries",
            self.upstream.listing_url,
            entries.len()
        );
        Ok(entries)
    }

    fn published_checksum(&self, archive: &str) -> Result<Option<Sha256Digest>, CatalogError> {
        let Some(suffix) = self.upstream.checksum_suffix.as_deref() else {
            return Ok(None);
        };
        let url = format!("{}{suffix}", self.upstream.archive_url(archive));
        match self.transport.fetch_text(&url) {
            Ok(record) => Sha256Digest::find_in(&record)
                .map(Some)
                .ok_or_else(|| CatalogError::MalformedChecksum {
                    archive: archive.to_owned(),
                }),
            Err(FetchError::NotFound { .. }) => {
                log::debug!("no checksum sidecar at {url}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[expect(clippy::expect_used, reason = "the pattern is a literal")]
fn href_pattern() -> &'static Regex {
    static HREF: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)href\s*=\s*["']?([^"'\s>]+)"#).expect("valid href pattern")
    });
    &HREF
}

/// Extract the final path segment of every link target, in page order
/// without duplicates.
fn scrape_hrefs(page: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for captures in href_pattern().captures_iter(page) {
        let Some(target) = captures.get(1) else {
            continue;
        };
        if let Some(name) = link_basename(target.as_str()) {
            push_unique(&mut entries, name);
        }
    }
    entries
}

/// Reduce a link target to its filename, dropping query strings, fragments,
/// and directory links.
fn link_basename(target: &str) -> Option<&str> {
    let path = target.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() || path.ends_with('/') {
        return None;
    }
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::transport::MockTransport;
    use crate::upstream::UpstreamSet;
    use rstest::{fixture, rstest};

    const INDEX: &str = r#"
        <html><body>
        <a href="?C=N;O=D">Name</a>
        <a href="/socat/">Parent Directory</a>
        <a href="socat-1.7.4.4.tar.gz">socat-1.7.4.4.tar.gz</a>
        <a href="socat-1.7.4.4.tar.gz.sha256">sha</a>
        <a HREF='socat-1.8.0.0.tar.gz'>socat-1.8.0.0.tar.gz</a>
        <a href="http://www.dest-unreach.org/socat/download/socat-1.8.0.0.tar.gz">again</a>
        <a href=socat-2.0.0-b9.tar.bz2>beta</a>
        </body></html>
    "#;

    #[fixture]
    fn socat() -> UpstreamSource {
        UpstreamSet::default()
            .get("socat")
            .cloned()
            .expect("socat built in")
    }

    #[test]
    fn scrapes_link_targets_once_each() {
        assert_eq!(
            scrape_hrefs(INDEX),
            [
                "socat-1.7.4.4.tar.gz",
                "socat-1.7.4.4.tar.gz.sha256",
                "socat-1.8.0.0.tar.gz",
                "socat-2.0.0-b9.tar.bz2",
            ]
        );
    }

    #[rstest]
    fn archives_fetches_listing_url(socat: UpstreamSource) {
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_text()
            .withf(|url| url == "http://www.dest-unreach.org/socat/download/")
            .times(1)
            .returning(|_| Ok(INDEX.to_owned()));
        let catalog = DirectoryListingCatalog::new(&socat, &transport);
        let archives = catalog.archives().expect("listing");
        assert!(archives.contains(&"socat-1.8.0.0.tar.gz".to_owned()));
    }

    #[rstest]
    fn archives_propagates_fetch_failure(socat: UpstreamSource) {
        let mut transport = MockTransport::new();
        transport.expect_fetch_text().returning(|url| {
            Err(FetchError::Http {
                url: url.to_owned(),
                reason: "timed out".to_owned(),
            })
        });
        let catalog = DirectoryListingCatalog::new(&socat, &transport);
        assert!(matches!(catalog.archives(), Err(CatalogError::Fetch(_))));
    }

    #[rstest]
    fn reads_digest_from_sidecar(socat: UpstreamSource) {
        let digest = "d".repeat(64);
        let record = format!("{digest}  socat-1.8.0.0.tar.gz\n");
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_text()
            .withf(|url| {
                url == "http://www.dest-unreach.org/socat/download/socat-1.8.0.0.tar.gz.sha256"
            })
            .returning(move |_| Ok(record.clone()));
        let catalog = DirectoryListingCatalog::new(&socat, &transport);
        let published = catalog
            .published_checksum("socat-1.8.0.0.tar.gz")
            .expect("sidecar read");
        assert_eq!(published.map(|d| d.to_string()), Some(digest));
    }

    #[rstest]
    fn missing_sidecar_means_unpublished(socat: UpstreamSource) {
        let mut transport = MockTransport::new();
        transport.expect_fetch_text().returning(|url| {
            Err(FetchError::NotFound {
                url: url.to_owned(),
            })
        });
        let catalog = DirectoryListingCatalog::new(&socat, &transport);
        let published = catalog
            .published_checksum("socat-1.8.0.0.tar.gz")
            .expect("404 is not an error");
        assert!(published.is_none());
    }

    #[rstest]
    fn garbage_sidecar_is_malformed(socat: UpstreamSource) {
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_text()
            .returning(|_| Ok("<html>moved</html>".to_owned()));
        let catalog = DirectoryListingCatalog::new(&socat, &transport);
        assert!(matches!(
            catalog.published_checksum("socat-1.8.0.0.tar.gz"),
            Err(CatalogError::MalformedChecksum { .. })
        ));
    }

    #[test]
    fn upstream_without_sidecar_never_fetches() {
        let readline = UpstreamSet::default()
            .get("readline")
            .cloned()
            .expect("readline built in");
        let transport = MockTransport::new();
        let catalog = DirectoryListingCatalog::new(&readline, &transport);
        assert!(
            catalog
                .published_checksum("readline-8.2.tar.gz")
                .expect("no sidecar")
                .is_none()
        );
    }
}
