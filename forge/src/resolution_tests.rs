//! Unit tests for release resolution.

use super::*;
use crate::catalog::{CatalogError, MockReleaseCatalog};
use crate::catalog::transport::FetchError;
use crate::error::ErrorKind;
use crate::upstream::UpstreamSet;
use rstest::{fixture, rstest};

#[fixture]
fn socat() -> UpstreamSource {
    UpstreamSet::default()
        .get("socat")
        .cloned()
        .expect("socat built in")
}

fn catalog_listing(entries: &[&str]) -> MockReleaseCatalog {
    let owned: Vec<String> = entries.iter().map(|e| (*e).to_owned()).collect();
    let mut catalog = MockReleaseCatalog::new();
    catalog
        .expect_archives()
        .returning(move || Ok(owned.clone()));
    catalog.expect_published_checksum().returning(|_| Ok(None));
    catalog
}

#[rstest]
fn latest_uses_numeric_order(socat: UpstreamSource) {
    let catalog = catalog_listing(&[
        "socat-1.9.0.0.tar.gz",
        "socat-1.10.0.0.tar.gz",
        "socat-1.2.0.0.tar.gz",
    ]);
    let release = VersionResolver::new(&socat, &catalog)
        .resolve(None)
        .expect("latest resolves");
    assert_eq!(release.version, "1.10.0.0");
    assert_eq!(release.archive_name, "socat-1.10.0.0.tar.gz");
    assert_eq!(
        release.url,
        "http://www.dest-unreach.org/socat/download/socat-1.10.0.0.tar.gz"
    );
}

#[rstest]
fn latest_ignores_prereleases_and_lookalikes(socat: UpstreamSource) {
    let catalog = catalog_listing(&[
        "socat-1.8.0.0.tar.gz",
        "socat-2.0.0-b9.tar.gz",
        "socat-ng-9.0.0.0.tar.gz",
        "socat-9.0.0.0.tar.bz2",
        "socat-1.8.0.0.tar.gz.sha256",
    ]);
    let release = VersionResolver::new(&socat, &catalog)
        .resolve(None)
        .expect("latest resolves");
    assert_eq!(release.version, "1.8.0.0");
}

#[rstest]
fn exact_pin_accepts_prerelease(socat: UpstreamSource) {
    let catalog = catalog_listing(&["socat-1.8.0.0.tar.gz", "socat-2.0.0-b9.tar.gz"]);
    let release = VersionResolver::new(&socat, &catalog)
        .resolve(Some("2.0.0-b9"))
        .expect("pinned resolves");
    assert_eq!(release.archive_name, "socat-2.0.0-b9.tar.gz");
}

#[rstest]
#[case::absent_pin(&["socat-1.8.0.0.tar.gz"], Some("1.7.4.4"))]
#[case::empty_listing(&[], None)]
#[case::nothing_matches(&["README", "socat-2.0.0-b9.tar.gz"], None)]
fn unmatched_requests_are_not_found(
    socat: UpstreamSource,
    #[case] entries: &[&str],
    #[case] wanted: Option<&str>,
) {
    let catalog = catalog_listing(entries);
    let err = VersionResolver::new(&socat, &catalog)
        .resolve(wanted)
        .expect_err("nothing to resolve");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
fn listing_failure_is_network_error(socat: UpstreamSource) {
    let mut catalog = MockReleaseCatalog::new();
    catalog.expect_archives().returning(|| {
        Err(CatalogError::Fetch(FetchError::Http {
            url: "http://www.dest-unreach.org/socat/download/".to_owned(),
            reason: "timed out".to_owned(),
        }))
    });
    catalog.expect_published_checksum().never();
    let err = VersionResolver::new(&socat, &catalog)
        .resolve(None)
        .expect_err("listing unreachable");
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[rstest]
fn carries_published_checksum(socat: UpstreamSource) {
    let mut catalog = MockReleaseCatalog::new();
    catalog
        .expect_archives()
        .returning(|| Ok(vec!["socat-1.8.0.0.tar.gz".to_owned()]));
    catalog
        .expect_published_checksum()
        .withf(|archive| archive == "socat-1.8.0.0.tar.gz")
        .returning(|_| Ok(Some(Sha256Digest::try_from("e".repeat(64)).expect("digest"))));
    let release = VersionResolver::new(&socat, &catalog)
        .resolve(Some("1.8.0.0"))
        .expect("resolves");
    assert_eq!(
        release.checksum.map(|d| d.to_string()),
        Some("e".repeat(64))
    );
}

#[test]
fn equal_versions_break_ties_on_text() {
    let short: Version = "1.8".parse().expect("valid");
    let long: Version = "1.8.0".parse().expect("valid");
    assert_eq!(compare_versions(&long, &short), std::cmp::Ordering::Greater);
}
