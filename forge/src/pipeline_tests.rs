//! Unit tests for pipeline orchestration.
//!
//! Upstreams are served by `StubTransport` and builds answered by
//! `FakeToolchain`, so every stage runs for real against in-memory inputs.

use super::*;
use crate::error::ErrorKind;
use crate::features::{FeatureList, FeatureToggleSet};
use crate::graph::Variant;
use crate::test_utils::{FakeToolchain, SOCAT_BASE, Sidecar, StubTransport};
use rstest::rstest;
use tempfile::TempDir;

fn socat_only() -> StubTransport {
    StubTransport::new().with_release(
        SOCAT_BASE,
        "socat-1.8.0.0",
        &["socat-1.7.4.4.tar.gz", "socat-2.0.0-b9.tar.gz"],
        Sidecar::Matching,
    )
}

fn full_upstreams() -> StubTransport {
    socat_only().with_full_variant_dependencies()
}

fn enabling(names: &str) -> BuildSettings {
    BuildSettings {
        toggles: FeatureToggleSet::new(
            FeatureList::Unset,
            FeatureList::parse(Some(names)).expect("known features"),
        ),
        ..BuildSettings::default()
    }
}

struct Run {
    result: Result<ArtifactRecord>,
    stderr: String,
    _temp: TempDir,
    output_dir: Utf8PathBuf,
}

fn run(
    settings: &BuildSettings,
    transport: &StubTransport,
    toolchain: &FakeToolchain,
    quiet: bool,
) -> Run {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    let output_dir = root.join("dist");
    let scratch = ScratchDir::create(Some(&root.join("scratch"))).expect("scratch");
    let context = PipelineContext {
        settings,
        scratch: &scratch,
        output_dir: &output_dir,
        jobs: None,
        quiet,
    };
    let mut stderr = Vec::new();
    let result = run_build(
        &context,
        Collaborators {
            transport,
            executor: toolchain,
        },
        &mut stderr,
    );
    Run {
        result,
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        _temp: temp,
        output_dir,
    }
}

#[test]
fn minimal_build_reports_exactly_the_enabled_features() {
    let settings = enabling("ip4,help,unix,listen,exec");
    let toolchain = FakeToolchain::new("socat");
    let outcome = run(&settings, &socat_only(), &toolchain, false);
    let record = outcome.result.expect("build succeeds");

    assert_eq!(record.version, "1.8.0.0");
    assert_eq!(record.features, ["help", "unix", "ip4", "listen", "exec"]);
    assert_eq!(record.path, outcome.output_dir.join("socat"));
    assert!(record.path.is_file());
    assert!(record.sidecar.is_file());
    assert!(record.binary_type.starts_with("ELF"));
    assert_eq!(record.link, "-static");
    assert_eq!(record.sources.len(), 1);
    assert!(record.sources.iter().all(|source| source.verified));
    assert!(outcome.stderr.contains("Building socat 1.8.0.0..."));
}

#[test]
fn default_lists_disable_everything_then_enable_defaults() {
    let toolchain = FakeToolchain::new("socat");
    let outcome = run(&BuildSettings::default(), &socat_only(), &toolchain, true);
    let record = outcome.result.expect("build succeeds");
    assert_eq!(record.features, ["help", "ip4"]);

    let configure = toolchain
        .invocations()
        .into_iter()
        .find(|invocation| invocation.program.ends_with("/configure"))
        .expect("target configured");
    assert_eq!(configure.args.len(), 37);
    assert_eq!(configure.args.first().map(String::as_str), Some("--disable-help"));
    assert_eq!(
        configure.args.get(35..),
        Some(&["--enable-help".to_owned(), "--enable-ip4".to_owned()][..])
    );
    assert_eq!(configure.env_value("LDFLAGS"), Some("-static"));
}

#[test]
fn mismatched_checksum_pin_fails_before_any_download() {
    let settings = BuildSettings {
        version: Some("1.8.0.0".to_owned()),
        checksum: Some(Sha256Digest::try_from("0".repeat(64)).expect("digest")),
        ..BuildSettings::default()
    };
    let transport = socat_only();
    let toolchain = FakeToolchain::new("socat");
    let err = run(&settings, &transport, &toolchain, true)
        .result
        .expect_err("pin disagrees with published checksum");
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(transport.downloads().is_empty());
    assert!(toolchain.invocations().is_empty());
}

#[test]
fn tampered_archive_never_reaches_the_build() {
    let transport = StubTransport::new().with_release(
        SOCAT_BASE,
        "socat-1.8.0.0",
        &[],
        Sidecar::Digest("f".repeat(64)),
    );
    let toolchain = FakeToolchain::new("socat");
    let outcome = run(&BuildSettings::default(), &transport, &toolchain, true);
    let err = outcome.result.expect_err("digest differs");
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(toolchain.invocations().is_empty());
    assert!(!outcome.output_dir.join("socat").exists());
}

#[test]
fn full_variant_builds_dependencies_in_order_into_target_paths() {
    let settings = BuildSettings {
        variant: Variant::Full,
        ..enabling("ip4,help")
    };
    let toolchain = FakeToolchain::new("socat");
    let outcome = run(&settings, &full_upstreams(), &toolchain, false);
    let record = outcome.result.expect("build succeeds");

    assert_eq!(toolchain.configured_units(), ["ncurses", "readline", "openssl", "socat"]);
    assert_eq!(record.features, ["help", "ip4", "readline", "openssl"]);
    assert_eq!(
        record.sources.iter().map(|source| source.name.as_str()).collect::<Vec<_>>(),
        ["ncurses", "readline", "openssl", "socat"]
    );

    let target_configure = toolchain
        .invocations()
        .into_iter()
        .filter(|invocation| invocation.program.ends_with("/configure"))
        .last()
        .expect("target configured");
    let cppflags = target_configure.env_value("CPPFLAGS").expect("include paths");
    assert_eq!(cppflags.matches("-I").count(), 3);
    assert!(cppflags.contains("deps/openssl/include"));

    assert!(outcome.stderr.contains("WARNING: no published checksum for ncurses-6.4.tar.gz"));
    assert!(outcome.stderr.contains("WARNING: no published checksum for readline-8.2.tar.gz"));
}

#[test]
fn reported_version_must_match_resolved_version() {
    let toolchain = FakeToolchain::new("socat").reporting_version("1.8.0.1");
    let outcome = run(&BuildSettings::default(), &socat_only(), &toolchain, true);
    let err = outcome.result.expect_err("version differs");
    assert_eq!(err.kind(), ErrorKind::VersionMismatch);
    assert!(!outcome.output_dir.join("socat").exists());
}

#[rstest]
#[case::requested_feature(Variant::Minimal, "unix")]
#[case::dependency_feature(Variant::Full, "openssl")]
fn missing_feature_is_a_feature_mismatch(#[case] variant: Variant, #[case] feature: &str) {
    let settings = BuildSettings {
        variant,
        ..enabling("ip4,help,unix")
    };
    let toolchain = FakeToolchain::new("socat").suppressing(feature);
    let err = run(&settings, &full_upstreams(), &toolchain, true)
        .result
        .expect_err("feature suppressed");
    assert!(matches!(
        err,
        ForgeError::FeatureMismatch { feature: ref reported, .. } if reported == feature
    ));
}

#[test]
fn dependency_failure_stops_before_the_target() {
    let settings = BuildSettings {
        variant: Variant::Full,
        ..BuildSettings::default()
    };
    let toolchain = FakeToolchain::new("socat").failing("readline", "make");
    let err = run(&settings, &full_upstreams(), &toolchain, true)
        .result
        .expect_err("readline fails");
    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(err.to_string().contains("simulated failure in readline"));
    assert_eq!(toolchain.configured_units(), ["ncurses", "readline"]);
}

#[test]
fn quiet_keeps_warnings_only() {
    let settings = BuildSettings {
        variant: Variant::Full,
        ..BuildSettings::default()
    };
    let toolchain = FakeToolchain::new("socat");
    let outcome = run(&settings, &full_upstreams(), &toolchain, true);
    outcome.result.expect("build succeeds");
    assert!(!outcome.stderr.contains("Building"));
    assert!(outcome.stderr.lines().all(|line| line.starts_with("WARNING:")));
    assert_eq!(outcome.stderr.lines().count(), 2);
}

#[test]
fn identical_inputs_give_identical_reports() {
    let settings = BuildSettings {
        version: Some("1.8.0.0".to_owned()),
        ..enabling("ip4,help,tcp,udp")
    };
    let first = run(&settings, &socat_only(), &FakeToolchain::new("socat"), true)
        .result
        .expect("first build");
    let second = run(&settings, &socat_only(), &FakeToolchain::new("socat"), true)
        .result
        .expect("second build");
    assert_eq!(first.version, second.version);
    assert_eq!(first.features, second.features);
    assert_eq!(first.sha256, second.sha256);
}

#[test]
fn resolve_units_picks_latest_numeric_release() {
    let settings = BuildSettings {
        variant: Variant::Full,
        ..BuildSettings::default()
    };
    let releases = resolve_units(&settings, &full_upstreams()).expect("resolved");
    let summary: Vec<_> = releases
        .iter()
        .map(|release| (release.name.as_str(), release.version.as_str(), release.checksum.is_some()))
        .collect();
    assert_eq!(
        summary,
        [
            ("ncurses", "6.4", false),
            ("readline", "8.2", false),
            ("openssl", "3.0.13", true),
            ("socat", "1.8.0.0", true),
        ]
    );
}

#[test]
fn plan_lists_dependencies_then_target_with_flags() {
    let settings = BuildSettings {
        variant: Variant::Full,
        dependency_versions: [("openssl".to_owned(), "3.0.13".to_owned())].into(),
        ..BuildSettings::default()
    };
    let plan = plan(&settings, Some(8));
    let names: Vec<_> = plan.units.iter().map(|unit| unit.name.as_str()).collect();
    assert_eq!(names, ["ncurses", "readline", "openssl", "socat"]);
    assert_eq!(
        plan.units.get(2).and_then(|unit| unit.version_pin.as_deref()),
        Some("3.0.13")
    );
    let target = plan.units.last().expect("target planned");
    assert!(target.configure_flags.contains(&"--enable-openssl".to_owned()));
    assert_eq!(plan.jobs, Some(8));
}
