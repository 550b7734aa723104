//! Post-build verification of the produced binary.
//!
//! The binary is run twice, with `-h` and `-V`. The version report names
//! the build (`socat version 1.8.0.0 on ...`) and lists one preprocessor
//! marker per optional feature (`#define WITH_IP4 1` or `#undef WITH_IP6`).
//! Nothing is reported as built until both reports agree with what was
//! requested.

use crate::error::{ForgeError, Result};
use crate::executor::{CommandExecutor, Invocation};
use crate::features::{is_known, marker_for};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder used when the version report has no version line.
pub const NO_VERSION: &str = "<none>";

/// State of one self-report marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    /// `#define <marker> <value>`.
    Defined(String),
    /// `#undef <marker>`.
    Undefined,
}

impl MarkerState {
    /// Returns true when the marker says the feature is compiled in.
    #[must_use]
    pub fn is_compiled_in(&self) -> bool {
        matches!(self, Self::Defined(value) if value != "0")
    }
}

/// The parsed self-report of a built artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureReport {
    /// Version token from the version report.
    pub version: Option<String>,
    /// Every `WITH_*` marker found, catalog or not.
    pub markers: BTreeMap<String, MarkerState>,
    /// Raw help report.
    pub help: String,
}

impl FeatureReport {
    /// Catalog features whose markers read as compiled in, in catalog
    /// order.
    #[must_use]
    pub fn compiled_in(&self) -> Vec<&'static str> {
        crate::features::FEATURE_CATALOG
            .into_iter()
            .filter(|feature| {
                self.markers
                    .get(&marker_for(feature))
                    .is_some_and(MarkerState::is_compiled_in)
            })
            .collect()
    }
}

/// Extract the version token and markers from a version report.
///
/// # Examples
///
/// ```
/// use pinsmith::verify::{parse_version_report, MarkerState};
///
/// let report = "socat by Gerhard Rieger\n\
///               socat version 1.8.0.0 on Jan  1 2026\n\
///               features:\n  #define WITH_IP4 1\n  #undef WITH_IP6\n";
/// let parsed = parse_version_report("socat", report);
/// assert_eq!(parsed.version.as_deref(), Some("1.8.0.0"));
/// assert_eq!(parsed.markers.get("WITH_IP6"), Some(&MarkerState::Undefined));
/// ```
#[must_use]
pub fn parse_version_report(name: &str, text: &str) -> FeatureReport {
    let needle = format!("{name} version");
    let version = text
        .lines()
        .find(|line| line.contains(&needle))
        .and_then(|line| {
            let mut words = line.split_whitespace().skip_while(|word| *word != "version");
            words.next();
            words.next()
        })
        .map(str::to_owned);

    let markers = text.lines().filter_map(parse_marker).collect();
    FeatureReport {
        version,
        markers,
        help: String::new(),
    }
}

fn parse_marker(line: &str) -> Option<(String, MarkerState)> {
    let mut words = line.split_whitespace();
    let directive = words.next()?;
    let marker = words.next().filter(|marker| marker.starts_with("WITH_"))?;
    let state = match directive {
        "#define" => MarkerState::Defined(words.next().unwrap_or_default().to_owned()),
        "#undef" => MarkerState::Undefined,
        _ => return None,
    };
    Some((marker.to_owned(), state))
}

/// What the artifact must report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    /// Binary name, used to locate the version line.
    pub name: String,
    /// Resolved version the artifact must report exactly.
    pub version: String,
    /// Features lit up by built dependencies.
    pub dependency_features: Vec<String>,
    /// Features that must be compiled in.
    pub enabled: Vec<String>,
    /// Catalog features that must not be compiled in.
    pub disabled: Vec<String>,
}

/// Runs a built binary and checks its self-report.
pub struct ArtifactVerifier<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> ArtifactVerifier<'a> {
    /// Create a verifier running the binary through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Run `binary -h` and `binary -V` and compare against `expected`.
    ///
    /// Exit codes of the report invocations are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Io`] if the binary cannot be run,
    /// [`ForgeError::VersionMismatch`] if it reports another version, and
    /// [`ForgeError::FeatureMismatch`] for the first marker that disagrees.
    pub fn verify(&self, binary: &Path, expected: &Expectations) -> Result<FeatureReport> {
        let program = binary.to_string_lossy();
        let help = self.executor.run(&Invocation::new(&*program).arg("-h"))?;
        let version = self.executor.run(&Invocation::new(&*program).arg("-V"))?;

        let mut report =
            parse_version_report(&expected.name, &String::from_utf8_lossy(&version.stdout));
        report.help = combined(&help);
        check_report(&report, expected)?;
        log::info!(
            "{} {} verified with {} compiled-in features",
            expected.name,
            expected.version,
            report.compiled_in().len()
        );
        Ok(report)
    }
}

fn combined(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Compare a parsed report with expectations: version, then dependency
/// markers, then enabled and disabled features, then the help report.
///
/// # Errors
///
/// Returns the first disagreement found.
pub fn check_report(report: &FeatureReport, expected: &Expectations) -> Result<()> {
    let reported = report.version.as_deref().unwrap_or(NO_VERSION);
    if reported != expected.version {
        return Err(ForgeError::VersionMismatch {
            expected: expected.version.clone(),
            reported: reported.to_owned(),
        });
    }

    for feature in expected
        .dependency_features
        .iter()
        .chain(&expected.enabled)
    {
        require(report, feature, true)?;
    }
    for feature in expected.disabled.iter().filter(|name| is_known(name)) {
        require(report, feature, false)?;
    }

    let wants_help = expected.enabled.iter().any(|name| name == "help");
    if wants_help && !report.help.contains("Usage") {
        return Err(ForgeError::FeatureMismatch {
            feature: "help".to_owned(),
            marker: marker_for("help"),
            expected: "a usage report",
            reported: "no usage report",
        });
    }
    Ok(())
}

fn require(report: &FeatureReport, feature: &str, compiled_in: bool) -> Result<()> {
    let marker = marker_for(feature);
    let state = report.markers.get(&marker);
    let actual = state.is_some_and(MarkerState::is_compiled_in);
    if actual == compiled_in {
        return Ok(());
    }
    Err(ForgeError::FeatureMismatch {
        feature: feature.to_owned(),
        marker,
        expected: if compiled_in {
            "compiled in"
        } else {
            "not compiled in"
        },
        reported: match state {
            Some(state) if state.is_compiled_in() => "compiled in",
            Some(_) => "not compiled in",
            None => "absent from report",
        },
    })
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
