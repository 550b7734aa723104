//! Structured release versions.
//!
//! Upstream archives carry versions such as `1.8.0.0`, `8.2`, or `1.1.1w`.
//! [`Version`] parses these into integer components plus an optional
//! trailing letter and orders them numerically, so `1.10.0.0` sorts above
//! `1.9.0.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest number of numeric components a version may have.
pub const MIN_COMPONENTS: usize = 2;

/// Largest number of numeric components a version may have.
pub const MAX_COMPONENTS: usize = 4;

/// Errors arising from version parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The text is not a dotted numeric version.
    #[error("malformed version \"{value}\": {reason}")]
    Malformed {
        /// The rejected text.
        value: String,
        /// Description of the problem.
        reason: String,
    },
}

/// A parsed release version.
///
/// Equality and ordering are numeric: missing trailing components count as
/// zero and a bare version sorts before the same numbers with a letter
/// suffix. The original text is kept for archive naming and for exact
/// comparisons against self-reports.
///
/// # Examples
///
/// ```
/// use pinsmith::version::Version;
///
/// let older: Version = "1.9.0.0".parse().expect("valid version");
/// let newer: Version = "1.10.0.0".parse().expect("valid version");
/// assert!(newer > older);
///
/// let patched: Version = "1.1.1w".parse().expect("valid version");
/// assert_eq!(patched.letter(), Some('w'));
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
    letter: Option<char>,
    text: String,
}

impl Version {
    /// Returns the numeric components.
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Returns the trailing letter, if any.
    #[must_use]
    pub const fn letter(&self) -> Option<char> {
        self.letter
    }

    /// Returns the version exactly as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| VersionError::Malformed {
            value: value.to_owned(),
            reason: reason.to_owned(),
        };

        let (numeric, letter) = split_letter(value);
        let components = numeric
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed("components must be non-negative integers"));
                }
                part.parse::<u64>()
                    .map_err(|_| malformed("component out of range"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !(MIN_COMPONENTS..=MAX_COMPONENTS).contains(&components.len()) {
            return Err(malformed(&format!(
                "expected {MIN_COMPONENTS} to {MAX_COMPONENTS} components, got {}",
                components.len()
            )));
        }

        Ok(Self {
            components,
            letter,
            text: value.to_owned(),
        })
    }
}

/// Split a single trailing lowercase letter that follows a digit.
fn split_letter(value: &str) -> (&str, Option<char>) {
    let mut chars = value.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(last), Some(prev)) if last.is_ascii_lowercase() && prev.is_ascii_digit() => {
            let cut = value.len() - last.len_utf8();
            (value.get(..cut).unwrap_or(value), Some(last))
        }
        _ => (value, None),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        (0..width)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.letter.cmp(&other.letter))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Per-package constraints on acceptable version shapes.
///
/// `socat` releases use four components, `openssl` three with an optional
/// letter on the 1.x line, and GNU packages two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionPattern {
    /// Minimum number of numeric components.
    pub min_components: usize,
    /// Maximum number of numeric components.
    pub max_components: usize,
    /// Whether a trailing letter is accepted.
    #[serde(default)]
    pub allow_letter: bool,
}

impl VersionPattern {
    /// A pattern accepting exactly `components` numeric components.
    #[must_use]
    pub const fn exact(components: usize) -> Self {
        Self {
            min_components: components,
            max_components: components,
            allow_letter: false,
        }
    }

    /// Returns a copy that also accepts a trailing letter.
    #[must_use]
    pub const fn with_letter(self) -> Self {
        Self {
            allow_letter: true,
            ..self
        }
    }

    /// Parse `text` and accept it only if it fits the pattern.
    #[must_use]
    pub fn parse(&self, text: &str) -> Option<Version> {
        let version = text.parse::<Version>().ok()?;
        self.matches(&version).then_some(version)
    }

    /// Returns true when `version` fits the pattern.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        let count = version.components().len();
        (self.min_components..=self.max_components).contains(&count)
            && (self.allow_letter || version.letter().is_none())
    }
}

impl Default for VersionPattern {
    fn default() -> Self {
        Self {
            min_components: MIN_COMPONENTS,
            max_components: MAX_COMPONENTS,
            allow_letter: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(text: &str) -> Version {
        text.parse().expect("valid version")
    }

    #[rstest]
    #[case::numeric_not_lexical("1.10.0.0", "1.9.0.0")]
    #[case::major("2.0", "1.99")]
    #[case::letter_after_bare("1.1.1a", "1.1.1")]
    #[case::letter_order("1.1.1w", "1.1.1k")]
    #[case::longer_wins_when_nonzero("1.8.0.1", "1.8.0")]
    fn orders_numerically(#[case] greater: &str, #[case] lesser: &str) {
        assert!(v(greater) > v(lesser), "{greater} should exceed {lesser}");
    }

    #[test]
    fn missing_components_compare_as_zero() {
        assert_eq!(v("1.8"), v("1.8.0"));
        assert_ne!(v("1.8").as_str(), v("1.8.0").as_str());
    }

    #[test]
    fn picks_latest_from_mixed_listing() {
        let latest = ["1.9.0.0", "1.10.0.0", "1.2.0.0"]
            .into_iter()
            .map(v)
            .max()
            .expect("non-empty");
        assert_eq!(latest.as_str(), "1.10.0.0");
    }

    #[rstest]
    #[case::single("1")]
    #[case::five("1.2.3.4.5")]
    #[case::empty_component("1..2")]
    #[case::prerelease("2.0.0-b9")]
    #[case::two_letters("1.1.1ab")]
    #[case::leading_letter("v1.2")]
    #[case::blank("")]
    fn rejects_malformed(#[case] text: &str) {
        assert!(text.parse::<Version>().is_err(), "{text} should be rejected");
    }

    #[rstest]
    #[case::exact_four(VersionPattern::exact(4), "1.8.0.0", true)]
    #[case::exact_four_short(VersionPattern::exact(4), "1.8.0", false)]
    #[case::letter_refused(VersionPattern::exact(3), "1.1.1w", false)]
    #[case::letter_allowed(VersionPattern::exact(3).with_letter(), "1.1.1w", true)]
    fn pattern_filters_shapes(
        #[case] pattern: VersionPattern,
        #[case] text: &str,
        #[case] accepted: bool,
    ) {
        assert_eq!(pattern.parse(text).is_some(), accepted);
    }
}
