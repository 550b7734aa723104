//! Unit tests for feature composition.

use super::*;
use crate::error::ErrorKind;
use rstest::rstest;

fn list(text: &str) -> FeatureList {
    FeatureList::parse(Some(text)).expect("known names")
}

#[test]
fn catalog_has_unique_names() {
    for (i, name) in FEATURE_CATALOG.iter().enumerate() {
        assert!(
            !FEATURE_CATALOG.iter().skip(i + 1).any(|other| other == name),
            "{name} listed twice"
        );
    }
}

#[test]
fn defaults_disable_everything_then_enable_help_and_ip4() {
    let flags = FeatureToggleSet::default().configure_flags();
    let mut expected: Vec<String> = FEATURE_CATALOG
        .iter()
        .map(|name| format!("--disable-{name}"))
        .collect();
    expected.push("--enable-help".to_owned());
    expected.push("--enable-ip4".to_owned());
    assert_eq!(flags, expected);
    assert_eq!(flags.len(), 37);
}

#[test]
fn both_empty_emits_no_flags() {
    let toggles = FeatureToggleSet::new(FeatureList::Empty, FeatureList::Empty);
    assert!(toggles.configure_flags().is_empty());
    assert!(toggles.effective_set().is_empty());
    assert!(toggles.expected_disabled().is_empty());
}

#[rstest]
#[case::only_disabled("unix,ip6", "ip4", "unix", false)]
#[case::in_both("unix,ip6", "unix", "unix", true)]
#[case::never_mentioned("ip6", "ip4", "tcp", false)]
fn enable_wins_over_disable(
    #[case] disabled: &str,
    #[case] enabled: &str,
    #[case] name: &str,
    #[case] present: bool,
) {
    let toggles = FeatureToggleSet::new(list(disabled), list(enabled));
    assert_eq!(
        toggles.effective_set().iter().any(|n| n == name),
        present
    );
}

#[test]
fn unmentioned_names_are_not_asserted_either_way() {
    let toggles = FeatureToggleSet::new(list("ip6"), list("ip4"));
    assert!(!toggles.expected_disabled().contains(&"tcp".to_owned()));
    assert!(!toggles.effective_set().contains(&"tcp".to_owned()));
}

#[test]
fn full_catalog_disabled_expects_everything_else_absent() {
    let toggles = FeatureToggleSet::new(FeatureList::Unset, list("ip4 help unix listen exec"));
    let disabled = toggles.expected_disabled();
    assert_eq!(disabled.len(), FEATURE_CATALOG.len() - 5);
    assert!(!disabled.contains(&"unix".to_owned()));
    assert!(disabled.contains(&"openssl".to_owned()));
}

#[rstest]
#[case::commas("ip4,unix", &["ip4", "unix"])]
#[case::spaces("  ip4   unix ", &["ip4", "unix"])]
#[case::mixed("ip4, unix\tlisten", &["ip4", "unix", "listen"])]
#[case::duplicates("ip4,ip4", &["ip4"])]
fn parse_splits_on_commas_and_whitespace(#[case] text: &str, #[case] expected: &[&str]) {
    let parsed = list(text);
    let names: Vec<&str> = parsed
        .names()
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(names, expected);
}

#[rstest]
#[case::empty("")]
#[case::separators(" ,, ")]
fn separators_alone_are_explicit_empty(#[case] text: &str) {
    assert_eq!(list(text), FeatureList::Empty);
}

#[test]
fn unknown_names_are_config_errors() {
    let err = FeatureList::parse(Some("ip4,ip5")).expect_err("ip5 unknown");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("ip5"));
}

#[rstest]
#[case::simple("ip4", "WITH_IP4")]
#[case::hyphenated("abstract-unixsocket", "WITH_ABSTRACT_UNIXSOCKET")]
fn markers_are_upper_snake(#[case] feature: &str, #[case] marker: &str) {
    assert_eq!(marker_for(feature), marker);
}

#[rstest]
#[case::unset(FeatureList::Unset, &["help", "ip4", "readline", "openssl"])]
#[case::empty(FeatureList::Empty, &["readline", "openssl"])]
#[case::already_named(list("openssl,unix"), &["openssl", "unix", "readline"])]
fn appended_features_follow_caller_names(#[case] enabled: FeatureList, #[case] expected: &[&str]) {
    let toggles =
        FeatureToggleSet::new(FeatureList::Unset, enabled).with_appended(&["readline", "openssl"]);
    assert_eq!(toggles.effective_set(), expected);
    let flags = toggles.configure_flags();
    assert_eq!(flags.last().map(String::as_str), expected.last().map(|n| format!("--enable-{n}")).as_deref());
}
