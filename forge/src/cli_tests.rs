//! Tests for CLI parsing and default behaviours.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["pinsmith"]);
    assert!(cli.command.is_none());
    assert!(cli.config.is_none());
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
    let build = cli.build_args();
    assert_eq!(build.output_dir, Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
    assert!(build.jobs.is_none());
    assert!(!build.dry_run);
    assert!(!build.keep_scratch);
    assert_eq!(build.selection.overrides(), Overrides::default());
}

#[test]
fn build_subcommand_takes_precedence_over_flattened_args() {
    let cli = Cli::parse_from(["pinsmith", "build", "--jobs", "4", "--dry-run"]);
    assert!(matches!(cli.command, Some(Command::Build(_))));
    assert_eq!(cli.build_args().jobs, Some(4));
    assert!(cli.build_args().dry_run);
}

#[test]
fn selection_maps_onto_overrides() {
    let cli = Cli::parse_from([
        "pinsmith",
        "--version-pin",
        "1.8.0.0",
        "--checksum-pin",
        "abc",
        "--dep-version",
        "openssl=3.0.13",
        "--dep-version",
        "ncurses=6.4",
        "--disable",
        "ip6",
        "--enable",
        "",
        "--link-flags",
        "-static-pie",
        "--variant",
        "full",
    ]);
    let overrides = cli.build_args().selection.overrides();
    assert_eq!(overrides.version.as_deref(), Some("1.8.0.0"));
    assert_eq!(overrides.sha256.as_deref(), Some("abc"));
    assert_eq!(
        overrides.dependencies,
        [
            ("openssl".to_owned(), "3.0.13".to_owned()),
            ("ncurses".to_owned(), "6.4".to_owned()),
        ]
    );
    assert_eq!(overrides.disabled.as_deref(), Some("ip6"));
    assert_eq!(overrides.enabled.as_deref(), Some(""));
    assert_eq!(overrides.link_flags.as_deref(), Some("-static-pie"));
    assert_eq!(overrides.variant, Some(Variant::Full));
}

#[rstest]
#[case::no_separator("openssl")]
#[case::no_version("openssl=")]
#[case::no_name("=3.0.13")]
fn malformed_dependency_pin_is_rejected(#[case] value: &str) {
    let result = Cli::try_parse_from(["pinsmith", "--dep-version", value]);
    assert!(result.is_err());
}

#[test]
fn quiet_conflicts_with_verbose() {
    let result = Cli::try_parse_from(["pinsmith", "-q", "-v"]);
    assert!(result.is_err());
}

#[test]
fn global_flags_follow_subcommands() {
    let cli = Cli::parse_from(["pinsmith", "resolve", "--config", "pinsmith.toml", "-vv"]);
    assert_eq!(cli.config, Some(Utf8PathBuf::from("pinsmith.toml")));
    assert_eq!(cli.verbosity, 2);
    assert!(matches!(cli.command, Some(Command::Resolve(_))));
}

#[test]
fn flags_subcommand_parses_list_and_features() {
    let cli = Cli::parse_from(["pinsmith", "flags", "--enable", "unix,tcp"]);
    match cli.command {
        Some(Command::Flags(args)) => {
            assert!(!args.list);
            assert_eq!(args.features.overrides().enabled.as_deref(), Some("unix,tcp"));
        }
        _ => panic!("expected Flags command"),
    }

    let cli = Cli::parse_from(["pinsmith", "flags", "--list"]);
    assert!(matches!(cli.command, Some(Command::Flags(FlagsArgs { list: true, .. }))));
}

#[test]
fn unknown_variant_is_rejected() {
    let result = Cli::try_parse_from(["pinsmith", "--variant", "huge"]);
    assert!(result.is_err());
}
