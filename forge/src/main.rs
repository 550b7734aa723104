//! pinsmith CLI entrypoint.
//!
//! This binary resolves, verifies, builds, and checks a static build of the
//! target package, then prints the artifact record as JSON on stdout.

use clap::Parser;
use pinsmith::catalog::transport::HttpTransport;
use pinsmith::cli::{BuildArgs, Cli, Command, FlagsArgs, SelectionArgs};
use pinsmith::config::BuildSettings;
use pinsmith::error::Result;
use pinsmith::executor::{CommandExecutor, EchoingExecutor, SystemCommandExecutor};
use pinsmith::features::{DEFAULT_ENABLED, FEATURE_CATALOG, marker_for};
use pinsmith::output::{fatal_line, plan_text, write_stderr_line};
use pinsmith::pipeline::{Collaborators, PipelineContext, plan, resolve_units, run_build};
use pinsmith::resolution::PackageRelease;
use pinsmith::scratch::ScratchDir;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Some(Command::Flags(args)) => run_flags(cli, args, stdout),
        Some(Command::Resolve(args)) => run_resolve(cli, args, stdout),
        Some(Command::Build(_)) | None => run_build_command(cli, cli.build_args(), stdout, stderr),
    }
}

/// Prints the feature catalog or the composed configure flags.
fn run_flags(cli: &Cli, args: &FlagsArgs, stdout: &mut dyn Write) -> Result<()> {
    if args.list {
        for feature in FEATURE_CATALOG {
            let default = if DEFAULT_ENABLED.contains(&feature) {
                "  (enabled by default)"
            } else {
                ""
            };
            writeln!(stdout, "{feature:<20} {:<26}{default}", marker_for(feature))?;
        }
        return Ok(());
    }
    let settings = BuildSettings::load(cli.config.as_deref(), &args.features.overrides())?;
    writeln!(stdout, "{}", settings.toggles.configure_flags().join(" "))?;
    Ok(())
}

/// Resolves every unit without downloading archives.
fn run_resolve(cli: &Cli, args: &SelectionArgs, stdout: &mut dyn Write) -> Result<()> {
    let settings = BuildSettings::load(cli.config.as_deref(), &args.overrides())?;
    let releases = resolve_units(&settings, &HttpTransport)?;
    write_releases(&releases, stdout)
}

fn write_releases(releases: &[PackageRelease], stdout: &mut dyn Write) -> Result<()> {
    for release in releases {
        let checksum = release
            .checksum
            .as_ref()
            .map_or_else(|| "unpublished".to_owned(), ToString::to_string);
        writeln!(
            stdout,
            "{}\t{}\t{}\t{checksum}",
            release.name, release.version, release.archive_name
        )?;
    }
    Ok(())
}

/// Runs the full pipeline, or prints the plan for `--dry-run`.
fn run_build_command(
    cli: &Cli,
    args: &BuildArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let settings = BuildSettings::load(cli.config.as_deref(), &args.selection.overrides())?;
    if args.dry_run {
        write_stderr_line(stderr, plan_text(&plan(&settings, args.jobs)));
        return Ok(());
    }

    let scratch = ScratchDir::create(args.scratch_dir.as_deref())?;
    let context = PipelineContext {
        settings: &settings,
        scratch: &scratch,
        output_dir: &args.output_dir,
        jobs: args.jobs,
        quiet: cli.quiet,
    };

    let mut echo_sink = std::io::stderr();
    let system = SystemCommandExecutor;
    let echoing;
    let executor: &dyn CommandExecutor = if cli.verbosity > 0 {
        echoing = EchoingExecutor::new(&system, &mut echo_sink);
        &echoing
    } else {
        &system
    };
    let result = run_build(
        &context,
        Collaborators {
            transport: &HttpTransport,
            executor,
        },
        stderr,
    );

    if args.keep_scratch {
        let kept = scratch.keep();
        write_stderr_line(stderr, format!("Scratch directory kept at {}", kept.display()));
    }
    let record = result?;
    let json = serde_json::to_string_pretty(&record).map_err(std::io::Error::from)?;
    writeln!(stdout, "{json}")?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, fatal_line(&err));
            1
        }
    }
}
