//! End-to-end build orchestration.
//!
//! A run resolves every unit, fetches and verifies every archive, builds
//! the dependencies in graph order, builds the target, checks the
//! artifact's self-report, and only then describes the artifact. Each stage
//! consumes the previous stage's verified output; the first failure ends
//! the run.

use crate::builder::{BuildExecutor, BuildUnit, InstallStep, LinkMode, SearchPaths};
use crate::catalog::catalog_for;
use crate::catalog::transport::Transport;
use crate::config::BuildSettings;
use crate::digest::Sha256Digest;
use crate::error::{ForgeError, Result};
use crate::executor::CommandExecutor;
use crate::graph::{BuildPlan, DependencyBuildGraph, PlannedUnit};
use crate::integrity::{IntegrityVerifier, VerifiedArchive, expected_digest};
use crate::output::write_stderr_line;
use crate::report::{ArtifactContext, ArtifactRecord, SourceRecord, copy_into, describe_artifact};
use crate::resolution::{PackageRelease, VersionResolver};
use crate::scratch::ScratchDir;
use crate::unpack::unpack_source;
use crate::upstream::UpstreamSource;
use crate::verify::{ArtifactVerifier, Expectations};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

/// External systems a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// HTTP access to listings and archives.
    pub transport: &'a dyn Transport,
    /// Process spawning for configure, make, and the artifact.
    pub executor: &'a dyn CommandExecutor,
}

/// Per-run options that are not build settings.
pub struct PipelineContext<'a> {
    /// Validated settings.
    pub settings: &'a BuildSettings,
    /// Working directory of this run.
    pub scratch: &'a ScratchDir,
    /// Where the verified artifact is copied.
    pub output_dir: &'a Utf8Path,
    /// Parallel make jobs.
    pub jobs: Option<usize>,
    /// Suppress progress output (warnings still shown).
    pub quiet: bool,
}

impl PipelineContext<'_> {
    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }
}

/// A verified archive unpacked in the scratch directory.
struct PreparedSource {
    release: PackageRelease,
    archive: VerifiedArchive,
    source_dir: PathBuf,
}

impl PreparedSource {
    fn record(&self) -> SourceRecord {
        SourceRecord::new(
            &self.release.name,
            &self.release.version,
            &self.archive.digest,
            self.archive.verification,
        )
    }
}

/// Resolve the dependencies of the selected variant, then the target.
///
/// # Errors
///
/// Returns the first resolution failure.
pub fn resolve_units(
    settings: &BuildSettings,
    transport: &dyn Transport,
) -> Result<Vec<PackageRelease>> {
    let graph = DependencyBuildGraph::for_variant(settings.variant);
    graph
        .dependencies()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(settings.target.as_str()))
        .map(|name| resolve_one(settings, transport, name))
        .collect()
}

fn resolve_one(
    settings: &BuildSettings,
    transport: &dyn Transport,
    name: &str,
) -> Result<PackageRelease> {
    let upstream = settings.upstream(name)?;
    let catalog = catalog_for(upstream, transport);
    VersionResolver::new(upstream, catalog.as_ref()).resolve(settings.version_for(name))
}

/// Describe what a run would do, without network or build access.
#[must_use]
pub fn plan(settings: &BuildSettings, jobs: Option<usize>) -> BuildPlan {
    let graph = DependencyBuildGraph::for_variant(settings.variant);
    let mut units: Vec<PlannedUnit> = graph
        .dependencies()
        .iter()
        .map(|name| PlannedUnit {
            name: name.clone(),
            version_pin: settings.version_for(name).map(str::to_owned),
            configure_flags: settings
                .upstreams
                .get(name)
                .map(|upstream| upstream.configure_flags.clone())
                .unwrap_or_default(),
        })
        .collect();
    let toggles = settings
        .toggles
        .with_appended(&graph.required_features(&settings.upstreams));
    units.push(PlannedUnit {
        name: settings.target.clone(),
        version_pin: settings.version.clone(),
        configure_flags: settings
            .upstreams
            .get(&settings.target)
            .map(|upstream| upstream.configure_flags.clone())
            .unwrap_or_default()
            .into_iter()
            .chain(toggles.configure_flags())
            .collect(),
    });
    BuildPlan {
        variant: settings.variant,
        link_mode: settings.link_mode.clone(),
        jobs,
        units,
    }
}

/// Run the whole pipeline and return the artifact record.
///
/// # Errors
///
/// Returns the first failure of any stage; nothing is copied to the output
/// directory unless the artifact passed verification.
pub fn run_build(
    context: &PipelineContext<'_>,
    collaborators: Collaborators<'_>,
    stderr: &mut dyn Write,
) -> Result<ArtifactRecord> {
    let settings = context.settings;
    let graph = DependencyBuildGraph::for_variant(settings.variant);
    let target = settings.target_upstream()?;

    context.progress(
        stderr,
        format!(
            "Resolving {} and {} dependencies...",
            settings.target,
            graph.dependencies().len()
        ),
    );
    let releases = resolve_units(settings, collaborators.transport)?;
    for release in &releases {
        context.progress(stderr, format!("  {} {}", release.name, release.version));
    }
    let target_release = releases
        .last()
        .cloned()
        .ok_or_else(|| ForgeError::config("nothing to build"))?;
    expected_digest(&target_release, settings.checksum.as_ref())?;

    let mut prepared = BTreeMap::new();
    for release in releases {
        let pin = (release.name == settings.target)
            .then_some(settings.checksum.as_ref())
            .flatten();
        let source = prepare(context, collaborators.transport, release, pin, stderr)?;
        prepared.insert(source.release.name.clone(), source);
    }

    let builder = BuildExecutor::new(collaborators.executor, context.jobs);
    let search_paths = graph.build_all(context.scratch.path(), |name, paths, prefix| {
        let source = prepared
            .get(name)
            .ok_or_else(|| ForgeError::config(format!("dependency {name} was not fetched")))?;
        let upstream = settings.upstream(name)?;
        context.progress(stderr, format!("Building {name} {}...", source.release.version));
        builder.build(&BuildUnit {
            release: source.release.clone(),
            source_dir: source.source_dir.clone(),
            configure_script: upstream.configure_script.clone(),
            configure_flags: upstream.configure_flags.clone(),
            search_paths: paths.clone(),
            link_mode: LinkMode::ToolchainDefault,
            install: Some(InstallStep {
                prefix: prefix.to_path_buf(),
                target: upstream.install_target.clone(),
            }),
        })
    })?;

    let required = graph.required_features(&settings.upstreams);
    let toggles = settings.toggles.with_appended(&required);
    let target_source = prepared
        .get(&settings.target)
        .ok_or_else(|| {
            ForgeError::config(format!("target {} was not fetched", settings.target))
        })?;
    context.progress(
        stderr,
        format!("Building {} {}...", settings.target, target_release.version),
    );
    builder.build(&target_unit(
        target_source,
        target,
        &toggles.configure_flags(),
        search_paths,
        &settings.link_mode,
    ))?;

    let binary = target_source.source_dir.join(target.binary_name());
    context.progress(stderr, format!("Verifying {}...", target.binary_name()));
    let report = ArtifactVerifier::new(collaborators.executor).verify(
        &binary,
        &Expectations {
            name: target.binary_name().to_owned(),
            version: target_release.version.clone(),
            dependency_features: required.iter().map(|name| (*name).to_owned()).collect(),
            enabled: toggles.effective_set(),
            disabled: toggles.expected_disabled(),
        },
    )?;

    let binary = Utf8PathBuf::try_from(binary).map_err(camino::FromPathBufError::into_io_error)?;
    let published = copy_into(&binary, context.output_dir)?;
    let record = describe_artifact(
        &published,
        ArtifactContext {
            name: target.binary_name(),
            report: &report,
            link: settings.link_mode.to_string(),
            sources: graph
                .dependencies()
                .iter()
                .chain(std::iter::once(&settings.target))
                .filter_map(|name| prepared.get(name))
                .map(PreparedSource::record)
                .collect(),
        },
        collaborators.executor,
    )?;
    context.progress(
        stderr,
        format!(
            "{} {} verified with {} features; written to {}",
            record.name,
            record.version,
            record.features.len(),
            record.path
        ),
    );
    Ok(record)
}

fn prepare(
    context: &PipelineContext<'_>,
    transport: &dyn Transport,
    release: PackageRelease,
    pin: Option<&Sha256Digest>,
    stderr: &mut dyn Write,
) -> Result<PreparedSource> {
    context.progress(stderr, format!("Downloading {}...", release.archive_name));
    let archive = IntegrityVerifier::new(transport).fetch(
        &release,
        pin,
        &context.scratch.downloads(),
        stderr,
    )?;
    let source_dir = unpack_source(&archive.path, &context.scratch.sources())?;
    Ok(PreparedSource {
        release,
        archive,
        source_dir,
    })
}

fn target_unit(
    source: &PreparedSource,
    upstream: &UpstreamSource,
    feature_flags: &[String],
    search_paths: SearchPaths,
    link_mode: &LinkMode,
) -> BuildUnit {
    BuildUnit {
        release: source.release.clone(),
        source_dir: source.source_dir.clone(),
        configure_script: upstream.configure_script.clone(),
        configure_flags: upstream
            .configure_flags
            .iter()
            .chain(feature_flags)
            .cloned()
            .collect(),
        search_paths,
        link_mode: link_mode.clone(),
        install: None,
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
