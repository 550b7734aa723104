//! Shared test utilities for the pinsmith crate.
//!
//! Available to unit tests and, through the `test-support` feature, to
//! integration tests.

use crate::catalog::transport::{FetchError, Transport};
use crate::digest::sha256_bytes;
use crate::error::{ForgeError, Result};
use crate::executor::{CommandExecutor, Invocation};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with the given stdout.
pub fn success_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    sha256_bytes(bytes).to_string()
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// Program name; matches either exactly or as the final path segment.
    pub program: &'static str,
    /// The arguments the program must receive.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `program args...` and answer with `result`.
    pub fn new(program: &'static str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            program,
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
        }
    }

    fn matches(&self, invocation: &Invocation) -> bool {
        let program_matches = invocation.program == self.program
            || Path::new(&invocation.program)
                .file_name()
                .is_some_and(|name| name == self.program);
        program_matches && invocation.args == self.args
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects. An
/// unexpected invocation yields [`ForgeError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    seen: RefCell<Vec<Invocation>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Invocations received so far, in order.
    pub fn seen(&self) -> Vec<Invocation> {
        self.seen.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.seen.borrow_mut().push(invocation.clone());
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(ForgeError::StubMismatch {
                message: format!("unexpected invocation: {invocation}"),
            });
        };
        if !call.matches(invocation) {
            return Err(ForgeError::StubMismatch {
                message: format!(
                    "expected {} {}, got {invocation}",
                    call.program,
                    call.args.join(" ")
                ),
            });
        }
        call.result
    }
}

/// An in-memory upstream serving listings, checksum records, and archives.
#[derive(Debug, Default)]
pub struct StubTransport {
    texts: BTreeMap<String, String>,
    files: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<String>,
    downloaded: RefCell<Vec<String>>,
}

impl StubTransport {
    /// Create a transport that knows no URLs; everything is a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as text at `url`.
    #[must_use]
    pub fn with_text(mut self, url: &str, body: impl Into<String>) -> Self {
        self.texts.insert(url.to_owned(), body.into());
        self
    }

    /// Serve `bytes` as a downloadable file at `url`.
    #[must_use]
    pub fn with_file(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_owned(), bytes);
        self
    }

    /// Fail every request to `url` as a timeout.
    #[must_use]
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(url.to_owned());
        self
    }

    /// URLs of attempted archive downloads, in order.
    pub fn downloads(&self) -> Vec<String> {
        self.downloaded.borrow().clone()
    }

    fn check(&self, url: &str) -> std::result::Result<(), FetchError> {
        if self.failing.contains(url) {
            return Err(FetchError::Http {
                url: url.to_owned(),
                reason: "timed out".to_owned(),
            });
        }
        Ok(())
    }
}

impl Transport for StubTransport {
    fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.check(url)?;
        self.texts.get(url).cloned().ok_or_else(|| FetchError::NotFound {
            url: url.to_owned(),
        })
    }

    fn download(&self, url: &str, dest: &Path) -> std::result::Result<(), FetchError> {
        self.downloaded.borrow_mut().push(url.to_owned());
        self.check(url)?;
        let bytes = self.files.get(url).ok_or_else(|| FetchError::NotFound {
            url: url.to_owned(),
        })?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

/// Directory index of the built-in socat upstream.
pub const SOCAT_BASE: &str = "http://www.dest-unreach.org/socat/download/";

/// Directory index of the built-in ncurses upstream.
const NCURSES_BASE: &str = "https://ftp.gnu.org/gnu/ncurses/";

/// Directory index of the built-in readline upstream.
const READLINE_BASE: &str = "https://ftp.gnu.org/gnu/readline/";

/// Directory index of the built-in openssl upstream.
const OPENSSL_BASE: &str = "https://www.openssl.org/source/";

/// What the checksum sidecar of a served release holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sidecar {
    /// No sidecar; requests for it are a 404.
    Absent,
    /// The digest of the served archive.
    Matching,
    /// Some other digest.
    Digest(String),
}

impl StubTransport {
    /// Serve the release unpacking to `root` (e.g. `socat-1.8.0.0`) from the
    /// directory index at `base`, which also lists the `older` archives.
    #[must_use]
    pub fn with_release(self, base: &str, root: &str, older: &[&str], sidecar: Sidecar) -> Self {
        let archive = format!("{root}.tar.gz");
        let bytes = source_archive(
            root,
            &[("configure", b"#!/bin/sh\nexit 0\n"), ("README", b"readme")],
        );
        let digest = sha256_hex(&bytes);
        let mut entries: Vec<&str> = older.to_vec();
        entries.push(&archive);
        let transport = self
            .with_text(base, directory_index(&entries))
            .with_file(&format!("{base}{archive}"), bytes);
        let published = match sidecar {
            Sidecar::Absent => return transport,
            Sidecar::Matching => digest,
            Sidecar::Digest(other) => other,
        };
        transport.with_text(
            &format!("{base}{archive}.sha256"),
            format!("{published}  {archive}\n"),
        )
    }

    /// Serve one release of each full-variant dependency. Only openssl
    /// publishes checksums, like the real upstreams.
    #[must_use]
    pub fn with_full_variant_dependencies(self) -> Self {
        self.with_release(NCURSES_BASE, "ncurses-6.4", &["ncurses-6.3.tar.gz"], Sidecar::Absent)
            .with_release(READLINE_BASE, "readline-8.2", &[], Sidecar::Absent)
            .with_release(
                OPENSSL_BASE,
                "openssl-3.0.13",
                &["openssl-1.1.1w.tar.gz"],
                Sidecar::Matching,
            )
    }
}

/// Render a minimal HTML directory index linking to `entries`.
pub fn directory_index(entries: &[&str]) -> String {
    let links: String = entries
        .iter()
        .map(|entry| format!("<a href=\"{entry}\">{entry}</a>\n"))
        .collect();
    format!("<html><body>\n<a href=\"../\">Parent Directory</a>\n{links}</body></html>\n")
}

/// Build an in-memory `.tar.gz` whose entries live under `root/`.
///
/// # Panics
///
/// Panics if the archive cannot be assembled.
pub fn source_archive(root: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(u64::try_from(contents.len()).unwrap_or(u64::MAX));
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{name}"), *contents)
            .unwrap_or_else(|err| panic!("append {name}: {err}"));
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .unwrap_or_else(|err| panic!("finish archive: {err}"))
}

/// A scripted toolchain that answers configure, make, the artifact's
/// self-report, and `file -b` like a real autotools build would.
///
/// Configure flags are remembered for the target; the target's `make`
/// writes a placeholder binary; `-V` reports `#define` markers for enabled
/// features and `#undef` for every other catalog feature. Dependency
/// installs create `include` and `lib` under their `--prefix`.
#[derive(Debug)]
pub struct FakeToolchain {
    target: String,
    reported_version: Option<String>,
    failing_step: Option<(String, &'static str)>,
    suppressed: BTreeSet<String>,
    enabled: RefCell<BTreeSet<String>>,
    built_version: RefCell<String>,
    prefixes: RefCell<BTreeMap<String, String>>,
    invocations: RefCell<Vec<Invocation>>,
}

impl FakeToolchain {
    /// A toolchain building `target` (for example `socat`).
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_owned(),
            reported_version: None,
            failing_step: None,
            suppressed: BTreeSet::new(),
            enabled: RefCell::new(BTreeSet::new()),
            built_version: RefCell::new(String::new()),
            prefixes: RefCell::new(BTreeMap::new()),
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Make the artifact report `version` instead of its source version.
    #[must_use]
    pub fn reporting_version(mut self, version: &str) -> Self {
        self.reported_version = Some(version.to_owned());
        self
    }

    /// Make `step` (`configure`, `make`, or `install`) fail for `unit`.
    #[must_use]
    pub fn failing(mut self, unit: &str, step: &'static str) -> Self {
        self.failing_step = Some((unit.to_owned(), step));
        self
    }

    /// Drop `feature` from the artifact even when it is enabled.
    #[must_use]
    pub fn suppressing(mut self, feature: &str) -> Self {
        self.suppressed.insert(feature.to_owned());
        self
    }

    /// Every invocation received, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Names of the units that were configured, in order.
    pub fn configured_units(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .filter(|invocation| step_of(invocation) == "configure")
            .filter_map(|invocation| unit_and_version(invocation).map(|(unit, _)| unit))
            .collect()
    }

    fn self_report(&self, args: &[String]) -> String {
        let enabled = self.enabled.borrow();
        let target = &self.target;
        if args.iter().any(|arg| arg == "-h") {
            if !enabled.contains("help") {
                return String::new();
            }
            return format!(
                "{target} by Gerhard Rieger and contributors\nUsage:\n{target} [options] <bi-address> <bi-address>\n"
            );
        }
        let version = self
            .reported_version
            .clone()
            .unwrap_or_else(|| self.built_version.borrow().clone());
        let mut lines = vec![
            format!("{target} by Gerhard Rieger and contributors - see www.dest-unreach.org"),
            format!("{target} version {version} on Jan  1 2026 00:00:00"),
            "   running on Linux version #1 SMP, release 6.1.0, machine x86_64".to_owned(),
            "features:".to_owned(),
        ];
        for feature in crate::features::FEATURE_CATALOG {
            let marker = crate::features::marker_for(feature);
            if enabled.contains(feature) {
                lines.push(format!("  #define {marker} 1"));
            } else {
                lines.push(format!("  #undef {marker}"));
            }
        }
        lines.push("  #define WITH_MSGLEVEL 0 /* debug */".to_owned());
        lines.join("\n") + "\n"
    }

    fn record_configure(&self, unit: &str, version: &str, args: &[String]) {
        if let Some(prefix) = args.iter().find_map(|arg| arg.strip_prefix("--prefix=")) {
            self.prefixes
                .borrow_mut()
                .insert(unit.to_owned(), prefix.to_owned());
        }
        if unit != self.target {
            return;
        }
        let mut enabled = self.enabled.borrow_mut();
        enabled.clear();
        for arg in args {
            if let Some(name) = arg.strip_prefix("--enable-") {
                enabled.insert(name.to_owned());
            } else if let Some(name) = arg.strip_prefix("--disable-") {
                enabled.remove(name);
            }
        }
        for name in &self.suppressed {
            enabled.remove(name);
        }
        self.built_version.replace(version.to_owned());
    }
}

/// Split a source directory name such as `socat-1.8.0.0` into unit and
/// version at the first hyphen followed by a digit.
fn unit_and_version(invocation: &Invocation) -> Option<(String, String)> {
    let dir = invocation.cwd.as_deref()?.file_name()?.to_string_lossy();
    let split = dir
        .char_indices()
        .zip(dir.chars().skip(1))
        .find(|((_, c), next)| *c == '-' && next.is_ascii_digit())
        .map(|((idx, _), _)| idx)?;
    let (unit, version) = dir.split_at(split);
    Some((unit.to_owned(), version.trim_start_matches('-').to_owned()))
}

fn step_of(invocation: &Invocation) -> &'static str {
    match (invocation.program.as_str(), invocation.args.first()) {
        ("make", Some(arg)) if !arg.starts_with("-j") => "install",
        ("make", _) => "make",
        _ => "configure",
    }
}

impl CommandExecutor for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.invocations.borrow_mut().push(invocation.clone());
        if invocation.program == "file" {
            return Ok(success_output(
                "ELF 64-bit LSB executable, x86-64, statically linked, stripped\n",
            ));
        }
        let is_artifact = invocation.cwd.is_none()
            && Path::new(&invocation.program)
                .file_name()
                .is_some_and(|name| name.to_string_lossy() == self.target);
        if is_artifact {
            if !Path::new(&invocation.program).exists() {
                return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
            }
            return Ok(success_output(&self.self_report(&invocation.args)));
        }

        let Some((unit, version)) = unit_and_version(invocation) else {
            return Err(ForgeError::StubMismatch {
                message: format!("unexpected invocation: {invocation}"),
            });
        };
        let step = step_of(invocation);
        if self
            .failing_step
            .as_ref()
            .is_some_and(|(name, failing)| *name == unit && *failing == step)
        {
            return Ok(failure_output(&format!(
                "{step}: error: simulated failure in {unit}"
            )));
        }

        match step {
            "configure" => self.record_configure(&unit, &version, &invocation.args),
            "make" if unit == self.target => {
                if let Some(dir) = &invocation.cwd {
                    std::fs::write(dir.join(&self.target), b"\x7fELF fake binary")?;
                }
            }
            "install" => {
                if let Some(prefix) = self.prefixes.borrow().get(&unit) {
                    std::fs::create_dir_all(Path::new(prefix).join("include"))?;
                    std::fs::create_dir_all(Path::new(prefix).join("lib"))?;
                }
            }
            _ => {}
        }
        Ok(success_output(""))
    }
}
