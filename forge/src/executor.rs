//! External command execution.
//!
//! Every toolchain step (configure scripts, `make`, the built artifact's
//! self-report, `file`) is described as an [`Invocation`] and run through a
//! [`CommandExecutor`], so tests can script the toolchain.

use crate::error::Result;
use crate::output::write_stderr_line;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// A command line plus its working directory and extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run, resolved through `PATH` unless it contains a slash.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
    /// Environment variables added on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up an environment variable set on this invocation.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value:?} ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs the invocation to completion and returns its captured output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`Output::status`].
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pinsmith::executor::{CommandExecutor, Invocation, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run(&Invocation::new("make").arg("--version"))?;
    /// assert!(output.status.success());
    /// # Ok::<(), pinsmith::error::ForgeError>(())
    /// ```
    fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Executes commands on the host system, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        log::debug!("running {invocation}");
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        command.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        Ok(command.output()?)
    }
}

/// Wraps another executor and echoes each invocation as `+ <command>`
/// before running it.
pub struct EchoingExecutor<'a> {
    inner: &'a dyn CommandExecutor,
    sink: RefCell<&'a mut dyn Write>,
}

impl<'a> EchoingExecutor<'a> {
    /// Echo to `sink` and delegate to `inner`.
    pub fn new(inner: &'a dyn CommandExecutor, sink: &'a mut dyn Write) -> Self {
        Self {
            inner,
            sink: RefCell::new(sink),
        }
    }
}

impl CommandExecutor for EchoingExecutor<'_> {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        {
            let mut sink = self.sink.borrow_mut();
            write_stderr_line(&mut **sink, format!("+ {invocation}"));
        }
        self.inner.run(invocation)
    }
}
