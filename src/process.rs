//! External process execution.
//!
//! Stages describe what to run as [`ToolInvocation`] values and hand them to
//! an [`Execute`] implementation. [`ProcessRunner`] is the real one: it echoes
//! every command to stdout, then spawns it with inherited stdio and waits.
//! In dry-run it echoes the same resolved command and returns success without
//! spawning.
//!
//! Incidental file-system housekeeping is expressed as [`BestEffort`]
//! operations. `Execute::best_effort` returns nothing, so a failure there can
//! never reach the fatal error path.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Variables set for this child only.
    pub env: Vec<(String, String)>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as it is echoed: env assignments, program, arguments.
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        parts.push(self.program.display().to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Incidental clean-up and relocation whose failure is never escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    /// Remove every entry of `dir` whose name starts with `prefix`.
    RemoveMatching { dir: PathBuf, prefix: String },
    /// Remove a whole directory tree.
    RemoveTree { path: PathBuf },
    /// Copy every file of `from` whose name starts with `prefix` into `to`.
    CopyMatching {
        from: PathBuf,
        prefix: String,
        to: PathBuf,
    },
}

impl fmt::Display for BestEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BestEffort::RemoveMatching { dir, prefix } => {
                write!(f, "rm {}*", dir.join(prefix).display())
            }
            BestEffort::RemoveTree { path } => write!(f, "rm -rf {}", path.display()),
            BestEffort::CopyMatching { from, prefix, to } => {
                write!(f, "cp {}* {}", from.join(prefix).display(), to.display())
            }
        }
    }
}

impl BestEffort {
    /// Perform the operation, reporting the first error encountered.
    pub fn perform(&self) -> std::io::Result<()> {
        match self {
            BestEffort::RemoveMatching { dir, prefix } => {
                for path in matching_entries(dir, prefix) {
                    if path.is_dir() {
                        fs::remove_dir_all(&path)?;
                    } else {
                        fs::remove_file(&path)?;
                    }
                }
                Ok(())
            }
            BestEffort::RemoveTree { path } => fs::remove_dir_all(path),
            BestEffort::CopyMatching { from, prefix, to } => {
                if !from.is_dir() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} does not exist", from.display()),
                    ));
                }
                fs::create_dir_all(to)?;
                for path in matching_entries(from, prefix) {
                    if let Some(name) = path.file_name() {
                        fs::copy(&path, to.join(name))?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Direct children of `dir` whose file name starts with `prefix`.
fn matching_entries(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.into_path())
        .collect()
}

/// Runs invocations on behalf of the stages.
pub trait Execute {
    /// Run one invocation to completion and return its exit code.
    fn execute(&mut self, invocation: &ToolInvocation) -> Result<i32>;

    /// Attempt an incidental operation; failures are logged and dropped.
    fn best_effort(&mut self, op: &BestEffort);

    fn is_dry_run(&self) -> bool;
}

/// Spawns real processes, or only previews them in dry-run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    dry_run: bool,
}

impl ProcessRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    fn echo_prefix(&self) -> &'static str {
        if self.dry_run {
            "[dry-run] "
        } else {
            ""
        }
    }
}

impl Execute for ProcessRunner {
    fn execute(&mut self, invocation: &ToolInvocation) -> Result<i32> {
        let working_dir = std::path::absolute(&invocation.working_dir).map_err(|e| {
            BuildError::io(
                format!(
                    "resolving working directory '{}'",
                    invocation.working_dir.display()
                ),
                e,
            )
        })?;

        println!(
            "{}Executing in {}: {}",
            self.echo_prefix(),
            working_dir.display(),
            invocation.command_line()
        );

        if self.dry_run {
            return Ok(0);
        }

        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| BuildError::Spawn {
                program: invocation.program.display().to_string(),
                source,
            })?;

        // Killed by a signal: no code, report as a generic failure.
        Ok(status.code().unwrap_or(-1))
    }

    fn best_effort(&mut self, op: &BestEffort) {
        println!("{}Executing: {}", self.echo_prefix(), op);
        if self.dry_run {
            return;
        }
        if let Err(e) = op.perform() {
            tracing::debug!("ignored failure of '{}': {}", op, e);
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
