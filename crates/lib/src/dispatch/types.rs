//! Types for build dispatch.
//!
//! This module defines the per-target task, the dispatcher configuration, and
//! the error and report types returned after every task has finished.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveFormat};
use crate::consts::DEFAULT_PARALLELISM;
use crate::filter::Target;

/// Errors that fail a single target's build.
#[derive(Debug, Error)]
pub enum DispatchError {
  /// The compiler could not be started.
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The compiler ran and exited unsuccessfully.
  #[error("compiler {}", describe_exit(.code))]
  CompilerFailed { target: Target, code: Option<i32> },

  /// Preparing the output location failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The task panicked or was cancelled before reporting.
  #[error("build task panicked or was cancelled")]
  TaskAborted,
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exited with code {code}"),
    None => "was terminated by a signal".to_string(),
  }
}

/// Everything needed to build and package one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
  pub target: Target,
  /// The package being built, logged when the compile starts.
  pub package: String,
  /// Where the compiler writes the binary.
  pub output: PathBuf,
  /// Full compiler argument list, output path included.
  pub args: Vec<String>,
  /// Archives to write after a successful compile.
  pub archives: Vec<(ArchiveFormat, PathBuf)>,
  /// Whether the binary survives once archives are written.
  pub keep_raw: bool,
}

impl BuildTask {
  /// Name of the binary inside archives: the output's file name.
  pub fn entry_name(&self) -> String {
    self
      .output
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.output.display().to_string())
  }
}

/// Configuration for a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// Maximum number of compiler invocations in flight.
  pub parallelism: usize,

  /// Skip compiles that have not started once any target has failed.
  /// Compiles already running always finish.
  pub fail_fast: bool,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      parallelism: DEFAULT_PARALLELISM,
      fail_fast: false,
    }
  }
}

/// A problem after a successful compile. Reported, never fatal.
#[derive(Debug)]
pub enum TaskWarning {
  Archive { path: PathBuf, error: ArchiveError },
  Cleanup { path: PathBuf, error: std::io::Error },
}

impl fmt::Display for TaskWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Archive { path, error } => write!(f, "failed to write {}: {}", path.display(), error),
      Self::Cleanup { path, error } => write!(f, "failed to remove {}: {}", path.display(), error),
    }
  }
}

/// How one target ended.
#[derive(Debug)]
pub enum TaskOutcome {
  Built {
    /// The binary, if it was kept.
    binary: Option<PathBuf>,
    /// Archives that were written.
    archives: Vec<PathBuf>,
    warnings: Vec<TaskWarning>,
  },
  Failed(DispatchError),
  /// Not compiled because another target had already failed.
  Skipped,
}

#[derive(Debug)]
pub struct TaskReport {
  pub target: Target,
  pub outcome: TaskOutcome,
}

/// Result of a dispatch run, once every task has finished.
#[derive(Debug, Default)]
pub struct DispatchReport {
  /// One entry per task, in the order the tasks were given.
  pub tasks: Vec<TaskReport>,
  /// The first failure observed, by completion time.
  pub first_failure: Option<Target>,
}

impl DispatchReport {
  pub fn is_success(&self) -> bool {
    self.first_failure.is_none()
  }

  pub fn built(&self) -> usize {
    self
      .tasks
      .iter()
      .filter(|t| matches!(t.outcome, TaskOutcome::Built { .. }))
      .count()
  }

  pub fn failed(&self) -> impl Iterator<Item = (&Target, &DispatchError)> {
    self.tasks.iter().filter_map(|t| match &t.outcome {
      TaskOutcome::Failed(e) => Some((&t.target, e)),
      _ => None,
    })
  }

  pub fn skipped(&self) -> usize {
    self
      .tasks
      .iter()
      .filter(|t| matches!(t.outcome, TaskOutcome::Skipped))
      .count()
  }

  pub fn warnings(&self) -> impl Iterator<Item = (&Target, &TaskWarning)> {
    self.tasks.iter().flat_map(|t| {
      let warnings: &[TaskWarning] = match &t.outcome {
        TaskOutcome::Built { warnings, .. } => warnings,
        _ => &[],
      };
      warnings.iter().map(move |w| (&t.target, w))
    })
  }
}
