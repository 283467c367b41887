//! Compiler invocation.
//!
//! [`Compiler`] is the seam between the dispatcher and whatever actually
//! produces a binary. [`ProcessCompiler`] runs `go build` as a child process
//! and forwards its output line by line, each line prefixed with the target.

use std::future::Future;
use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::consts::{ENV_CGO_ENABLED, ENV_GOARCH, ENV_GOOS, GO_PROGRAM};
use crate::filter::Target;

use super::types::{BuildTask, DispatchError};

/// Produces the binary for one [`BuildTask`].
pub trait Compiler: Send + Sync + 'static {
  fn compile(&self, task: &BuildTask) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Receives forwarded child output, one line at a time.
pub trait OutputSink: Send + Sync {
  fn stdout_line(&self, line: &str);
  fn stderr_line(&self, line: &str);
}

/// Writes forwarded lines to this process's stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdStreams;

impl OutputSink for StdStreams {
  fn stdout_line(&self, line: &str) {
    let _ = writeln!(std::io::stdout().lock(), "{line}");
  }

  fn stderr_line(&self, line: &str) {
    let _ = writeln!(std::io::stderr().lock(), "{line}");
  }
}

/// Environment overrides for a child building `target`.
///
/// `CGO_ENABLED=0` is forced unless the caller already set `CGO_ENABLED`
/// (`inherit_cgo`), in which case the child sees the caller's value.
pub fn child_env(target: &Target, inherit_cgo: bool) -> Vec<(&'static str, String)> {
  let mut env = vec![
    (ENV_GOOS, target.os().to_string()),
    (ENV_GOARCH, target.arch().to_string()),
  ];
  if !inherit_cgo {
    env.push((ENV_CGO_ENABLED, "0".to_string()));
  }
  env
}

/// Runs a compiler as a child process per task.
#[derive(Clone)]
pub struct ProcessCompiler {
  program: String,
  leading_args: Vec<String>,
  inherit_cgo: bool,
  sink: Arc<dyn OutputSink>,
}

impl std::fmt::Debug for ProcessCompiler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProcessCompiler")
      .field("program", &self.program)
      .field("leading_args", &self.leading_args)
      .field("inherit_cgo", &self.inherit_cgo)
      .finish_non_exhaustive()
  }
}

impl ProcessCompiler {
  /// `program` is run as `program <leading_args..> <task args..>`.
  pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      leading_args,
      inherit_cgo: std::env::var_os(ENV_CGO_ENABLED).is_some(),
      sink: Arc::new(StdStreams),
    }
  }

  /// `go build`, honouring the caller's `CGO_ENABLED`.
  pub fn go() -> Self {
    Self::new(GO_PROGRAM, vec!["build".to_string()])
  }

  pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn with_inherited_cgo(mut self, inherit_cgo: bool) -> Self {
    self.inherit_cgo = inherit_cgo;
    self
  }
}

impl Compiler for ProcessCompiler {
  async fn compile(&self, task: &BuildTask) -> Result<(), DispatchError> {
    debug!(program = %self.program, args = ?task.args, platform = %task.target, "spawning compiler");

    let mut child = Command::new(&self.program)
      .args(&self.leading_args)
      .args(&task.args)
      .envs(child_env(&task.target, self.inherit_cgo))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| DispatchError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    let prefix = format!("{}: ", task.target);
    let sink = &self.sink;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, (), ()) = tokio::join!(
      child.wait(),
      forward_lines(stdout, |line| sink.stdout_line(&format!("{prefix}{line}"))),
      forward_lines(stderr, |line| sink.stderr_line(&format!("{prefix}{line}"))),
    );
    let status = status?;

    if !status.success() {
      return Err(DispatchError::CompilerFailed {
        target: task.target.clone(),
        code: status.code(),
      });
    }
    Ok(())
  }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, mut emit: impl FnMut(&str)) {
  let Some(reader) = reader else {
    return;
  };
  // Bytes, not `lines()`: a non-UTF-8 line must not stop the drain.
  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();
  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) | Err(_) => break,
      Ok(_) => emit(String::from_utf8_lossy(&buf).trim_end_matches(['\n', '\r'])),
    }
  }
}

/// Run `program args..` once with inherited stdio and environment.
///
/// Used when the caller pinned `GOOS` or `GOARCH` and wants a plain build.
pub async fn run_passthrough(program: &str, args: &[String]) -> Result<ExitStatus, DispatchError> {
  debug!(program, ?args, "running single build");

  let mut child = Command::new(program)
    .args(args)
    .spawn()
    .map_err(|source| DispatchError::Spawn {
      program: program.to_string(),
      source,
    })?;

  Ok(child.wait().await?)
}
