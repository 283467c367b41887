//! Test utilities for multibuild-lib.
//!
//! Cross-platform shell helpers, and in-process [`Compiler`]s that stand in
//! for `go build` so dispatch can be tested without a Go toolchain.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::dispatch::{BuildTask, Compiler, DispatchError};

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// What a [`FakeCompiler`] does once admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
  /// Write a small file at the task's output path.
  WriteBinary,
  /// Succeed without producing anything.
  WriteNothing,
  /// Fail with exit code 1.
  Fail,
}

/// Records how many compiles ran and the peak number running at once.
#[derive(Debug)]
pub struct FakeCompiler {
  behavior: FakeBehavior,
  delay: Duration,
  calls: AtomicUsize,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl FakeCompiler {
  pub fn new(behavior: FakeBehavior) -> Arc<Self> {
    Self::with_delay(behavior, Duration::ZERO)
  }

  pub fn with_delay(behavior: FakeBehavior, delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      behavior,
      delay,
      calls: AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }
}

impl Compiler for FakeCompiler {
  async fn compile(&self, task: &BuildTask) -> Result<(), DispatchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    let result = match self.behavior {
      FakeBehavior::WriteBinary => tokio::fs::write(&task.output, format!("binary for {}", task.target))
        .await
        .map_err(DispatchError::from),
      FakeBehavior::WriteNothing => Ok(()),
      FakeBehavior::Fail => Err(DispatchError::CompilerFailed {
        target: task.target.clone(),
        code: Some(1),
      }),
    };

    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}
