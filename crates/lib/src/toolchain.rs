//! Queries against the Go toolchain.
//!
//! Two questions are delegated to `go` itself: which files make up a package
//! (honouring build constraints), and which `GOOS/GOARCH` pairs this
//! installation can target.

use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::consts::GO_PROGRAM;
use crate::filter::{InvalidTarget, Target};

#[derive(Debug, Error)]
pub enum ToolchainError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{command} failed with exit code {code:?}")]
  Failed { command: String, code: Option<i32> },

  #[error("unmarshal: {0}")]
  Decode(#[from] serde_json::Error),

  #[error(transparent)]
  InvalidTarget(#[from] InvalidTarget),
}

#[derive(Debug, Deserialize)]
struct PackageListing {
  #[serde(rename = "Dir")]
  dir: PathBuf,
  #[serde(rename = "CompiledGoFiles", default)]
  compiled_go_files: Vec<PathBuf>,
}

/// Handle on a Go toolchain driver.
#[derive(Debug, Clone)]
pub struct Toolchain {
  program: String,
}

impl Default for Toolchain {
  fn default() -> Self {
    Self::new(GO_PROGRAM)
  }
}

impl Toolchain {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Run the driver with `args` and return its stdout. Stderr passes through.
  async fn output(&self, args: &[&str]) -> Result<Vec<u8>, ToolchainError> {
    debug!(program = %self.program, ?args, "querying toolchain");

    let output = Command::new(&self.program)
      .args(args)
      .stdin(Stdio::null())
      .stderr(Stdio::inherit())
      .output()
      .await
      .map_err(|source| ToolchainError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if !output.status.success() {
      return Err(ToolchainError::Failed {
        command: format!("{} {}", self.program, args.join(" ")),
        code: output.status.code(),
      });
    }

    Ok(output.stdout)
  }

  /// Every target this toolchain supports, in the toolchain's order.
  pub async fn list_targets(&self) -> Result<Vec<Target>, ToolchainError> {
    let stdout = self.output(&["tool", "dist", "list"]).await?;
    parse_target_list(&String::from_utf8_lossy(&stdout))
  }

  /// The compiled Go files of `package`, after build constraints.
  pub async fn list_sources(&self, package: &str) -> Result<Vec<PathBuf>, ToolchainError> {
    let stdout = self
      .output(&["list", "-compiled", "-json=Dir,CompiledGoFiles", package])
      .await?;
    parse_package_listing(&stdout)
  }
}

fn parse_target_list(text: &str) -> Result<Vec<Target>, ToolchainError> {
  text
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| line.parse::<Target>().map_err(ToolchainError::from))
    .collect()
}

fn parse_package_listing(json: &[u8]) -> Result<Vec<PathBuf>, ToolchainError> {
  let listing: PackageListing = serde_json::from_slice(json)?;
  Ok(
    listing
      .compiled_go_files
      .into_iter()
      .map(|file| listing.dir.join(file))
      .collect(),
  )
}
