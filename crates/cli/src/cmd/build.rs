//! Implementation of the default `multibuild` command.
//!
//! Scans the package for `//go:multibuild:` directives, resolves the target
//! list against the installed toolchain, and runs one `go build` per target.

use std::env;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use multibuild_lib::config::scan_files;
use multibuild_lib::consts::{ENV_GOARCH, ENV_GOOS, GO_PROGRAM};
use multibuild_lib::dispatch::{DispatchConfig, DispatchReport, ProcessCompiler, dispatch, plan_tasks, run_passthrough};
use multibuild_lib::invocation::Invocation;
use multibuild_lib::resolve::resolve;
use multibuild_lib::toolchain::Toolchain;

use super::show::{show_configuration, show_targets};
use crate::output::{format_duration, print_error, print_info, print_success, print_warning};

pub struct BuildOptions {
  /// Arguments for `go build`, including `-v` and `-o` when given.
  pub go_args: Vec<String>,
  pub show_configuration: bool,
  pub show_targets: bool,
  pub json: bool,
  pub fail_fast: bool,
}

pub fn cmd_build(options: BuildOptions) -> Result<ExitCode> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(run(options))
}

async fn run(options: BuildOptions) -> Result<ExitCode> {
  let cwd = env::current_dir().context("Failed to get working directory")?;
  let invocation = Invocation::parse(&options.go_args, &cwd).context("Invalid arguments")?;
  debug!(package = %invocation.package, binary = %invocation.binary_name, "parsed invocation");

  let toolchain = Toolchain::default();

  let sources: Vec<PathBuf> = if invocation.files.is_empty() {
    toolchain
      .list_sources(&invocation.package)
      .await
      .context("Failed to discover sources")?
  } else {
    invocation.files.iter().map(PathBuf::from).collect()
  };
  info!(package = %invocation.package, files = sources.len(), "scanning sources");

  let config = scan_files(&sources).context("Failed to scan sources")?;

  let available = toolchain.list_targets().await.context("Failed to list targets")?;
  let targets = resolve(&available, &config).context("Failed to build target list")?;

  if options.show_configuration {
    show_configuration(&config, options.json)?;
    return Ok(ExitCode::SUCCESS);
  }
  if options.show_targets {
    show_targets(&targets, options.json)?;
    return Ok(ExitCode::SUCCESS);
  }

  if is_set(ENV_GOOS) || is_set(ENV_GOARCH) {
    info!("GOOS or GOARCH is set, running a single go build");
    let mut args = vec!["build".to_string()];
    args.extend(options.go_args.iter().cloned());
    let status = run_passthrough(GO_PROGRAM, &args).await?;
    return Ok(exit_code(status));
  }

  let tasks = plan_tasks(&targets, &invocation, &config);
  let dispatch_config = DispatchConfig {
    fail_fast: options.fail_fast,
    ..DispatchConfig::default()
  };

  let started = Instant::now();
  let report = dispatch(tasks, Arc::new(ProcessCompiler::go()), &dispatch_config).await;
  summarize(&report, started.elapsed());

  Ok(if report.is_success() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

fn is_set(var: &str) -> bool {
  env::var_os(var).is_some_and(|v| !v.is_empty())
}

fn exit_code(status: ExitStatus) -> ExitCode {
  status
    .code()
    .and_then(|code| u8::try_from(code).ok())
    .map(ExitCode::from)
    .unwrap_or(ExitCode::FAILURE)
}

fn summarize(report: &DispatchReport, elapsed: Duration) {
  for (target, warning) in report.warnings() {
    print_warning(&format!("{}: {}", target, warning));
  }
  for (target, error) in report.failed() {
    print_error(&format!("{}: {}", target, error));
  }

  let skipped = report.skipped();
  if skipped > 0 {
    print_info(&format!("Skipped {} target(s) after a failure", skipped));
  }

  match &report.first_failure {
    None => print_success(&format!(
      "Built {} target(s) in {}",
      report.built(),
      format_duration(elapsed)
    )),
    Some(first) => print_error(&format!(
      "Build failed for {} ({} of {} target(s) failed)",
      first,
      report.failed().count(),
      report.tasks.len()
    )),
  }
}
