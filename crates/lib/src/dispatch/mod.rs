//! Build dispatch.
//!
//! Fans a build out across targets. Each target gets its own tokio task; a
//! shared semaphore bounds how many compilers run at once. After a successful
//! compile the task writes any requested archives next to the binary.
//!
//! A failing target never interrupts the others. The dispatcher joins every
//! task and reports the first failure once all of them have finished.

mod compiler;
mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::archive::{ArchiveError, archive_path, write_archive};
use crate::config::Config;
use crate::consts::{EXE_SUFFIX, EXE_SUFFIX_OS};
use crate::filter::Target;
use crate::invocation::Invocation;

pub use compiler::{Compiler, OutputSink, ProcessCompiler, StdStreams, child_env, run_passthrough};
pub use types::{BuildTask, DispatchConfig, DispatchError, DispatchReport, TaskOutcome, TaskReport, TaskWarning};

/// Where the binary for `target` goes.
pub fn output_path(config: &Config, binary_name: &str, target: &Target) -> PathBuf {
  let mut rendered = config.output.render(binary_name, target);
  if target.os() == EXE_SUFFIX_OS {
    rendered.push_str(EXE_SUFFIX);
  }
  PathBuf::from(rendered)
}

/// One [`BuildTask`] per target, in target order.
pub fn plan_tasks(targets: &[Target], invocation: &Invocation, config: &Config) -> Vec<BuildTask> {
  let formats = config.archive_formats();

  targets
    .iter()
    .map(|target| {
      let output = output_path(config, &invocation.binary_name, target);
      let archives = formats
        .iter()
        .filter_map(|format| archive_path(&output, *format).map(|path| (*format, path)))
        .collect();

      BuildTask {
        target: target.clone(),
        package: invocation.package.clone(),
        args: invocation.build_args(&output),
        output,
        archives,
        keep_raw: config.keeps_raw(),
      }
    })
    .collect()
}

/// Build every task and wait for all of them.
pub async fn dispatch<C: Compiler>(tasks: Vec<BuildTask>, compiler: Arc<C>, config: &DispatchConfig) -> DispatchReport {
  info!(tasks = tasks.len(), parallelism = config.parallelism, "starting dispatch");

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let failed = Arc::new(AtomicBool::new(false));
  let targets: Vec<Target> = tasks.iter().map(|t| t.target.clone()).collect();

  let mut join_set = JoinSet::new();
  for (index, task) in tasks.into_iter().enumerate() {
    let compiler = compiler.clone();
    let semaphore = semaphore.clone();
    let failed = failed.clone();
    let fail_fast = config.fail_fast;

    join_set.spawn(
      async move {
        let outcome = run_task(task, compiler.as_ref(), semaphore, &failed, fail_fast).await;
        (index, outcome)
      }
      .in_current_span(),
    );
  }

  let mut outcomes: Vec<Option<TaskOutcome>> = targets.iter().map(|_| None).collect();
  let mut report = DispatchReport::default();

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, outcome)) => {
        if let TaskOutcome::Failed(e) = &outcome {
          error!(platform = %targets[index], error = %e, "build failed");
          report.first_failure.get_or_insert_with(|| targets[index].clone());
        }
        outcomes[index] = Some(outcome);
      }
      Err(e) => {
        error!(error = %e, "build task panicked");
      }
    }
  }

  for (target, outcome) in targets.into_iter().zip(outcomes) {
    let outcome = outcome.unwrap_or_else(|| {
      report.first_failure.get_or_insert_with(|| target.clone());
      TaskOutcome::Failed(DispatchError::TaskAborted)
    });
    report.tasks.push(TaskReport { target, outcome });
  }

  info!(
    built = report.built(),
    skipped = report.skipped(),
    success = report.is_success(),
    "dispatch complete"
  );

  report
}

async fn run_task<C: Compiler>(
  task: BuildTask,
  compiler: &C,
  semaphore: Arc<Semaphore>,
  failed: &AtomicBool,
  fail_fast: bool,
) -> TaskOutcome {
  debug!(platform = %task.target, "waiting");

  if let Err(e) = create_output_dir(&task).await {
    failed.store(true, Ordering::SeqCst);
    return TaskOutcome::Failed(e);
  }

  let Ok(permit) = semaphore.acquire_owned().await else {
    return TaskOutcome::Failed(DispatchError::TaskAborted);
  };

  if fail_fast && failed.load(Ordering::SeqCst) {
    warn!(platform = %task.target, "skipping build after earlier failure");
    return TaskOutcome::Skipped;
  }

  info!(platform = %task.target, package = %task.package, output = %task.output.display(), "building");

  let compiled = compiler.compile(&task).await;
  // Record the failure before releasing the slot so the next admitted task sees it.
  if compiled.is_err() {
    failed.store(true, Ordering::SeqCst);
  }
  drop(permit);

  if let Err(e) = compiled {
    return TaskOutcome::Failed(e);
  }

  let outcome = package(&task).await;
  info!(platform = %task.target, "done");
  outcome
}

async fn create_output_dir(task: &BuildTask) -> Result<(), DispatchError> {
  if let Some(parent) = task.output.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent).await?;
  }
  Ok(())
}

/// Write archives for a compiled task, then drop the binary if unwanted.
///
/// The binary is kept whenever an archive could not be written, so a failed
/// archive never leaves the target without any build output.
async fn package(task: &BuildTask) -> TaskOutcome {
  let mut archives = Vec::new();
  let mut warnings = Vec::new();
  let entry_name = task.entry_name();

  for (format, path) in &task.archives {
    let (format, binary, dest, entry) = (*format, task.output.clone(), path.clone(), entry_name.clone());
    let written = tokio::task::spawn_blocking(move || write_archive(format, &binary, &dest, &entry))
      .await
      .unwrap_or_else(|e| Err(ArchiveError::Io(std::io::Error::other(e.to_string()))));

    match written {
      Ok(()) => archives.push(path.clone()),
      Err(error) => {
        warn!(platform = %task.target, path = %path.display(), error = %error, "failed to write archive");
        warnings.push(TaskWarning::Archive {
          path: path.clone(),
          error,
        });
      }
    }
  }

  let archive_failed = warnings.iter().any(|w| matches!(w, TaskWarning::Archive { .. }));
  let binary = if task.keep_raw || archive_failed {
    Some(task.output.clone())
  } else {
    if let Err(error) = tokio::fs::remove_file(&task.output).await {
      warn!(platform = %task.target, path = %task.output.display(), error = %error, "failed to remove binary");
      warnings.push(TaskWarning::Cleanup {
        path: task.output.clone(),
        error,
      });
    }
    None
  };

  TaskOutcome::Built {
    binary,
    archives,
    warnings,
  }
}
