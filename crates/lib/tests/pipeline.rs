//! Scan, resolve and plan working together on real source files.

use std::fs;
use std::path::{Path, PathBuf};

use multibuild_lib::archive::ArchiveFormat;
use multibuild_lib::config::{ScanError, scan_files};
use multibuild_lib::dispatch::plan_tasks;
use multibuild_lib::filter::Target;
use multibuild_lib::invocation::Invocation;
use multibuild_lib::resolve::{ResolveError, resolve};
use tempfile::TempDir;

fn universe() -> Vec<Target> {
  [
    "android/arm64",
    "darwin/amd64",
    "darwin/arm64",
    "ios/arm64",
    "linux/386",
    "linux/amd64",
    "linux/arm64",
    "windows/amd64",
    "windows/arm64",
  ]
  .iter()
  .map(|s| s.parse().unwrap())
  .collect()
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, text).unwrap();
  path
}

#[test]
fn directives_across_files_drive_the_plan() {
  let dir = TempDir::new().unwrap();
  let main = write(
    dir.path(),
    "main.go",
    "package main\n\n//go:multibuild:include=linux/*,darwin/arm64\n//go:multibuild:output=dist/${TARGET}_${GOOS}_${GOARCH}\n",
  );
  let extra = write(
    dir.path(),
    "extra.go",
    "package main\n\n  //go:multibuild:exclude=linux/386\n//go:multibuild:format=raw,zip\n",
  );

  let config = scan_files(&[main, extra]).unwrap();
  let targets = resolve(&universe(), &config).unwrap();
  let names: Vec<String> = targets.iter().map(ToString::to_string).collect();
  assert_eq!(names, vec!["darwin/arm64", "linux/amd64", "linux/arm64"]);

  let invocation = Invocation::parse(&["-trimpath", "./cmd/server"], Path::new("/src")).unwrap();
  let tasks = plan_tasks(&targets, &invocation, &config);

  assert_eq!(tasks.len(), 3);
  assert_eq!(tasks[0].output, PathBuf::from("dist/server_darwin_arm64"));
  assert_eq!(
    tasks[0].args,
    vec!["-trimpath", "-o", "dist/server_darwin_arm64", "./cmd/server"]
  );
  assert!(tasks.iter().all(|t| t.keep_raw));
  assert!(
    tasks
      .iter()
      .all(|t| t.archives.len() == 1 && t.archives[0].0 == ArchiveFormat::Zip)
  );
}

#[test]
fn second_output_directive_is_rejected() {
  let dir = TempDir::new().unwrap();
  let a = write(dir.path(), "a.go", "//go:multibuild:output=${TARGET}-${GOOS}-${GOARCH}\n");
  let b = write(dir.path(), "b.go", "\n\n//go:multibuild:output=bin/${TARGET}-${GOOS}-${GOARCH}\n");

  let err = scan_files(&[a, b]).unwrap_err();
  assert!(matches!(err, ScanError::DuplicateOutput { .. }));
  assert!(err.to_string().contains("b.go:3"), "{err}");
}

#[test]
fn cgo_only_platforms_cannot_be_included() {
  let dir = TempDir::new().unwrap();
  let main = write(dir.path(), "main.go", "//go:multibuild:include=ios/arm64\n");

  let config = scan_files(&[main]).unwrap();
  let err = resolve(&universe(), &config).unwrap_err();
  assert_eq!(err, ResolveError::UnsatisfiableInclude("ios/arm64".parse().unwrap()));
}

#[test]
fn missing_source_is_an_io_error() {
  let dir = TempDir::new().unwrap();
  let err = scan_files(&[dir.path().join("absent.go")]).unwrap_err();
  assert!(matches!(err, ScanError::Io { .. }));
}
