//! CLI smoke tests for multibuild.
//!
//! The end-to-end tests put a stub `go` script first on PATH, so they run
//! without a Go toolchain. The stub answers `go list` and `go tool dist list`,
//! and its `go build` writes the target name to the `-o` path.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the multibuild binary.
fn multibuild_cmd() -> Command {
  cargo_bin_cmd!("multibuild")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  multibuild_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"))
    .stdout(predicate::str::contains("--multibuild-targets"));
}

#[test]
fn version_flag_works() {
  multibuild_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// Argument errors
// =============================================================================

#[test]
fn unknown_multibuild_flag_fails() {
  multibuild_cmd()
    .arg("--multibuild-bogus")
    .assert()
    .failure()
    .stderr(predicate::str::contains("multibuild-bogus"));
}

#[test]
fn multiple_packages_fail() {
  multibuild_cmd()
    .args(["./a", "./b"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("cannot build multiple packages"));
}

#[test]
fn json_without_introspection_fails() {
  multibuild_cmd().arg("--json").assert().failure();
}

// =============================================================================
// End to end, against a stub toolchain
// =============================================================================

#[cfg(unix)]
const STUB_GO: &str = r#"#!/bin/sh
case "$1" in
  list)
    printf '{"Dir":"%s","CompiledGoFiles":["main.go"]}\n' "$(pwd -P)"
    ;;
  tool)
    printf 'android/arm64\nlinux/amd64\nwindows/amd64\n'
    ;;
  build)
    shift
    out=passthrough.out
    while [ $# -gt 0 ]; do
      if [ "$1" = "-o" ]; then out="$2"; fi
      shift
    done
    if [ -n "$FAIL_GOOS" ] && [ "$GOOS" = "$FAIL_GOOS" ]; then
      echo "boom" >&2
      exit 2
    fi
    echo "built"
    printf '%s/%s cgo=%s\n' "$GOOS" "$GOARCH" "$CGO_ENABLED" > "$out"
    ;;
esac
"#;

/// A package directory named `app` plus a directory holding the stub `go`.
#[cfg(unix)]
struct Fixture {
  _temp: TempDir,
  project: PathBuf,
  path: std::ffi::OsString,
}

#[cfg(unix)]
impl Fixture {
  fn new(directives: &str) -> Self {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    let project = temp.path().join("app");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::create_dir_all(&project).unwrap();

    let go = bin.join("go");
    std::fs::write(&go, STUB_GO).unwrap();
    std::fs::set_permissions(&go, std::fs::Permissions::from_mode(0o755)).unwrap();

    std::fs::write(project.join("main.go"), format!("package main\n\n{}\nfunc main() {{}}\n", directives)).unwrap();

    let mut paths = vec![bin];
    paths.extend(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default()));
    let path = std::env::join_paths(paths).unwrap();

    Self {
      _temp: temp,
      project,
      path,
    }
  }

  fn cmd(&self) -> Command {
    let mut cmd = multibuild_cmd();
    cmd
      .current_dir(&self.project)
      .env("PATH", &self.path)
      .env_remove("GOOS")
      .env_remove("GOARCH")
      .env_remove("CGO_ENABLED")
      .env_remove("RUST_LOG");
    cmd
  }

  fn file(&self, rel: &str) -> PathBuf {
    self.project.join(rel)
  }
}

#[cfg(unix)]
fn read(path: &Path) -> String {
  std::fs::read_to_string(path).unwrap()
}

#[test]
#[serial]
#[cfg(unix)]
fn prints_targets() {
  let fx = Fixture::new("");
  fx.cmd()
    .arg("--multibuild-targets")
    .assert()
    .success()
    .stderr(predicate::eq("linux/amd64\nwindows/amd64\n"));
}

#[test]
#[serial]
#[cfg(unix)]
fn prints_targets_as_json() {
  let fx = Fixture::new("//go:multibuild:include=linux/*");
  fx.cmd()
    .args(["--multibuild-targets", "--json"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""linux/amd64""#))
    .stdout(predicate::str::contains("windows").not());
}

#[test]
#[serial]
#[cfg(unix)]
fn prints_configuration() {
  let fx = Fixture::new("//go:multibuild:output=bin/${TARGET}-${GOOS}-${GOARCH}\n//go:multibuild:format=zip");
  fx.cmd()
    .arg("--multibuild-configuration")
    .assert()
    .success()
    .stderr(predicate::eq(
      "//go:multibuild:include=*/*\n\
       //go:multibuild:exclude=android/*,ios/*\n\
       //go:multibuild:output=bin/${TARGET}-${GOOS}-${GOARCH}\n\
       //go:multibuild:format=zip\n",
    ));
}

#[test]
#[serial]
#[cfg(unix)]
fn bad_directive_fails_the_scan() {
  let fx = Fixture::new("//go:multibuild:bogus=1");
  fx.cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("bad go:multibuild instruction"));
}

#[test]
#[serial]
#[cfg(unix)]
fn builds_every_target() {
  let fx = Fixture::new("//go:multibuild:output=bin/${TARGET}-${GOOS}-${GOARCH}");
  fx.cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("linux/amd64: built"))
    .stdout(predicate::str::contains("windows/amd64: built"))
    .stderr(predicate::str::contains("Built 2 target(s)"));

  assert_eq!(read(&fx.file("bin/app-linux-amd64")), "linux/amd64 cgo=0\n");
  assert_eq!(read(&fx.file("bin/app-windows-amd64.exe")), "windows/amd64 cgo=0\n");
  assert!(!fx.file("bin/app-android-arm64").exists());
}

#[test]
#[serial]
#[cfg(unix)]
fn caller_cgo_setting_is_kept() {
  let fx = Fixture::new("//go:multibuild:include=linux/amd64");
  fx.cmd().env("CGO_ENABLED", "1").assert().success();
  assert_eq!(read(&fx.file("app-linux-amd64")), "linux/amd64 cgo=1\n");
}

#[test]
#[serial]
#[cfg(unix)]
fn archives_replace_binary() {
  let fx = Fixture::new("//go:multibuild:include=linux/amd64\n//go:multibuild:format=tar.gz,zip");
  fx.cmd().assert().success();

  assert!(fx.file("app-linux-amd64.tar.gz").exists());
  assert!(fx.file("app-linux-amd64.zip").exists());
  assert!(!fx.file("app-linux-amd64").exists());
}

#[test]
#[serial]
#[cfg(unix)]
fn failing_target_fails_the_run() {
  let fx = Fixture::new("");
  fx.cmd()
    .env("FAIL_GOOS", "windows")
    .assert()
    .failure()
    .stderr(predicate::str::contains("windows/amd64: boom"))
    .stderr(predicate::str::contains("Build failed for windows/amd64"));

  // The other target still finished.
  assert!(fx.file("app-linux-amd64").exists());
}

#[test]
#[serial]
#[cfg(unix)]
fn goos_in_environment_runs_single_build() {
  let fx = Fixture::new("");
  fx.cmd().env("GOOS", "linux").assert().success();

  assert_eq!(read(&fx.file("passthrough.out")), "linux/ cgo=\n");
  assert!(!fx.file("app-linux-amd64").exists());
}

#[test]
#[serial]
#[cfg(unix)]
fn verbose_reports_each_target_stage() {
  let fx = Fixture::new("//go:multibuild:include=linux/amd64");
  fx.cmd()
    .arg("-v")
    .assert()
    .success()
    .stderr(predicate::str::contains("waiting"))
    .stderr(predicate::str::contains("building"))
    .stderr(predicate::str::contains("done"));
}

#[test]
#[serial]
#[cfg(unix)]
fn introspection_flags_may_follow_package() {
  let fx = Fixture::new("//go:multibuild:include=linux/*");
  fx.cmd()
    .args([".", "--multibuild-targets", "--json"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""linux/amd64""#));
}
