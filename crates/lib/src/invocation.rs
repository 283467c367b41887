//! Interpretation of the arguments forwarded to `go build`.
//!
//! multibuild takes the same arguments as `go build`. Most of them pass
//! through untouched; what matters here is which package is being built and
//! what its binary is called, since that name fills `${TARGET}`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// `go build` flags that take their value as the following argument.
const VALUE_FLAGS: &[&str] = &[
  "-C",
  "-asmflags",
  "-buildmode",
  "-buildvcs",
  "-compiler",
  "-coverpkg",
  "-covermode",
  "-gccgoflags",
  "-gcflags",
  "-installsuffix",
  "-ldflags",
  "-mod",
  "-modfile",
  "-overlay",
  "-p",
  "-pgo",
  "-pkgdir",
  "-tags",
  "-toolexec",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
  #[error("cannot build multiple packages")]
  MultiplePackages,

  #[error("unrecognized argument {0:?}")]
  UnknownMultibuildFlag(String),

  #[error("flag {0} needs a value")]
  MissingValue(String),

  #[error("cannot name binary after working directory {0}")]
  UnnamedDirectory(PathBuf),
}

/// A parsed `go build` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  /// Flags forwarded verbatim, in order. Excludes `-o`.
  pub flags: Vec<String>,
  /// The package directory. `.` when none was named.
  pub package: String,
  /// Explicit `.go` files, when the package was given as a file.
  pub files: Vec<String>,
  /// The `-o` value, if any.
  pub output: Option<String>,
  /// Base name for `${TARGET}`.
  pub binary_name: String,
}

impl Invocation {
  /// Parse `args`. `cwd` names the binary when building the current directory.
  pub fn parse<S: AsRef<str>>(args: &[S], cwd: &Path) -> Result<Self, InvocationError> {
    let mut flags = Vec::new();
    let mut output = None;
    let mut positional: Option<String> = None;

    let mut iter = args.iter().map(AsRef::as_ref);
    while let Some(arg) = iter.next() {
      if arg == "-o" {
        let value = iter.next().ok_or_else(|| InvocationError::MissingValue(arg.to_string()))?;
        output = Some(value.to_string());
      } else if let Some(value) = arg.strip_prefix("-o=") {
        output = Some(value.to_string());
      } else if arg.starts_with("--multibuild") {
        return Err(InvocationError::UnknownMultibuildFlag(arg.to_string()));
      } else if VALUE_FLAGS.contains(&arg) {
        let value = iter.next().ok_or_else(|| InvocationError::MissingValue(arg.to_string()))?;
        flags.push(arg.to_string());
        flags.push(value.to_string());
      } else if arg.starts_with('-') {
        flags.push(arg.to_string());
      } else if positional.is_some() {
        return Err(InvocationError::MultiplePackages);
      } else {
        positional = Some(arg.to_string());
      }
    }

    let (package, files, derived_name) = match positional {
      None => (".".to_string(), Vec::new(), None),
      Some(file) if file.ends_with(".go") => {
        let path = Path::new(&file);
        let dir = match path.parent() {
          Some(p) if !p.as_os_str().is_empty() => p.display().to_string(),
          _ => ".".to_string(),
        };
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        (dir, vec![file], stem)
      }
      Some(dir) if dir == "." => (dir, Vec::new(), None),
      Some(dir) => {
        let name = Path::new(dir.trim_end_matches('/'))
          .file_name()
          .map(|s| s.to_string_lossy().into_owned());
        (dir, Vec::new(), name)
      }
    };

    let binary_name = match (&output, derived_name) {
      (Some(o), _) => o.clone(),
      (None, Some(name)) => name,
      (None, None) => cwd
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| InvocationError::UnnamedDirectory(cwd.to_path_buf()))?,
    };

    Ok(Self {
      flags,
      package,
      files,
      output,
      binary_name,
    })
  }

  /// What to hand the compiler as the thing to build: the files, or the package.
  pub fn build_targets(&self) -> Vec<String> {
    if self.files.is_empty() {
      vec![self.package.clone()]
    } else {
      self.files.clone()
    }
  }

  /// Arguments for one cross-compile: flags, then `-o`, then the package.
  pub fn build_args(&self, output: &Path) -> Vec<String> {
    let mut args = self.flags.clone();
    args.push("-o".to_string());
    args.push(output.display().to_string());
    args.extend(self.build_targets());
    args
  }
}
