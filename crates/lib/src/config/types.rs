//! Configuration types.
//!
//! Each source file scans into a [`PartialConfig`]. Partial configs merge in
//! file order, and [`PartialConfig::finish`] applies defaults to produce the
//! [`Config`] the rest of the pipeline reads.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::archive::{ArchiveFormat, FormatError};
use crate::consts::{CGO_ONLY_EXCLUDES, DIRECTIVE_MARKER};
use crate::filter::{Filter, FilterError};
use crate::template::{OutputTemplate, TemplateError};

/// A line within a named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub source: String,
  /// 1-based.
  pub line: usize,
}

impl Location {
  pub fn new(source: impl Into<String>, line: usize) -> Self {
    Self {
      source: source.into(),
      line,
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.source, self.line)
  }
}

/// Errors from scanning sources for directives.
#[derive(Debug, Error)]
pub enum ScanError {
  #[error("open: {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{at}: go:multibuild:{key}={value} is invalid: {source}")]
  MalformedFilter {
    at: Location,
    key: &'static str,
    value: String,
    #[source]
    source: FilterError,
  },

  #[error("{at}: go:multibuild:output={value} is invalid: {source}")]
  InvalidTemplate {
    at: Location,
    value: String,
    #[source]
    source: TemplateError,
  },

  #[error("{at}: go:multibuild:format={value} is invalid: {source}")]
  UnknownFormat {
    at: Location,
    value: String,
    #[source]
    source: FormatError,
  },

  #[error("{at}: bad go:multibuild instruction: {line:?}")]
  UnknownDirective { at: Location, line: String },

  #[error("{at}: go:multibuild:output was already set to {existing} at {first}, found: {value:?} here")]
  DuplicateOutput {
    at: Location,
    first: Location,
    existing: OutputTemplate,
    value: String,
  },
}

/// Directives collected from one or more sources, before defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
  pub include: Vec<Filter>,
  pub exclude: Vec<Filter>,
  /// The output template and where it was declared.
  pub output: Option<(OutputTemplate, Location)>,
  pub format: Vec<ArchiveFormat>,
}

impl PartialConfig {
  /// Set the output template, failing if one is already set.
  pub fn set_output(&mut self, template: OutputTemplate, at: Location) -> Result<(), ScanError> {
    if let Some((existing, first)) = &self.output {
      return Err(ScanError::DuplicateOutput {
        at,
        first: first.clone(),
        existing: existing.clone(),
        value: template.to_string(),
      });
    }
    self.output = Some((template, at));
    Ok(())
  }

  /// Fold `other` into `self`. Lists concatenate; output may only be set once.
  pub fn merge(&mut self, other: PartialConfig) -> Result<(), ScanError> {
    if let Some((template, at)) = other.output {
      self.set_output(template, at)?;
    }
    self.include.extend(other.include);
    self.exclude.extend(other.exclude);
    self.format.extend(other.format);
    Ok(())
  }

  /// Apply defaults.
  ///
  /// - No includes means everything: `*/*`.
  /// - Targets that need cgo are always excluded.
  /// - No output means `${TARGET}-${GOOS}-${GOARCH}`.
  /// - No format means the raw binary.
  pub fn finish(self) -> Config {
    let include = if self.include.is_empty() {
      vec![Filter::any()]
    } else {
      self.include
    };

    let mut exclude = self.exclude;
    exclude.extend(cgo_only_excludes());

    let format = if self.format.is_empty() {
      vec![ArchiveFormat::Raw]
    } else {
      self.format
    };

    Config {
      include,
      exclude,
      output: self.output.map(|(template, _)| template).unwrap_or_default(),
      format,
    }
  }
}

fn cgo_only_excludes() -> impl Iterator<Item = Filter> {
  CGO_ONLY_EXCLUDES.iter().filter_map(|f| f.parse().ok())
}

/// The merged configuration for one package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
  pub include: Vec<Filter>,
  pub exclude: Vec<Filter>,
  pub output: OutputTemplate,
  pub format: Vec<ArchiveFormat>,
}

impl Default for Config {
  fn default() -> Self {
    PartialConfig::default().finish()
  }
}

impl Config {
  /// Whether the unpackaged binary should be kept.
  pub fn keeps_raw(&self) -> bool {
    self.format.contains(&ArchiveFormat::Raw)
  }

  /// Requested archive formats, without raw and without repeats.
  pub fn archive_formats(&self) -> Vec<ArchiveFormat> {
    let mut formats = Vec::new();
    for format in &self.format {
      if *format != ArchiveFormat::Raw && !formats.contains(format) {
        formats.push(*format);
      }
    }
    formats
  }

  /// Render as directive lines, one per key.
  pub fn to_directives(&self) -> String {
    fn join<T: ToString>(items: &[T]) -> String {
      items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }

    format!(
      "{m}include={}\n{m}exclude={}\n{m}output={}\n{m}format={}\n",
      join(&self.include),
      join(&self.exclude),
      self.output,
      join(&self.format),
      m = DIRECTIVE_MARKER,
    )
  }
}
