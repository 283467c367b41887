//! Directive scanning.
//!
//! Directives are comment lines of the form `//go:multibuild:<key>=<value>`.
//! Leading and trailing whitespace on the line is ignored. Any line starting
//! with the marker must carry a known key, so a typo fails the scan instead of
//! being skipped.

use std::path::Path;

use tracing::debug;

use crate::archive::parse_formats;
use crate::consts::DIRECTIVE_MARKER;
use crate::filter::parse_filters;
use crate::template::OutputTemplate;

use super::types::{Config, Location, PartialConfig, ScanError};

/// One source file's name and contents.
#[derive(Debug, Clone)]
pub struct Source {
  pub name: String,
  pub text: String,
}

impl Source {
  pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      text: text.into(),
    }
  }

  /// Read a source file from disk.
  pub fn read(path: &Path) -> Result<Self, ScanError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
      path: path.display().to_string(),
      source,
    })?;
    Ok(Self::new(path.display().to_string(), text))
  }
}

/// Scan a single source for directives.
///
/// Within one source a later `include=` or `exclude=` replaces the earlier
/// one. Across sources the lists concatenate, see [`PartialConfig::merge`].
pub fn scan_source(source: &Source) -> Result<PartialConfig, ScanError> {
  let mut config = PartialConfig::default();

  for (index, raw) in source.text.lines().enumerate() {
    let line = raw.trim();
    let Some(directive) = line.strip_prefix(DIRECTIVE_MARKER) else {
      continue;
    };
    let at = Location::new(&source.name, index + 1);

    let Some((key, value)) = directive.split_once('=') else {
      return Err(ScanError::UnknownDirective {
        at,
        line: line.to_string(),
      });
    };

    debug!(at = %at, key, value, "found directive");

    match key {
      "include" | "exclude" => {
        let filters = parse_filters(value).map_err(|source| ScanError::MalformedFilter {
          at: at.clone(),
          key: if key == "include" { "include" } else { "exclude" },
          value: value.to_string(),
          source,
        })?;
        if key == "include" {
          config.include = filters;
        } else {
          config.exclude = filters;
        }
      }
      "output" => {
        let template = OutputTemplate::parse(value).map_err(|source| ScanError::InvalidTemplate {
          at: at.clone(),
          value: value.to_string(),
          source,
        })?;
        config.set_output(template, at)?;
      }
      "format" => {
        let formats = parse_formats(value).map_err(|source| ScanError::UnknownFormat {
          at: at.clone(),
          value: value.to_string(),
          source,
        })?;
        config.format.extend(formats);
      }
      _ => {
        return Err(ScanError::UnknownDirective {
          at,
          line: line.to_string(),
        });
      }
    }
  }

  Ok(config)
}

/// Scan every source in order, merge, and apply defaults.
pub fn scan(sources: &[Source]) -> Result<Config, ScanError> {
  let mut merged = PartialConfig::default();
  for source in sources {
    merged.merge(scan_source(source)?)?;
  }
  Ok(merged.finish())
}

/// Read and scan the files at `paths`.
pub fn scan_files<P: AsRef<Path>>(paths: &[P]) -> Result<Config, ScanError> {
  let sources = paths
    .iter()
    .map(|p| Source::read(p.as_ref()))
    .collect::<Result<Vec<_>, _>>()?;
  scan(&sources)
}
