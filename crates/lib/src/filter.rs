//! Platform filters and targets.
//!
//! A [`Target`] is one concrete `GOOS/GOARCH` pair reported by the toolchain.
//! A [`Filter`] is a pattern over such pairs where either component may be the
//! wildcard `*`. Wildcards always cover a whole component; `li*/amd64` is not a
//! valid filter.
//!
//! # Filter lists
//!
//! Directive values are comma-separated filter lists:
//!
//! ```
//! use multibuild_lib::filter::{parse_filters, Target};
//!
//! let filters = parse_filters("windows/arm64,linux/*").unwrap();
//! let target: Target = "linux/riscv64".parse().unwrap();
//! assert!(!filters[0].matches(&target));
//! assert!(filters[1].matches(&target));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

const WILDCARD: &str = "*";

/// A concrete `os/arch` platform pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct Target {
  os: String,
  arch: String,
}

impl Target {
  pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
    Self {
      os: os.into(),
      arch: arch.into(),
    }
  }

  /// The `GOOS` half of the pair.
  pub fn os(&self) -> &str {
    &self.os
  }

  /// The `GOARCH` half of the pair.
  pub fn arch(&self) -> &str {
    &self.arch
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)
  }
}

impl From<Target> for String {
  fn from(target: Target) -> Self {
    target.to_string()
  }
}

/// Error returned when a toolchain line is not an `os/arch` pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid target {0:?}: expected os/arch")]
pub struct InvalidTarget(pub String);

impl FromStr for Target {
  type Err = InvalidTarget;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('/') {
      Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self::new(os, arch)),
      _ => Err(InvalidTarget(s.to_string())),
    }
  }
}

/// One half of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
  /// `*`: matches any value.
  Any,
  /// Matches exactly this value.
  Literal(String),
}

impl Component {
  fn from_token(token: &str) -> Self {
    if token == WILDCARD {
      Self::Any
    } else {
      Self::Literal(token.to_string())
    }
  }

  pub fn matches(&self, value: &str) -> bool {
    match self {
      Self::Any => true,
      Self::Literal(literal) => literal == value,
    }
  }
}

impl fmt::Display for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Any => f.write_str(WILDCARD),
      Self::Literal(literal) => f.write_str(literal),
    }
  }
}

/// A validated `os/arch` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Filter {
  os: Component,
  arch: Component,
}

impl Filter {
  pub fn new(os: Component, arch: Component) -> Self {
    Self { os, arch }
  }

  /// The universal filter, `*/*`.
  pub fn any() -> Self {
    Self::new(Component::Any, Component::Any)
  }

  pub fn os(&self) -> &Component {
    &self.os
  }

  pub fn arch(&self) -> &Component {
    &self.arch
  }

  /// Returns true if both components of `target` satisfy this filter.
  pub fn matches(&self, target: &Target) -> bool {
    self.os.matches(target.os()) && self.arch.matches(target.arch())
  }
}

impl fmt::Display for Filter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)
  }
}

impl From<Filter> for String {
  fn from(filter: Filter) -> Self {
    filter.to_string()
  }
}

impl FromStr for Filter {
  type Err = FilterError;

  /// Parses exactly one filter entry.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parser = FilterParser::new(s);
    if s.is_empty() {
      return Err(parser.error(FilterErrorKind::Empty));
    }
    let filter = parser.entry()?;
    match parser.peek() {
      None => Ok(filter),
      Some(c) => Err(parser.error(FilterErrorKind::UnexpectedChar(c))),
    }
  }
}

/// Matches raw filter text against raw target text.
///
/// Both sides are split on their first `/`. A filter without any `/` only
/// matches a target that is the identical string.
pub fn matches(filter: &str, target: &str) -> bool {
  let Some((filter_os, filter_arch)) = filter.split_once('/') else {
    return filter == target;
  };
  let Some((target_os, target_arch)) = target.split_once('/') else {
    return false;
  };
  let component = |f: &str, t: &str| f == WILDCARD || f == t;
  component(filter_os, target_os) && component(filter_arch, target_arch)
}

/// What went wrong while parsing a filter list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterErrorKind {
  #[error("empty filter list")]
  Empty,

  #[error("expected GOOS")]
  ExpectedOs,

  #[error("expected '/'")]
  ExpectedSlash,

  #[error("expected GOARCH")]
  ExpectedArch,

  #[error("unexpected character: {0:?}")]
  UnexpectedChar(char),

  #[error("trailing comma")]
  TrailingComma,
}

/// A malformed filter list, with the byte offset where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at {offset}: {kind}")]
pub struct FilterError {
  pub offset: usize,
  pub kind: FilterErrorKind,
}

/// Parse a comma-separated filter list such as `linux/*,windows/arm64`.
///
/// Entries are returned in input order. Duplicates are kept.
///
/// # Errors
///
/// Fails on an empty input, empty components, partial wildcards, stray
/// characters, and leading, doubled, or trailing commas.
pub fn parse_filters(text: &str) -> Result<Vec<Filter>, FilterError> {
  let mut parser = FilterParser::new(text);
  if text.is_empty() {
    return Err(parser.error(FilterErrorKind::Empty));
  }

  let mut filters = Vec::new();
  loop {
    filters.push(parser.entry()?);

    match parser.peek() {
      None => break,
      Some(',') => {
        parser.pos += 1;
        if parser.peek().is_none() {
          return Err(FilterError {
            offset: parser.pos - 1,
            kind: FilterErrorKind::TrailingComma,
          });
        }
      }
      Some(c) => return Err(parser.error(FilterErrorKind::UnexpectedChar(c))),
    }
  }

  Ok(filters)
}

struct FilterParser<'a> {
  text: &'a str,
  pos: usize,
}

impl<'a> FilterParser<'a> {
  fn new(text: &'a str) -> Self {
    Self { text, pos: 0 }
  }

  fn peek(&self) -> Option<char> {
    self.text[self.pos..].chars().next()
  }

  fn error(&self, kind: FilterErrorKind) -> FilterError {
    FilterError { offset: self.pos, kind }
  }

  /// `OS "/" ARCH`
  fn entry(&mut self) -> Result<Filter, FilterError> {
    let os = self.component().ok_or_else(|| self.error(FilterErrorKind::ExpectedOs))?;

    match self.peek() {
      Some('/') => self.pos += 1,
      Some(c) => return Err(self.error(FilterErrorKind::UnexpectedChar(c))),
      None => return Err(self.error(FilterErrorKind::ExpectedSlash)),
    }

    let arch = self.component().ok_or_else(|| self.error(FilterErrorKind::ExpectedArch))?;

    Ok(Filter::new(Component::from_token(os), Component::from_token(arch)))
  }

  /// Either a lone `*` or a run of ASCII alphanumerics. `None` if empty.
  fn component(&mut self) -> Option<&'a str> {
    let text = self.text;
    let start = self.pos;
    let bytes = text.as_bytes();

    if bytes.get(self.pos) == Some(&b'*') {
      self.pos += 1;
    } else {
      while bytes.get(self.pos).is_some_and(|b| b.is_ascii_alphanumeric()) {
        self.pos += 1;
      }
    }

    let end = self.pos;
    (end > start).then(|| &text[start..end])
  }
}
