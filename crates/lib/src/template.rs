//! Output path templates.
//!
//! An output template decides where each target's binary lands. It is a path
//! made of literal characters and three placeholders, all of which must appear
//! at least once so that every target renders to a distinct path:
//!
//! - `${TARGET}` - the binary's base name
//! - `${GOOS}` - the target operating system
//! - `${GOARCH}` - the target architecture
//!
//! Literal characters are restricted to ASCII letters, digits, and `_-/.`.
//! A `$` is only valid as the start of a placeholder.
//!
//! # Example
//!
//! ```
//! use multibuild_lib::filter::Target;
//! use multibuild_lib::template::OutputTemplate;
//!
//! let template = OutputTemplate::parse("bin/${GOOS}/${GOARCH}/${TARGET}").unwrap();
//! let target = Target::new("linux", "arm64");
//! assert_eq!(template.render("app", &target), "bin/linux/arm64/app");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::consts::DEFAULT_OUTPUT_TEMPLATE;
use crate::filter::Target;

/// A named placeholder inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
  /// `${TARGET}`
  Target,
  /// `${GOOS}`
  Os,
  /// `${GOARCH}`
  Arch,
}

impl Placeholder {
  pub const ALL: [Placeholder; 3] = [Placeholder::Target, Placeholder::Os, Placeholder::Arch];

  pub fn name(self) -> &'static str {
    match self {
      Self::Target => "TARGET",
      Self::Os => "GOOS",
      Self::Arch => "GOARCH",
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|p| p.name() == name)
  }
}

impl fmt::Display for Placeholder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "${{{}}}", self.name())
  }
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Placeholder(Placeholder),
}

/// Errors from template validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("empty string is not a valid template")]
  Empty,

  #[error("at {0}: unexpected character: {1:?}")]
  UnexpectedChar(usize, char),

  #[error("at {0}: expected '{{' after '$'")]
  ExpectedBrace(usize),

  #[error("at {0}: bad placeholder character: {1:?}")]
  BadPlaceholderChar(usize, char),

  #[error("at {0}: unclosed placeholder")]
  Unclosed(usize),

  #[error("at {offset}: unexpected placeholder ${{{name}}}")]
  UnknownPlaceholder { offset: usize, name: String },

  #[error("placeholder {0} was not found")]
  Missing(Placeholder),
}

/// A validated output template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct OutputTemplate {
  source: String,
  segments: Vec<Segment>,
}

fn is_path_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.')
}

fn is_placeholder_char(c: char) -> bool {
  c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

impl OutputTemplate {
  /// Validate `text` and build a template from it.
  ///
  /// # Errors
  ///
  /// Fails on characters outside the path alphabet, malformed or unknown
  /// placeholders, and when any of the three placeholders is absent.
  pub fn parse(text: &str) -> Result<Self, TemplateError> {
    if text.is_empty() {
      return Err(TemplateError::Empty);
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
      if is_path_char(ch) {
        literal.push(ch);
        continue;
      }

      if ch != '$' {
        return Err(TemplateError::UnexpectedChar(pos, ch));
      }

      match chars.next() {
        Some((_, '{')) => {}
        _ => return Err(TemplateError::ExpectedBrace(pos + 1)),
      }

      let name_start = pos + 2;
      let mut name_end = None;
      for (i, c) in chars.by_ref() {
        if c == '}' {
          name_end = Some(i);
          break;
        }
        if !is_placeholder_char(c) {
          return Err(TemplateError::BadPlaceholderChar(i, c));
        }
      }
      let name_end = name_end.ok_or(TemplateError::Unclosed(pos))?;

      let name = &text[name_start..name_end];
      let placeholder = Placeholder::from_name(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
        offset: pos,
        name: name.to_string(),
      })?;

      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Placeholder(placeholder));
    }

    if !literal.is_empty() {
      segments.push(Segment::Literal(literal));
    }

    for required in Placeholder::ALL {
      if !segments.contains(&Segment::Placeholder(required)) {
        return Err(TemplateError::Missing(required));
      }
    }

    Ok(Self {
      source: text.to_string(),
      segments,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Substitute `binary` and the target's components into the template.
  pub fn render(&self, binary: &str, target: &Target) -> String {
    let mut out = String::with_capacity(self.source.len() + binary.len());
    for segment in &self.segments {
      match segment {
        Segment::Literal(s) => out.push_str(s),
        Segment::Placeholder(Placeholder::Target) => out.push_str(binary),
        Segment::Placeholder(Placeholder::Os) => out.push_str(target.os()),
        Segment::Placeholder(Placeholder::Arch) => out.push_str(target.arch()),
      }
    }
    out
  }
}

impl Default for OutputTemplate {
  /// `${TARGET}-${GOOS}-${GOARCH}`, flat in the working directory.
  fn default() -> Self {
    Self {
      source: DEFAULT_OUTPUT_TEMPLATE.to_string(),
      segments: vec![
        Segment::Placeholder(Placeholder::Target),
        Segment::Literal("-".to_string()),
        Segment::Placeholder(Placeholder::Os),
        Segment::Literal("-".to_string()),
        Segment::Placeholder(Placeholder::Arch),
      ],
    }
  }
}

impl FromStr for OutputTemplate {
  type Err = TemplateError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for OutputTemplate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.source)
  }
}

impl From<OutputTemplate> for String {
  fn from(template: OutputTemplate) -> Self {
    template.source
  }
}
