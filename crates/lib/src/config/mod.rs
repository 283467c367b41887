//! In-source build configuration.
//!
//! A package declares which targets to build, where to put the binaries, and
//! how to package them through `//go:multibuild:` comment directives spread
//! across its source files.

mod scan;
mod types;

pub use scan::{Source, scan, scan_files, scan_source};
pub use types::*;
