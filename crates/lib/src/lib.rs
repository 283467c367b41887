//! multibuild-lib: cross-compilation fan-out for Go packages
//!
//! This crate provides the pieces behind the `multibuild` binary:
//! - `config`: `//go:multibuild:` directives scanned from package sources
//! - `filter`: `os/arch` targets and the filters that select them
//! - `resolve`: narrowing the toolchain's target list to the configured set
//! - `dispatch`: bounded-parallel compiles, one per target, plus packaging

pub mod archive;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod filter;
pub mod invocation;
pub mod resolve;
pub mod template;
pub mod toolchain;
pub mod util;
