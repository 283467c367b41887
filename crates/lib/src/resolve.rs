//! Target list resolution.
//!
//! Narrows the toolchain's full target list down to what a [`Config`] asks
//! for: keep anything an include filter matches, then drop anything an
//! exclude filter matches. Every include filter must still match something
//! afterwards. An include that was entirely cancelled by excludes is almost
//! always a configuration mistake, so it is an error rather than a silently
//! smaller build.

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::filter::{Filter, Target};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("required target {0} was not found, or was excluded")]
  UnsatisfiableInclude(Filter),
}

/// Compute the targets to build, in the order of `all_targets`.
pub fn resolve(all_targets: &[Target], config: &Config) -> Result<Vec<Target>, ResolveError> {
  let universal = [Filter::any()];
  let include: &[Filter] = if config.include.is_empty() {
    &universal
  } else {
    &config.include
  };

  let resolved: Vec<Target> = all_targets
    .iter()
    .filter(|t| include.iter().any(|f| f.matches(t)))
    .filter(|t| !config.exclude.iter().any(|f| f.matches(t)))
    .cloned()
    .collect();

  if let Some(unsatisfied) = include.iter().find(|f| !resolved.iter().any(|t| f.matches(t))) {
    return Err(ResolveError::UnsatisfiableInclude(unsatisfied.clone()));
  }

  debug!(available = all_targets.len(), resolved = resolved.len(), "resolved targets");

  Ok(resolved)
}
