//! Introspection: print the merged configuration or the resolved targets
//! instead of building.

use anyhow::Result;

use multibuild_lib::config::Config;
use multibuild_lib::filter::Target;

use crate::output::print_json;

pub fn show_configuration(config: &Config, json: bool) -> Result<()> {
  if json {
    return print_json(config);
  }
  eprint!("{}", config.to_directives());
  Ok(())
}

pub fn show_targets(targets: &[Target], json: bool) -> Result<()> {
  if json {
    return print_json(targets);
  }
  for target in targets {
    eprintln!("{}", target);
  }
  Ok(())
}
