mod cmd;
mod output;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cmd::{BuildOptions, cmd_build};
use output::print_error;

/// Cross-compile a Go package for every configured target.
///
/// multibuild is a thin wrapper around `go build`: unrecognized arguments are
/// passed through to it. Targets, output paths and archive formats are read
/// from `//go:multibuild:` directives in the package sources. Run
/// `go help build` for build flags.
#[derive(Parser)]
#[command(name = "multibuild")]
#[command(author, version, about, long_about)]
struct Cli {
  /// Binary name, used for ${TARGET} in the output template
  #[arg(short = 'o', value_name = "OUTPUT")]
  output: Option<String>,

  /// Log progress per target. Also passes -v to go build
  #[arg(short, long)]
  verbose: bool,

  /// Print the configuration parsed from the package and exit
  #[arg(long = "multibuild-configuration")]
  show_configuration: bool,

  /// Print the targets that would be built and exit
  #[arg(long = "multibuild-targets")]
  show_targets: bool,

  /// Print introspection output as JSON on stdout
  #[arg(long)]
  json: bool,

  /// Do not start further builds once one target has failed
  #[arg(long = "multibuild-fail-fast")]
  fail_fast: bool,

  /// Build flags and package, passed to go build
  #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "BUILD_ARGS")]
  args: Vec<String>,
}

impl Cli {
  fn into_options(mut self) -> Result<BuildOptions, clap::Error> {
    let mut go_args = Vec::new();
    if self.verbose {
      go_args.push("-v".to_string());
    }
    if let Some(output) = self.output.take() {
      go_args.push("-o".to_string());
      go_args.push(output);
    }

    // Our own flags may also follow the package, where clap leaves them in `args`.
    for arg in std::mem::take(&mut self.args) {
      match arg.as_str() {
        "--multibuild-configuration" => self.show_configuration = true,
        "--multibuild-targets" => self.show_targets = true,
        "--multibuild-fail-fast" => self.fail_fast = true,
        "--json" => self.json = true,
        _ => go_args.push(arg),
      }
    }

    if self.json && !self.show_configuration && !self.show_targets {
      return Err(Cli::command().error(
        ErrorKind::MissingRequiredArgument,
        "--json requires --multibuild-configuration or --multibuild-targets",
      ));
    }

    Ok(BuildOptions {
      go_args,
      show_configuration: self.show_configuration,
      show_targets: self.show_targets,
      json: self.json,
      fail_fast: self.fail_fast,
    })
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose {
    "warn,multibuild=debug,multibuild_lib=debug"
  } else {
    "warn"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);
  let options = cli.into_options().unwrap_or_else(|e| e.exit());

  match cmd_build(options) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("multibuild: {:#}", e));
      ExitCode::FAILURE
    }
  }
}
