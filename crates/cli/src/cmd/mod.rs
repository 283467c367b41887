mod build;
mod show;

pub use build::{BuildOptions, cmd_build};
