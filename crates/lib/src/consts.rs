//! Shared constants.

/// Prefix marking a configuration directive inside a Go source file.
pub const DIRECTIVE_MARKER: &str = "//go:multibuild:";

/// Output template used when no source declares `output=`.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "${TARGET}-${GOOS}-${GOARCH}";

/// Targets that need cgo to build. These are always excluded.
pub const CGO_ONLY_EXCLUDES: &[&str] = &["android/*", "ios/*"];

/// Maximum number of compiler invocations in flight at once.
pub const DEFAULT_PARALLELISM: usize = 4;

/// The toolchain driver invoked for listing and building.
pub const GO_PROGRAM: &str = "go";

pub const ENV_GOOS: &str = "GOOS";
pub const ENV_GOARCH: &str = "GOARCH";
pub const ENV_CGO_ENABLED: &str = "CGO_ENABLED";

/// Operating system whose binaries carry an `.exe` suffix.
pub const EXE_SUFFIX_OS: &str = "windows";
pub const EXE_SUFFIX: &str = ".exe";
