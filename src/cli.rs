//! CLI argument definitions for the library deployer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Platform override values accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    /// PE binaries using the MinGW runtime.
    Windows,
    /// ELF binaries.
    Linux,
    /// Mach-O binaries.
    Darwin,
}

impl PlatformArg {
    /// Maps the CLI value onto the detected-platform type.
    #[must_use]
    pub const fn as_platform(self) -> crate::detect::Platform {
        match self {
            Self::Windows => crate::detect::Platform::Windows,
            Self::Linux => crate::detect::Platform::Linux,
            Self::Darwin => crate::detect::Platform::Darwin,
        }
    }
}

/// Deploy toolchain runtime libraries next to a linked binary.
#[derive(Parser, Debug)]
#[command(name = "libdeploy")]
#[command(version, about)]
#[command(long_about = concat!(
    "Deploy toolchain runtime libraries next to a linked binary.\n\n",
    "Binaries linked against the toolchain's libc++, libunwind, or sanitizer ",
    "runtimes will not start on machines where those libraries are not on the ",
    "loader's search path. This tool inspects a binary's dependencies, resolves ",
    "the toolchain-provided ones, and copies them into the binary's directory.\n\n",
    "The platform is normally inferred from the output file; use -p/--platform ",
    "to override it for unusual filenames.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  CLANG_TOOL_CHAIN_NO_AUTO                Disable all automatic deployment\n",
    "  CLANG_TOOL_CHAIN_NO_DEPLOY_LIBS         Disable library deployment\n",
    "  CLANG_TOOL_CHAIN_NO_DEPLOY_SHARED_LIB   Skip shared-library outputs\n",
    "  CLANG_TOOL_CHAIN_DLL_DEPLOY_VERBOSE     Verbose deployment logging\n\n",
    "EXAMPLES:\n",
    "  Deploy runtime libraries for an executable:\n",
    "    $ libdeploy build/app\n\n",
    "  Preview what would be deployed:\n",
    "    $ libdeploy --dry-run build/app\n\n",
    "  Force the Windows deployer for a cross-compiled binary:\n",
    "    $ libdeploy -p windows -a x86_64 build/app.exe\n",
))]
pub struct Cli {
    /// The linked binary to deploy libraries for.
    pub binary: Utf8PathBuf,

    /// Override the platform inferred from the binary.
    #[arg(short, long, value_enum, value_name = "PLATFORM")]
    pub platform: Option<PlatformArg>,

    /// Target architecture [default: the host architecture].
    #[arg(short, long, value_name = "ARCH")]
    pub arch: Option<String>,

    /// List dependencies and resolutions without copying anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Enable verbose logging to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Cli {
    /// Creates a `Cli` instance with all flags disabled.
    ///
    /// Useful for testing or programmatic construction where only specific
    /// fields need to be set.
    fn default() -> Self {
        Self {
            binary: Utf8PathBuf::new(),
            platform: None,
            arch: None,
            dry_run: false,
            verbose: false,
        }
    }
}
