//! Toolchain runtime library deployer.
//!
//! Binaries linked against the toolchain's libc++, libunwind, or sanitizer
//! runtimes need those shared libraries at run time. This crate detects a
//! binary's dependencies with the platform's inspection tool, resolves the
//! toolchain-provided ones, and copies them next to the binary. It is used
//! by the `libdeploy` CLI binary and by the compiler driver's post-link
//! hook, and can be consumed programmatically.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`copy`] - Race-safe atomic file deployment
//! - [`deploy`] - Shared dependency walk and deployment engine
//! - [`detect`] - Binary format detection from extension or magic bytes
//! - [`dirs`] - Directory resolution abstraction for the toolchain root
//! - [`env_flags`] - Environment flags controlling automatic deployment
//! - [`error`] - Semantic error types
//! - [`executor`] - Subprocess execution with bounded waits
//! - [`factory`] - Deployer construction by platform name
//! - [`linux`] - ELF deployment via readelf
//! - [`macos`] - Mach-O deployment via otool, with install-name fixup
//! - [`post_link`] - Post-link entry point with opt-out handling
//! - [`toolchain`] - Toolchain installation layout
//! - [`windows`] - PE deployment via llvm-objdump

pub mod cli;
pub mod copy;
pub mod deploy;
pub mod detect;
pub mod dirs;
pub mod env_flags;
pub mod error;
pub mod executor;
pub mod factory;
pub mod linux;
pub mod macos;
pub mod post_link;
pub mod toolchain;
pub mod windows;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
