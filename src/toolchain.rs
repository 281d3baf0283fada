//! Toolchain installation layout.
//!
//! The deployer never downloads anything; it only reads from an already
//! installed toolchain root with the versioned layout produced by the
//! installer: `bin/`, `lib/`, `lib/clang/<version>/lib/<target>/`, and on
//! Windows an architecture-named MinGW sysroot with its own `bin/`.

use crate::error::{DeployError, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Target architectures with a known toolchain layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// 64-bit Intel/AMD.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
}

impl Arch {
    /// Parses an architecture string as reported by build tooling.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UnsupportedArch`] for architectures without a
    /// toolchain layout mapping.
    pub fn parse(arch: &str) -> Result<Self> {
        match arch.to_lowercase().trim() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "arm64" | "aarch64" => Ok(Self::Aarch64),
            other => Err(DeployError::UnsupportedArch {
                arch: other.to_owned(),
            }),
        }
    }

    /// Canonical name used in toolchain directory paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "arm64",
        }
    }

    /// MinGW sysroot directory name for the GNU ABI on Windows.
    #[must_use]
    pub const fn mingw_sysroot(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64-w64-mingw32",
            Self::Aarch64 => "aarch64-w64-mingw32",
        }
    }

    /// Multiarch library directory name on Linux.
    #[must_use]
    pub const fn linux_multiarch(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64-linux-gnu",
            Self::Aarch64 => "aarch64-linux-gnu",
        }
    }

    /// Compiler-rt target directory names, most specific first.
    #[must_use]
    pub const fn compiler_rt_targets(self) -> [&'static str; 2] {
        match self {
            Self::X86_64 => ["x86_64-unknown-linux-gnu", "linux"],
            Self::Aarch64 => ["aarch64-unknown-linux-gnu", "linux"],
        }
    }
}

/// A toolchain installation root with accessors for its known layout.
#[derive(Debug, Clone)]
pub struct ToolchainLayout {
    root: Utf8PathBuf,
}

impl ToolchainLayout {
    /// Wraps an installation root. The root is not validated; lookups into
    /// a missing installation simply find nothing.
    #[must_use]
    pub const fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// The installation root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory containing the clang driver and LLVM tools.
    #[must_use]
    pub fn clang_bin_dir(&self) -> Utf8PathBuf {
        self.root.join("bin")
    }

    /// Directory containing the toolchain's runtime libraries.
    #[must_use]
    pub fn clang_lib_dir(&self) -> Utf8PathBuf {
        self.root.join("lib")
    }

    /// MinGW sysroot `bin/` directory holding the GNU runtime DLLs.
    #[must_use]
    pub fn mingw_sysroot_bin(&self, arch: Arch) -> Utf8PathBuf {
        self.root.join(arch.mingw_sysroot()).join("bin")
    }

    /// Compiler-rt library directories across all installed clang versions.
    ///
    /// Scans `lib/clang/<version>/lib/<target>/` for every version present,
    /// preserving the target priority order given by the caller. Sanitizer
    /// runtimes live here.
    #[must_use]
    pub fn compiler_rt_lib_dirs(&self, targets: &[&str]) -> Vec<Utf8PathBuf> {
        let mut dirs = Vec::new();
        let clang_dir = self.clang_lib_dir().join("clang");

        let Ok(entries) = clang_dir.read_dir_utf8() else {
            return dirs;
        };

        for entry in entries.flatten() {
            let version_dir = entry.path();
            if !version_dir.is_dir() {
                continue;
            }
            for target in targets {
                let rt_dir = version_dir.join("lib").join(target);
                if rt_dir.is_dir() {
                    dirs.push(rt_dir);
                }
            }
        }

        dirs
    }
}
