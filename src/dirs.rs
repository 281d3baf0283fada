//! Directory resolution abstraction for the toolchain installation root.
//!
//! The toolchain installer (a separate subsystem) unpacks releases under
//! `~/.clang-tool-chain/clang/<platform>/<arch>/`. This module resolves that
//! root without touching the network; if the toolchain has not been
//! installed, lookups inside it simply miss.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Abstraction over platform base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Returns the current user's home directory, if one can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Resolves base directories from the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|d| d.home_dir().to_owned())
    }
}

/// Builds the default toolchain installation root for a platform/arch pair.
///
/// Returns `None` when the home directory cannot be determined or is not
/// valid UTF-8.
#[must_use]
pub fn default_toolchain_root(
    dirs: &dyn BaseDirs,
    platform_dir: &str,
    arch_dir: &str,
) -> Option<Utf8PathBuf> {
    let home = dirs.home_dir()?;
    let home = Utf8PathBuf::from_path_buf(home).ok()?;
    Some(
        home.join(".clang-tool-chain")
            .join("clang")
            .join(platform_dir)
            .join(arch_dir),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_root_follows_installer_layout() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/test")));

        let root = default_toolchain_root(&dirs, "linux", "x86_64")
            .expect("expected root to be resolved");
        assert_eq!(
            root,
            Utf8PathBuf::from("/home/test/.clang-tool-chain/clang/linux/x86_64")
        );
    }

    #[test]
    fn missing_home_dir_yields_none() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir().returning(|| None);

        assert!(default_toolchain_root(&dirs, "win", "x86_64").is_none());
    }
}
