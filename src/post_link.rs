//! Post-link entry point.
//!
//! This is the seam the compiler driver calls after a successful link: given
//! the output path and target description, deploy whatever runtime libraries
//! the binary needs. Every failure here degrades to a log line and a zero
//! count; a missing toolchain or an odd output file must never fail a build
//! that already linked.

use crate::detect::{Platform, detect_platform, is_shared_library};
use crate::dirs::{BaseDirs, SystemBaseDirs, default_toolchain_root};
use crate::env_flags;
use crate::factory::create_deployer;
use crate::toolchain::{Arch, ToolchainLayout};
use camino::Utf8Path;
use log::{debug, warn};

/// Deploys runtime library dependencies next to a freshly linked binary.
///
/// `platform` is the detected or caller-supplied binary format and `arch`
/// the target architecture string from the build. Returns the number of
/// libraries actually copied.
#[must_use]
pub fn post_link_deployment(output: &Utf8Path, platform: Platform, arch: &str) -> usize {
    deploy_with_dirs(&SystemBaseDirs, output, platform, arch)
}

/// As [`post_link_deployment`], but detecting the platform from the output
/// file itself.
#[must_use]
pub fn post_link_deployment_auto(output: &Utf8Path, arch: &str) -> usize {
    let Some(platform) = detect_platform(output) else {
        debug!("could not determine binary format of {output}");
        return 0;
    };
    post_link_deployment(output, platform, arch)
}

fn deploy_with_dirs(
    dirs: &dyn BaseDirs,
    output: &Utf8Path,
    platform: Platform,
    arch: &str,
) -> usize {
    if env_flags::is_feature_disabled(env_flags::DEPLOY_LIBS) {
        debug!("library deployment disabled by environment");
        return 0;
    }
    if is_shared_library(output) && env_flags::is_feature_disabled(env_flags::DEPLOY_SHARED_LIB) {
        debug!("shared-library deployment disabled by environment");
        return 0;
    }
    if !output.as_std_path().exists() {
        debug!("link output does not exist: {output}");
        return 0;
    }

    let arch = match Arch::parse(arch) {
        Ok(arch) => arch,
        Err(e) => {
            warn!("skipping library deployment: {e}");
            return 0;
        }
    };

    let Some(root) = default_toolchain_root(dirs, platform.install_dir(), arch.as_str()) else {
        warn!("could not determine toolchain root; skipping library deployment");
        return 0;
    };

    let Some(deployer) = create_deployer(platform.as_str(), arch, ToolchainLayout::new(root))
    else {
        return 0;
    };

    deployer.deploy_all(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::MockBaseDirs;
    use camino::Utf8PathBuf;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn linked_output(dir: &Utf8Path) -> Utf8PathBuf {
        let output = dir.join("app");
        fs::write(&output, b"\x7fELFrest-of-binary").expect("write output");
        output
    }

    #[test]
    fn disabled_deployment_copies_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf8 path");
        let output = linked_output(&dir);

        temp_env::with_var("CLANG_TOOL_CHAIN_NO_DEPLOY_LIBS", Some("1"), || {
            let dirs = MockBaseDirs::new();
            assert_eq!(deploy_with_dirs(&dirs, &output, Platform::Linux, "x86_64"), 0);
        });
    }

    #[test]
    fn missing_output_copies_nothing() {
        temp_env::with_var("CLANG_TOOL_CHAIN_NO_AUTO", None::<&str>, || {
            let dirs = MockBaseDirs::new();
            let missing = Utf8Path::new("/nonexistent/build/app");
            assert_eq!(deploy_with_dirs(&dirs, missing, Platform::Linux, "x86_64"), 0);
        });
    }

    #[test]
    fn unsupported_arch_copies_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf8 path");
        let output = linked_output(&dir);

        temp_env::with_var("CLANG_TOOL_CHAIN_NO_AUTO", None::<&str>, || {
            let dirs = MockBaseDirs::new();
            assert_eq!(deploy_with_dirs(&dirs, &output, Platform::Linux, "riscv64"), 0);
        });
    }

    #[test]
    fn missing_home_dir_copies_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf8 path");
        let output = linked_output(&dir);

        temp_env::with_var("CLANG_TOOL_CHAIN_NO_AUTO", None::<&str>, || {
            let mut dirs = MockBaseDirs::new();
            dirs.expect_home_dir().returning(|| None);
            assert_eq!(deploy_with_dirs(&dirs, &output, Platform::Linux, "x86_64"), 0);
        });
    }

    #[test]
    fn empty_toolchain_deploys_nothing_but_succeeds() {
        // Full pipeline against a real (empty) toolchain root. The probe
        // runs readelf if present; either way no library resolves and the
        // count is zero.
        let temp = TempDir::new().expect("tempdir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf8 path");
        let output = linked_output(&dir);
        let home = temp.path().join("home");
        fs::create_dir_all(&home).expect("create home");

        temp_env::with_var("CLANG_TOOL_CHAIN_NO_AUTO", None::<&str>, || {
            let mut dirs = MockBaseDirs::new();
            let home = PathBuf::from(&home);
            dirs.expect_home_dir().returning(move || Some(home.clone()));
            assert_eq!(deploy_with_dirs(&dirs, &output, Platform::Linux, "x86_64"), 0);
        });
    }
}
