//! Deployer construction by platform name.

use crate::deploy::LibraryDeployer;
use crate::linux::ElfDeployer;
use crate::macos::MachODeployer;
use crate::toolchain::{Arch, ToolchainLayout};
use crate::windows::PeDeployer;
use log::warn;

/// Platform names accepted by [`create_deployer`].
pub const SUPPORTED_PLATFORMS: [&str; 3] = ["windows", "linux", "darwin"];

/// Creates the deployer for a platform name.
///
/// Accepts the canonical names plus the common aliases `win32` and `macos`,
/// case-insensitively. Returns `None` (with a warning) for platforms
/// without a deployment implementation; callers treat that as "nothing to
/// deploy", not an error.
#[must_use]
pub fn create_deployer(
    platform: &str,
    arch: Arch,
    layout: ToolchainLayout,
) -> Option<Box<dyn LibraryDeployer>> {
    match platform.trim().to_lowercase().as_str() {
        "windows" | "win32" | "win" => Some(Box::new(PeDeployer::new(layout, arch))),
        "linux" => Some(Box::new(ElfDeployer::new(layout, arch))),
        "darwin" | "macos" => Some(Box::new(MachODeployer::new(layout, arch))),
        other => {
            warn!("no library deployer for platform: {other}");
            None
        }
    }
}

/// Creates the deployer for the host platform this build runs on.
#[must_use]
pub fn create_deployer_for_host(
    arch: Arch,
    layout: ToolchainLayout,
) -> Option<Box<dyn LibraryDeployer>> {
    let platform = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else {
        "linux"
    };
    create_deployer(platform, arch, layout)
}

/// Returns true when [`create_deployer`] would produce a deployer.
#[must_use]
pub fn is_platform_supported(platform: &str) -> bool {
    matches!(
        platform.trim().to_lowercase().as_str(),
        "windows" | "win32" | "win" | "linux" | "darwin" | "macos"
    )
}
