//! macOS Mach-O deployment: libc++, libunwind, and sanitizer dylibs.
//!
//! Copying a dylib next to the binary is not enough on macOS. The binary's
//! load commands still point at the original location, so after deployment
//! each reference is rewritten to `@loader_path/<name>` with
//! `install_name_tool` and the binary is re-signed ad-hoc, because editing
//! load commands invalidates any existing signature. On Apple silicon an
//! unsigned binary is killed at exec time.

use crate::copy::atomic_deploy;
use crate::deploy::{DeployedLibrary, LibraryDeployer};
use crate::error::{DeployError, Result};
use crate::executor::{
    CommandExecutor, PROBE_TIMEOUT, SIGNING_TIMEOUT, SystemCommandExecutor, run_tool,
};
use crate::toolchain::{Arch, ToolchainLayout};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Filename patterns for dylibs the toolchain ships (matched
/// case-insensitively against the reference's last path component).
static DEPLOYABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"libc\+\+\.\d+\.dylib",
        r"libc\+\+abi\.\d+\.dylib",
        r"libunwind\.\d+\.dylib",
        r"libclang_rt\..*\.dylib",
    ]
    .iter()
    .map(|p| {
        #[expect(clippy::unwrap_used, reason = "pattern literals are verified by tests")]
        let pattern = Regex::new(&format!("(?i)^{p}$")).unwrap();
        pattern
    })
    .collect()
});

/// Reference prefixes that indicate a non-system library location.
const DEPLOYABLE_PREFIXES: [&str; 3] = ["@rpath", "/usr/local", "/opt/"];

/// Dynamic-loader placeholder prefixes stripped before lookup.
const LOADER_PREFIXES: [&str; 3] = ["@rpath/", "@loader_path/", "@executable_path/"];

/// Deploys LLVM runtime dylibs for Mach-O binaries and patches load
/// commands so the deployed copies are actually found at run time.
pub struct MachODeployer {
    layout: ToolchainLayout,
    executor: Box<dyn CommandExecutor>,
}

impl MachODeployer {
    /// Creates a deployer running real toolchain commands.
    #[must_use]
    pub fn new(layout: ToolchainLayout, _arch: Arch) -> Self {
        Self::with_executor(layout, Box::new(SystemCommandExecutor))
    }

    /// Creates a deployer with a custom command executor (for tests).
    #[must_use]
    pub fn with_executor(layout: ToolchainLayout, executor: Box<dyn CommandExecutor>) -> Self {
        Self { layout, executor }
    }

    fn search_dirs(&self) -> Vec<Utf8PathBuf> {
        vec![
            self.layout.clang_lib_dir(),
            Utf8PathBuf::from("/usr/local/lib"),
            Utf8PathBuf::from("/opt/homebrew/lib"),
            Utf8PathBuf::from("/opt/local/lib"),
        ]
    }

    /// Rewrites one load-command reference in `binary`. A failure leaves
    /// the original reference in place and is reported as a warning.
    fn fix_install_name(&self, binary: &Utf8Path, old: &str, new: &str) {
        match run_tool(
            self.executor.as_ref(),
            "install_name_tool",
            &["-change", old, new, binary.as_str()],
            PROBE_TIMEOUT,
        ) {
            Ok(_) => debug!("rewrote install name {old} -> {new} in {binary}"),
            Err(e) => warn!("install_name_tool failed for {binary}: {e}"),
        }
    }

    /// Ad-hoc re-signs a binary after its load commands were edited.
    fn resign(&self, binary: &Utf8Path) {
        match run_tool(
            self.executor.as_ref(),
            "codesign",
            &["-s", "-", "--force", binary.as_str()],
            SIGNING_TIMEOUT,
        ) {
            Ok(_) => debug!("re-signed {binary}"),
            Err(DeployError::ToolUnavailable { .. }) => {
                debug!("codesign not found; signature of {binary} will be invalid");
            }
            Err(e) => warn!("codesign failed for {binary}: {e}"),
        }
    }
}

/// Extracts dependency references from `otool -L` output.
///
/// The first line names the inspected file itself; each following line is
/// indented and starts with the reference, followed by version details in
/// parentheses.
#[must_use]
pub fn parse_otool_output(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(std::borrow::ToOwned::to_owned)
        .collect()
}

/// Strips a dynamic-loader placeholder prefix, leaving the bare filename
/// or relative path used for toolchain lookup.
fn strip_loader_prefix(reference: &str) -> &str {
    for prefix in LOADER_PREFIXES {
        if let Some(rest) = reference.strip_prefix(prefix) {
            return rest;
        }
    }
    reference
}

fn reference_filename(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

impl LibraryDeployer for MachODeployer {
    fn platform_name(&self) -> &'static str {
        "darwin"
    }

    fn library_extension(&self) -> &'static str {
        ".dylib"
    }

    /// Probes load commands with `otool -L`. No heuristic fallback: a
    /// failed probe is a warning and an empty list.
    fn detect_dependencies(&self, binary: &Utf8Path) -> Result<Vec<String>> {
        match run_tool(
            self.executor.as_ref(),
            "otool",
            &["-L", binary.as_str()],
            PROBE_TIMEOUT,
        ) {
            Ok(stdout) => Ok(parse_otool_output(&stdout)),
            Err(e) => {
                warn!("otool probe failed for {binary}: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// System paths are rejected before the filename is considered, so
    /// `/usr/lib/libunwind.dylib` stays with the OS even though a
    /// toolchain libunwind would be deployed.
    fn is_deployable(&self, reference: &str) -> bool {
        if reference.starts_with("/usr/lib/") || reference.starts_with("/System/Library/") {
            return false;
        }
        if !DEPLOYABLE_PREFIXES.iter().any(|p| reference.starts_with(p)) {
            return false;
        }
        let filename = reference_filename(reference);
        DEPLOYABLE_PATTERNS.iter().any(|p| p.is_match(filename))
    }

    fn find_in_toolchain(&self, reference: &str) -> Option<Utf8PathBuf> {
        let stripped = strip_loader_prefix(reference);

        // An absolute reference names its own location when the file is
        // present. A stale absolute path (library only installed in the
        // toolchain) falls through to the filename search below.
        if stripped.starts_with('/') {
            let candidate = Utf8Path::new(stripped);
            if candidate.as_std_path().exists() {
                return canonical_utf8(candidate);
            }
        }

        let filename = reference_filename(stripped);
        for dir in self.search_dirs() {
            let candidate = dir.join(filename);
            if candidate.as_std_path().exists() {
                return canonical_utf8(&candidate);
            }
        }
        None
    }

    /// Deploys under the resolved filename and gives the fresh copy an
    /// install name of `@loader_path/<name>` so that libraries referencing
    /// each other resolve within the output directory.
    fn deploy_library(&self, reference: &str, out_dir: &Utf8Path) -> Option<DeployedLibrary> {
        let Some(source_path) = self.find_in_toolchain(reference) else {
            warn!("library not found in toolchain, skipping: {reference}");
            return None;
        };

        let deployed_name = source_path.file_name().unwrap_or(reference).to_owned();
        let dest = out_dir.join(&deployed_name);

        match atomic_deploy(&source_path, &dest) {
            Ok(true) => {
                self.fix_install_name(
                    &dest,
                    source_path.as_str(),
                    &format!("@loader_path/{deployed_name}"),
                );
                self.resign(&dest);
                Some(DeployedLibrary {
                    reference: reference.to_owned(),
                    source_path,
                    deployed_name,
                })
            }
            Ok(false) => None,
            Err(e) => {
                warn!("failed to deploy {reference}: {e}");
                None
            }
        }
    }

    /// Rewrites the binary's references to the deployed copies, then
    /// re-signs once. Runs only when something was actually copied.
    fn post_deploy(&self, binary: &Utf8Path, deployed: &[DeployedLibrary]) {
        if deployed.is_empty() {
            return;
        }
        for library in deployed {
            self.fix_install_name(
                binary,
                &library.reference,
                &format!("@loader_path/{}", library.deployed_name),
            );
        }
        self.resign(binary);
    }
}

fn canonical_utf8(path: &Utf8Path) -> Option<Utf8PathBuf> {
    match path.as_std_path().canonicalize() {
        Ok(resolved) => match Utf8PathBuf::from_path_buf(resolved) {
            Ok(resolved) => Some(resolved),
            Err(_) => {
                debug!("resolved path for {path} is not valid UTF-8");
                None
            }
        },
        Err(e) => {
            debug!("could not resolve {path}: {e}");
            None
        }
    }
}
