//! Linux ELF deployment: libc++, libunwind, and sanitizer runtimes.
//!
//! Dependencies are read with `readelf -d` rather than `ldd`: readelf parses
//! the ELF headers directly without executing the binary, so it also works
//! for cross-compiled output. Versioned SONAMEs are handled by deploying the
//! real file and creating a relative symlink alias beside it.

use crate::copy::{atomic_deploy, symlink_alias};
use crate::deploy::{DeployedLibrary, LibraryDeployer};
use crate::error::Result;
use crate::executor::{CommandExecutor, PROBE_TIMEOUT, SystemCommandExecutor, run_tool};
use crate::toolchain::{Arch, ToolchainLayout};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// System libraries assumed present on every Linux target.
const SYSTEM_LIBRARIES: [&str; 9] = [
    "libc.so.6",
    "libm.so.6",
    "libpthread.so.0",
    "libdl.so.2",
    "librt.so.1",
    "linux-vdso.so.1",
    "ld-linux-x86-64.so.2",
    "ld-linux-aarch64.so.1",
    "libgcc_s.so.1",
];

/// LLVM toolchain library patterns (matched case-insensitively).
static DEPLOYABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"libc\+\+\.so[.\d]*",
        r"libc\+\+abi\.so[.\d]*",
        r"libunwind\.so[.\d]*",
        r"libclang_rt\..*\.so",
    ]
    .iter()
    .map(|p| {
        #[expect(clippy::unwrap_used, reason = "pattern literals are verified by tests")]
        let pattern = Regex::new(&format!("(?i)^{p}$")).unwrap();
        pattern
    })
    .collect()
});

/// Dynamic-section line format:
/// ` 0x0000000000000001 (NEEDED)  Shared library: [libc++.so.1]`.
static NEEDED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern literal is verified by tests")]
    let pattern = Regex::new(r"\(NEEDED\).*\[([^\]]+)\]").unwrap();
    pattern
});

/// Deploys LLVM runtime shared objects for ELF binaries.
pub struct ElfDeployer {
    layout: ToolchainLayout,
    arch: Arch,
    executor: Box<dyn CommandExecutor>,
}

impl ElfDeployer {
    /// Creates a deployer running real toolchain commands.
    #[must_use]
    pub fn new(layout: ToolchainLayout, arch: Arch) -> Self {
        Self::with_executor(layout, arch, Box::new(SystemCommandExecutor))
    }

    /// Creates a deployer with a custom command executor (for tests).
    #[must_use]
    pub fn with_executor(
        layout: ToolchainLayout,
        arch: Arch,
        executor: Box<dyn CommandExecutor>,
    ) -> Self {
        Self {
            layout,
            arch,
            executor,
        }
    }

    /// Library search directories in priority order: sanitizer runtimes in
    /// compiler-rt first, then toolchain lib, then system locations.
    fn search_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut dirs = self
            .layout
            .compiler_rt_lib_dirs(&self.arch.compiler_rt_targets());
        dirs.push(self.layout.clang_lib_dir());
        dirs.push(Utf8PathBuf::from("/usr/local/lib"));
        dirs.push(Utf8PathBuf::from("/usr/lib").join(self.arch.linux_multiarch()));
        dirs.push(Utf8PathBuf::from("/usr/lib"));
        dirs
    }
}

/// Extracts NEEDED entries from `readelf -d` output.
#[must_use]
pub fn parse_readelf_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| NEEDED_PATTERN.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str().to_owned())
        .collect()
}

impl LibraryDeployer for ElfDeployer {
    fn platform_name(&self) -> &'static str {
        "linux"
    }

    fn library_extension(&self) -> &'static str {
        ".so"
    }

    /// Probes NEEDED entries with `readelf -d`. There is no heuristic
    /// fallback on Linux: a failed probe is a warning and an empty list.
    fn detect_dependencies(&self, binary: &Utf8Path) -> Result<Vec<String>> {
        match run_tool(
            self.executor.as_ref(),
            "readelf",
            &["-d", binary.as_str()],
            PROBE_TIMEOUT,
        ) {
            Ok(stdout) => Ok(parse_readelf_output(&stdout)),
            Err(e) => {
                warn!("readelf probe failed for {binary}: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn is_deployable(&self, reference: &str) -> bool {
        if SYSTEM_LIBRARIES.contains(&reference) {
            return false;
        }
        DEPLOYABLE_PATTERNS.iter().any(|p| p.is_match(reference))
    }

    fn find_in_toolchain(&self, reference: &str) -> Option<Utf8PathBuf> {
        for dir in self.search_dirs() {
            let candidate = dir.join(reference);
            if !candidate.as_std_path().exists() {
                continue;
            }
            // Resolve symlinks so the real file is deployed; the SONAME
            // alias is recreated in the output directory instead.
            match candidate.as_std_path().canonicalize() {
                Ok(resolved) => {
                    if let Ok(resolved) = Utf8PathBuf::from_path_buf(resolved) {
                        return Some(resolved);
                    }
                    debug!("resolved path for {reference} is not valid UTF-8");
                }
                Err(e) => debug!("could not resolve {candidate}: {e}"),
            }
        }
        None
    }

    /// Deploys the resolved file under its real name and, for a versioned
    /// SONAME (`libfoo.so.1` resolving to `libfoo.so.1.2.3`), creates a
    /// relative symlink alias for the reference name.
    fn deploy_library(&self, reference: &str, out_dir: &Utf8Path) -> Option<DeployedLibrary> {
        let Some(source_path) = self.find_in_toolchain(reference) else {
            warn!("library not found in toolchain, skipping: {reference}");
            return None;
        };

        let deployed_name = source_path
            .file_name()
            .unwrap_or(reference)
            .to_owned();
        let dest = out_dir.join(&deployed_name);

        let copied = match atomic_deploy(&source_path, &dest) {
            Ok(copied) => copied,
            Err(e) => {
                warn!("failed to deploy {reference}: {e}");
                return None;
            }
        };

        if deployed_name != reference {
            let link = out_dir.join(reference);
            if let Err(e) = symlink_alias(&deployed_name, &link) {
                debug!("failed to create symlink for {reference}: {e}");
            }
        }

        copied.then(|| DeployedLibrary {
            reference: reference.to_owned(),
            source_path,
            deployed_name,
        })
    }
}
