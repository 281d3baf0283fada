//! Shared deployment engine.
//!
//! The dependency walk and the copy orchestration are written once and
//! parameterized over [`LibraryDeployer`]; only probing, classification,
//! lookup, and the post-deployment hook differ per binary format. Shared
//! logic never branches on platform names.

use crate::copy::atomic_deploy;
use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::collections::{BTreeSet, VecDeque};

/// A library resolved and copied during one `deploy_all` call.
///
/// Nothing is persisted across invocations; this exists so the macOS
/// post-deployment fixup can rewrite the binary's original references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedLibrary {
    /// The reference string as reported by the inspection tool.
    pub reference: String,
    /// The resolved source file inside the toolchain.
    pub source_path: Utf8PathBuf,
    /// The filename the library was deployed under.
    pub deployed_name: String,
}

/// Platform-specific library deployment over a shared engine.
///
/// Implementations exist for PE (Windows), ELF (Linux), and Mach-O (macOS)
/// binaries. The provided methods implement the transitive dependency walk
/// and the deployment loop; they are deliberately not overridable in spirit,
/// though `detect_root_dependencies`, `deploy_library`, and `post_deploy`
/// are hooks for the Windows root-probe fallback, the Linux SONAME symlink,
/// and the macOS install-name fixup.
pub trait LibraryDeployer {
    /// Platform identifier used in log messages ("windows", "linux", "darwin").
    fn platform_name(&self) -> &'static str;

    /// Platform shared-library extension (".dll", ".so", ".dylib").
    fn library_extension(&self) -> &'static str;

    /// Detects direct dependencies of a binary, unfiltered, in tool order.
    ///
    /// # Errors
    ///
    /// Returns tool errors; callers degrade these to "no information from
    /// this probe" rather than aborting the walk.
    fn detect_dependencies(&self, binary: &Utf8Path) -> Result<Vec<String>>;

    /// Pure predicate: should this dependency reference be deployed?
    ///
    /// System libraries assumed present on the target OS return false;
    /// toolchain-shipped runtimes return true.
    fn is_deployable(&self, reference: &str) -> bool;

    /// Resolves a deployable reference to a file inside the toolchain.
    ///
    /// A miss is a per-library, non-fatal condition.
    fn find_in_toolchain(&self, reference: &str) -> Option<Utf8PathBuf>;

    /// Detects direct dependencies of the binary that roots a walk.
    ///
    /// Defaults to [`LibraryDeployer::detect_dependencies`]. The PE deployer
    /// overrides this to substitute its heuristic DLL list when the root
    /// probe is unusable; transitive probes stay raw, so a library whose
    /// imports are all system DLLs contributes no edges.
    ///
    /// # Errors
    ///
    /// Returns tool errors; a failing root probe yields an empty walk.
    fn detect_root_dependencies(&self, binary: &Utf8Path) -> Result<Vec<String>> {
        self.detect_dependencies(binary)
    }

    /// Collects the full deployable dependency set of a binary.
    ///
    /// Breadth-first closure over the depends-on relation: probe the binary,
    /// record deployable direct references, then repeatedly resolve and
    /// probe recorded references for transitive ones. The scanned set is
    /// local to this call, so each node is probed at most once and the walk
    /// always terminates. A failed probe contributes no edges; a failed
    /// probe of the binary itself yields the empty set.
    fn collect_dependencies(&self, binary: &Utf8Path, recursive: bool) -> BTreeSet<String> {
        let mut collected: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        match self.detect_root_dependencies(binary) {
            Ok(direct) => {
                for reference in direct {
                    if self.is_deployable(&reference) && collected.insert(reference.clone()) {
                        queue.push_back(reference);
                    }
                }
            }
            Err(e) => {
                warn!("failed to detect dependencies for {binary}: {e}");
                return BTreeSet::new();
            }
        }

        if !recursive {
            return collected;
        }

        let mut scanned: BTreeSet<String> = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if !scanned.insert(current.clone()) {
                continue;
            }

            let Some(library_path) = self.find_in_toolchain(&current) else {
                debug!("library not found in toolchain: {current}");
                continue;
            };

            match self.detect_dependencies(&library_path) {
                Ok(transitive) => {
                    for reference in transitive {
                        if self.is_deployable(&reference) && collected.insert(reference.clone()) {
                            debug!("found transitive dependency: {reference} (via {current})");
                            queue.push_back(reference);
                        }
                    }
                }
                Err(e) => {
                    debug!("failed to scan {current}: {e}");
                }
            }
        }

        collected
    }

    /// Deploys a single library into the output directory.
    ///
    /// Returns `Some` only when a copy actually happened; an up-to-date
    /// destination, an unresolved reference, and a lost deployment race all
    /// yield `None`. Failures are warnings, never errors.
    fn deploy_library(&self, reference: &str, out_dir: &Utf8Path) -> Option<DeployedLibrary> {
        let Some(source_path) = self.find_in_toolchain(reference) else {
            warn!("library not found in toolchain, skipping: {reference}");
            return None;
        };

        let dest = out_dir.join(reference);
        match atomic_deploy(&source_path, &dest) {
            Ok(true) => Some(DeployedLibrary {
                reference: reference.to_owned(),
                source_path,
                deployed_name: reference.to_owned(),
            }),
            Ok(false) => None,
            Err(e) => {
                warn!("failed to deploy {reference}: {e}");
                None
            }
        }
    }

    /// Hook invoked once after every library for the binary has been
    /// copied. The macOS deployer patches load commands and re-signs here;
    /// other platforms need no fixup.
    fn post_deploy(&self, _binary: &Utf8Path, _deployed: &[DeployedLibrary]) {}

    /// Deploys all dependencies of a binary next to it.
    ///
    /// Returns the number of libraries actually copied (as opposed to
    /// skipped as current). A second call with unchanged inputs performs
    /// zero copies.
    fn deploy_all(&self, binary: &Utf8Path) -> usize {
        let Some(out_dir) = binary.parent() else {
            debug!("binary has no parent directory: {binary}");
            return 0;
        };

        let dependencies = self.collect_dependencies(binary, true);
        if dependencies.is_empty() {
            debug!("no deployable dependencies found for {binary}");
            return 0;
        }

        let mut deployed = Vec::new();
        for reference in &dependencies {
            if let Some(library) = self.deploy_library(reference, out_dir) {
                deployed.push(library);
            }
        }

        // Fixups run strictly after all copies, never interleaved.
        self.post_deploy(binary, &deployed);

        if !deployed.is_empty() {
            let noun = if deployed.len() == 1 {
                "library"
            } else {
                "libraries"
            };
            info!(
                "deployed {} shared {noun} for {}",
                deployed.len(),
                binary.file_name().unwrap_or(binary.as_str())
            );
        }

        deployed.len()
    }
}
