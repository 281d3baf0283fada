//! Behaviour-driven tests for runtime library deployment.
//!
//! These scenarios cover the transitive dependency closure, deployment
//! idempotence, and the versioned-soname alias.

use camino::{Utf8Path, Utf8PathBuf};
use libdeploy::deploy::LibraryDeployer;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Closure world
// ---------------------------------------------------------------------------

/// Deployer over real files in a temp directory, with a dependency graph
/// keyed by filename instead of a binary inspection tool.
struct FileGraphDeployer {
    lib_dir: Utf8PathBuf,
    edges: HashMap<String, Vec<String>>,
}

impl LibraryDeployer for FileGraphDeployer {
    fn platform_name(&self) -> &'static str {
        "test"
    }

    fn library_extension(&self) -> &'static str {
        ".so"
    }

    fn detect_dependencies(&self, binary: &Utf8Path) -> libdeploy::error::Result<Vec<String>> {
        let name = binary.file_name().unwrap_or_default();
        Ok(self.edges.get(name).cloned().unwrap_or_default())
    }

    fn is_deployable(&self, reference: &str) -> bool {
        reference != "libc.so.6"
    }

    fn find_in_toolchain(&self, reference: &str) -> Option<Utf8PathBuf> {
        let candidate = self.lib_dir.join(reference);
        candidate.as_std_path().exists().then_some(candidate)
    }
}

struct DeploymentWorld {
    binary: RefCell<Utf8PathBuf>,
    out_dir: RefCell<Utf8PathBuf>,
    deployer: RefCell<Option<FileGraphDeployer>>,
    first_count: RefCell<Option<usize>>,
    second_count: RefCell<Option<usize>>,
    // Keep the temp dir alive for the lifetime of the test.
    _temp_dir: RefCell<Option<TempDir>>,
}

impl Default for DeploymentWorld {
    fn default() -> Self {
        Self {
            binary: RefCell::new(Utf8PathBuf::new()),
            out_dir: RefCell::new(Utf8PathBuf::new()),
            deployer: RefCell::new(None),
            first_count: RefCell::new(None),
            second_count: RefCell::new(None),
            _temp_dir: RefCell::new(None),
        }
    }
}

#[fixture]
fn deployment_world() -> DeploymentWorld {
    DeploymentWorld::default()
}

#[given("a linked binary with transitive toolchain dependencies")]
fn given_binary_with_deps(deployment_world: &DeploymentWorld) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_owned()).expect("temp dir not UTF-8");

    let lib_dir = root.join("toolchain-lib");
    let out_dir = root.join("build");
    fs::create_dir_all(&lib_dir).expect("failed to create lib dir");
    fs::create_dir_all(&out_dir).expect("failed to create out dir");

    let binary = out_dir.join("app");
    fs::write(&binary, b"binary").expect("failed to write binary");
    for lib in ["libalpha.so.1", "libbeta.so.1", "libgamma.so.1"] {
        fs::write(lib_dir.join(lib), lib.as_bytes()).expect("failed to write library");
    }

    // app -> alpha -> {beta, libc}, beta -> gamma
    let edges = HashMap::from([
        ("app".to_owned(), vec!["libalpha.so.1".to_owned()]),
        (
            "libalpha.so.1".to_owned(),
            vec!["libbeta.so.1".to_owned(), "libc.so.6".to_owned()],
        ),
        ("libbeta.so.1".to_owned(), vec!["libgamma.so.1".to_owned()]),
        ("libgamma.so.1".to_owned(), Vec::new()),
    ]);

    deployment_world
        .deployer
        .replace(Some(FileGraphDeployer { lib_dir, edges }));
    deployment_world.binary.replace(binary);
    deployment_world.out_dir.replace(out_dir);
    deployment_world._temp_dir.replace(Some(temp_dir));
}

#[when("its libraries are deployed")]
fn when_deployed(deployment_world: &DeploymentWorld) {
    let deployer = deployment_world.deployer.borrow();
    let deployer = deployer.as_ref().expect("deployer not set");
    let count = deployer.deploy_all(&deployment_world.binary.borrow());
    deployment_world.first_count.replace(Some(count));
}

#[when("its libraries are deployed again")]
fn when_deployed_again(deployment_world: &DeploymentWorld) {
    let deployer = deployment_world.deployer.borrow();
    let deployer = deployer.as_ref().expect("deployer not set");
    let count = deployer.deploy_all(&deployment_world.binary.borrow());
    deployment_world.second_count.replace(Some(count));
}

#[then("every library in the closure sits beside the binary")]
fn then_closure_deployed(deployment_world: &DeploymentWorld) {
    let count = deployment_world
        .first_count
        .borrow()
        .expect("deployment did not run");
    assert_eq!(count, 3);

    let out_dir = deployment_world.out_dir.borrow();
    for lib in ["libalpha.so.1", "libbeta.so.1", "libgamma.so.1"] {
        let deployed = out_dir.join(lib);
        assert!(
            deployed.as_std_path().exists(),
            "expected {deployed} to exist"
        );
        assert_eq!(
            fs::read(deployed.as_std_path()).expect("failed to read deployed library"),
            lib.as_bytes()
        );
    }
    assert!(!out_dir.join("libc.so.6").as_std_path().exists());
}

#[then("the second pass reports zero copies")]
fn then_second_pass_is_noop(deployment_world: &DeploymentWorld) {
    assert_eq!(
        deployment_world.first_count.borrow().expect("first pass"),
        3
    );
    assert_eq!(
        deployment_world.second_count.borrow().expect("second pass"),
        0
    );
}

// ---------------------------------------------------------------------------
// Soname alias world (Unix only - relies on symlinks)
// ---------------------------------------------------------------------------

#[cfg(unix)]
use soname_alias::SonameWorld;
#[cfg(unix)]
use soname_alias::soname_world;

#[cfg(unix)]
mod soname_alias {
    use super::*;
    use libdeploy::linux::ElfDeployer;
    use libdeploy::toolchain::{Arch, ToolchainLayout};

    pub struct SonameWorld {
        deployer: RefCell<Option<ElfDeployer>>,
        out_dir: RefCell<Utf8PathBuf>,
        _temp_dir: RefCell<Option<TempDir>>,
    }

    impl Default for SonameWorld {
        fn default() -> Self {
            Self {
                deployer: RefCell::new(None),
                out_dir: RefCell::new(Utf8PathBuf::new()),
                _temp_dir: RefCell::new(None),
            }
        }
    }

    #[fixture]
    pub fn soname_world() -> SonameWorld {
        SonameWorld::default()
    }

    #[given("a toolchain library with a versioned soname")]
    pub fn given_versioned_library(soname_world: &SonameWorld) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_owned()).expect("temp dir not UTF-8");

        let lib_dir = root.join("lib");
        let out_dir = root.join("build");
        fs::create_dir_all(&lib_dir).expect("failed to create lib dir");
        fs::create_dir_all(&out_dir).expect("failed to create out dir");
        fs::write(lib_dir.join("libc++.so.1.0"), b"payload").expect("failed to write library");
        std::os::unix::fs::symlink("libc++.so.1.0", lib_dir.join("libc++.so.1"))
            .expect("failed to create symlink");

        soname_world
            .deployer
            .replace(Some(ElfDeployer::new(ToolchainLayout::new(root), Arch::X86_64)));
        soname_world.out_dir.replace(out_dir);
        soname_world._temp_dir.replace(Some(temp_dir));
    }

    #[when("the reference is deployed")]
    pub fn when_reference_deployed(soname_world: &SonameWorld) {
        let deployer = soname_world.deployer.borrow();
        let deployer = deployer.as_ref().expect("deployer not set");
        let deployed = deployer
            .deploy_library("libc++.so.1", &soname_world.out_dir.borrow())
            .expect("expected a fresh deployment");
        assert_eq!(deployed.deployed_name, "libc++.so.1.0");
    }

    #[then("the output directory holds the real file and an alias symlink")]
    pub fn then_real_file_and_alias(soname_world: &SonameWorld) {
        let out_dir = soname_world.out_dir.borrow();

        let real = out_dir.join("libc++.so.1.0");
        assert_eq!(
            fs::read(real.as_std_path()).expect("failed to read deployed file"),
            b"payload"
        );

        let alias = out_dir.join("libc++.so.1");
        let target = fs::read_link(alias.as_std_path()).expect("alias is not a symlink");
        assert_eq!(target.to_str(), Some("libc++.so.1.0"));
    }
}

// ---------------------------------------------------------------------------
// Stubbed probe world
// ---------------------------------------------------------------------------

use stubbed_probe::StubbedProbeWorld;
use stubbed_probe::stubbed_probe_world;

mod stubbed_probe {
    use super::*;
    use libdeploy::linux::ElfDeployer;
    use libdeploy::test_utils::{StubExecutor, failure_output};
    use libdeploy::toolchain::{Arch, ToolchainLayout};

    pub struct StubbedProbeWorld {
        deployer: RefCell<Option<ElfDeployer>>,
        binary: RefCell<Utf8PathBuf>,
        count: RefCell<Option<usize>>,
        _temp_dir: RefCell<Option<TempDir>>,
    }

    impl Default for StubbedProbeWorld {
        fn default() -> Self {
            Self {
                deployer: RefCell::new(None),
                binary: RefCell::new(Utf8PathBuf::new()),
                count: RefCell::new(None),
                _temp_dir: RefCell::new(None),
            }
        }
    }

    #[fixture]
    pub fn stubbed_probe_world() -> StubbedProbeWorld {
        StubbedProbeWorld::default()
    }

    #[given("a binary whose dependency probe fails")]
    pub fn given_failing_probe(stubbed_probe_world: &StubbedProbeWorld) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_owned()).expect("temp dir not UTF-8");

        let binary = root.join("app");
        fs::write(&binary, b"binary").expect("failed to write binary");

        let executor = StubExecutor::single(
            "readelf",
            &["-d", binary.as_str()],
            Ok(failure_output("not an ELF file")),
        );
        let deployer = ElfDeployer::with_executor(
            ToolchainLayout::new(Utf8PathBuf::from("/nonexistent")),
            Arch::X86_64,
            Box::new(executor),
        );

        stubbed_probe_world.deployer.replace(Some(deployer));
        stubbed_probe_world.binary.replace(binary);
        stubbed_probe_world._temp_dir.replace(Some(temp_dir));
    }

    #[when("deployment runs against the stubbed probe")]
    pub fn when_deployment_runs(stubbed_probe_world: &StubbedProbeWorld) {
        let deployer = stubbed_probe_world.deployer.borrow();
        let deployer = deployer.as_ref().expect("deployer not set");
        let count = deployer.deploy_all(&stubbed_probe_world.binary.borrow());
        stubbed_probe_world.count.replace(Some(count));
    }

    #[then("no libraries are copied")]
    pub fn then_nothing_copied(stubbed_probe_world: &StubbedProbeWorld) {
        assert_eq!(
            stubbed_probe_world.count.borrow().expect("count not set"),
            0
        );
    }
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/deployment.feature", index = 0)]
fn scenario_deploy_transitive_closure(deployment_world: DeploymentWorld) {
    let _ = deployment_world;
}

#[scenario(path = "tests/features/deployment.feature", index = 1)]
fn scenario_repeat_deployment_is_noop(deployment_world: DeploymentWorld) {
    let _ = deployment_world;
}

#[cfg(unix)]
#[scenario(path = "tests/features/deployment.feature", index = 2)]
fn scenario_versioned_soname_alias(soname_world: SonameWorld) {
    let _ = soname_world;
}

#[scenario(path = "tests/features/deployment.feature", index = 3)]
fn scenario_failed_probe_deploys_nothing(stubbed_probe_world: StubbedProbeWorld) {
    let _ = stubbed_probe_world;
}
