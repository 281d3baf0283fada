//! Library deployer CLI entrypoint.
//!
//! This binary inspects a linked binary's runtime dependencies and copies
//! the toolchain-provided ones next to it. It is the manual counterpart of
//! the automatic post-link hook.

use camino::Utf8Path;
use clap::Parser;
use libdeploy::cli::Cli;
use libdeploy::detect::detect_platform;
use libdeploy::dirs::{SystemBaseDirs, default_toolchain_root};
use libdeploy::error::{DeployError, Result};
use libdeploy::factory::create_deployer;
use libdeploy::toolchain::{Arch, ToolchainLayout};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let platform = match cli.platform.map(libdeploy::cli::PlatformArg::as_platform) {
        Some(platform) => platform,
        None => match detect_platform(&cli.binary) {
            Some(platform) => platform,
            None => {
                write_stderr_line(
                    stderr,
                    format!(
                        "could not determine the binary format of {}; nothing to deploy",
                        cli.binary
                    ),
                );
                return Ok(());
            }
        },
    };

    let arch = Arch::parse(cli.arch.as_deref().unwrap_or(host_arch()))?;

    let dirs = SystemBaseDirs;
    let root = default_toolchain_root(&dirs, platform.install_dir(), arch.as_str()).ok_or_else(
        || DeployError::ToolchainRoot {
            reason: "could not determine the home directory".to_owned(),
        },
    )?;

    let Some(deployer) = create_deployer(platform.as_str(), arch, ToolchainLayout::new(root))
    else {
        write_stderr_line(
            stderr,
            format!("no library deployer for platform {}", platform.as_str()),
        );
        return Ok(());
    };

    if cli.dry_run {
        write_stderr_line(stderr, "Dry run - no files will be modified");
        write_stderr_line(stderr, "");
        print_resolutions(deployer.as_ref(), &cli.binary, stderr);
        return Ok(());
    }

    if cli.verbose || libdeploy::env_flags::verbose_requested() {
        print_resolutions(deployer.as_ref(), &cli.binary, stderr);
    }

    let count = deployer.deploy_all(&cli.binary);
    if count == 0 {
        write_stderr_line(stderr, "all runtime libraries are already in place");
    } else {
        let noun = if count == 1 { "library" } else { "libraries" };
        write_stderr_line(stderr, format!("deployed {count} {noun}"));
    }

    Ok(())
}

/// Lists the deployable dependency closure and where each entry resolves.
fn print_resolutions(
    deployer: &dyn libdeploy::deploy::LibraryDeployer,
    binary: &Utf8Path,
    stderr: &mut dyn Write,
) {
    let dependencies = deployer.collect_dependencies(binary, true);
    if dependencies.is_empty() {
        write_stderr_line(stderr, "No deployable dependencies found.");
        return;
    }

    write_stderr_line(stderr, "Libraries to deploy:");
    for reference in &dependencies {
        match deployer.find_in_toolchain(reference) {
            Some(source) => {
                write_stderr_line(stderr, format!("  {reference} <- {source}"));
            }
            None => {
                write_stderr_line(stderr, format!("  {reference} (not found in toolchain)"));
            }
        }
    }
}

/// Host architecture string used when no `-a` override is given.
const fn host_arch() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = DeployError::UnsupportedArch {
            arch: "riscv64".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("riscv64"));
    }

    #[test]
    fn unknown_format_reports_and_succeeds() {
        let cli = Cli {
            binary: Utf8PathBuf::from("/nonexistent/blob.dat"),
            ..Cli::default()
        };

        let mut stderr = Vec::new();
        run(&cli, &mut stderr).expect("unknown formats are not an error");

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("could not determine the binary format"));
    }

    #[test]
    fn bad_arch_override_is_an_error() {
        let cli = Cli {
            binary: Utf8PathBuf::from("app.exe"),
            arch: Some("riscv64".to_owned()),
            ..Cli::default()
        };

        let mut stderr = Vec::new();
        let err = run(&cli, &mut stderr).expect_err("expected arch rejection");
        assert!(matches!(err, DeployError::UnsupportedArch { .. }));
    }
}
