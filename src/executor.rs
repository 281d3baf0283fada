//! Subprocess execution with bounded waits.
//!
//! All binary inspection and patching is delegated to external tools
//! (`llvm-objdump`, `readelf`, `otool`, `install_name_tool`, `codesign`).
//! Every invocation carries a fixed timeout so a wedged tool cannot hang a
//! build; a timeout is handled the same way as any other tool failure.

use crate::error::{DeployError, Result};
use std::io::ErrorKind;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Timeout for dependency probes and install-name rewrites.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for code signing, which can be slow on large binaries.
pub const SIGNING_TIMEOUT: Duration = Duration::from_secs(60);

/// Abstraction for running external commands with a timeout.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ToolUnavailable`] if the command cannot be
    /// found, [`DeployError::ToolTimeout`] if it does not finish within
    /// `timeout`, and [`DeployError::Io`] for other spawn or wait failures.
    fn run(&self, cmd: &str, args: &[&str], timeout: Duration) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str], timeout: Duration) -> Result<Output> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    DeployError::ToolUnavailable {
                        tool: cmd.to_owned(),
                    }
                } else {
                    DeployError::Io(e)
                }
            })?;

        match child.wait_timeout(timeout)? {
            Some(status) => {
                // Completed within the timeout - collect output
                let stdout = child
                    .stdout
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();

                Ok(Output {
                    status,
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                })
            }
            None => {
                // Timeout - kill the process before reporting
                let _ = child.kill();
                let _ = child.wait();
                Err(DeployError::ToolTimeout {
                    tool: cmd.to_owned(),
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

/// Runs a tool and returns its stdout as a string.
///
/// # Errors
///
/// Returns the executor's error unchanged, or [`DeployError::ToolFailed`]
/// if the tool exits with a non-zero status.
pub fn run_tool(
    executor: &dyn CommandExecutor,
    tool: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String> {
    let output = executor.run(tool, args, timeout)?;

    if !output.status.success() {
        return Err(DeployError::ToolFailed {
            tool: tool.to_owned(),
            message: stderr_message(&output),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "unknown error".to_owned()
    } else {
        trimmed.to_owned()
    }
}
