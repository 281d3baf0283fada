//! Error types for the library deployment subsystem.
//!
//! Deployment is a post-link convenience step: nothing in this module should
//! ever abort a caller's build. Callers catch these errors at the narrowest
//! scope and downgrade them to log warnings plus a reduced or empty result.

use thiserror::Error;

/// Errors that can occur while detecting or deploying runtime libraries.
#[derive(Debug, Error)]
pub enum DeployError {
    /// An inspection or patching tool could not be found.
    #[error("{tool} not found")]
    ToolUnavailable {
        /// Name of the missing tool.
        tool: String,
    },

    /// An inspection or patching tool did not finish within its timeout.
    #[error("{tool} timed out after {seconds} seconds")]
    ToolTimeout {
        /// Name of the tool that timed out.
        tool: String,
        /// The timeout that expired, in seconds.
        seconds: u64,
    },

    /// An inspection or patching tool exited with a non-zero status.
    #[error("{tool} failed: {message}")]
    ToolFailed {
        /// Name of the failing tool.
        tool: String,
        /// Trimmed stderr of the failing invocation.
        message: String,
    },

    /// The requested architecture has no toolchain layout mapping.
    #[error("unsupported architecture: {arch}")]
    UnsupportedArch {
        /// The architecture string that could not be mapped.
        arch: String,
    },

    /// The toolchain installation root could not be determined.
    #[error("toolchain root unavailable: {reason}")]
    ToolchainRoot {
        /// Description of why the root could not be resolved.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`DeployError`].
pub type Result<T> = std::result::Result<T, DeployError>;
