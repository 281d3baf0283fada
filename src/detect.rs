//! Binary format detection.
//!
//! The post-link hook receives a path, not a target triple, so the platform
//! is inferred from the output file itself. The filename extension decides
//! in the common case; extensionless executables are sniffed by magic bytes.

use camino::Utf8Path;
use log::debug;
use std::fs::File;
use std::io::Read;

/// Binary formats with a deployment implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// PE/COFF (Windows).
    Windows,
    /// ELF (Linux).
    Linux,
    /// Mach-O (macOS).
    Darwin,
}

impl Platform {
    /// Platform identifier as used by the deployer factory.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }

    /// Directory name used under the toolchain installation root.
    #[must_use]
    pub const fn install_dir(self) -> &'static str {
        match self {
            Self::Windows => "win",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }
}

/// Returns true when the filename looks like a shared library on any
/// supported platform, including versioned SONAMEs (`libfoo.so.1`).
#[must_use]
pub fn is_shared_library(path: &Utf8Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let lowered = name.to_lowercase();
    lowered.ends_with(".dll")
        || lowered.ends_with(".dylib")
        || lowered.ends_with(".so")
        || lowered.contains(".so.")
}

/// Determines the binary format of an output file.
///
/// Extension first (`.exe`/`.dll`, `.dylib`, `.so`), then the file's magic
/// bytes for extensionless executables. Returns `None` for unreadable files
/// and unrecognized formats.
#[must_use]
pub fn detect_platform(path: &Utf8Path) -> Option<Platform> {
    if let Some(name) = path.file_name() {
        let lowered = name.to_lowercase();
        if lowered.ends_with(".exe") || lowered.ends_with(".dll") {
            return Some(Platform::Windows);
        }
        if lowered.ends_with(".dylib") {
            return Some(Platform::Darwin);
        }
        if lowered.ends_with(".so") || lowered.contains(".so.") {
            return Some(Platform::Linux);
        }
    }

    sniff_magic(path)
}

/// Reads the first four bytes and matches known executable magics.
fn sniff_magic(path: &Utf8Path) -> Option<Platform> {
    let mut magic = [0_u8; 4];
    let mut file = match File::open(path.as_std_path()) {
        Ok(file) => file,
        Err(e) => {
            debug!("could not open {path} for format detection: {e}");
            return None;
        }
    };
    if let Err(e) = file.read_exact(&mut magic) {
        debug!("could not read magic bytes from {path}: {e}");
        return None;
    }

    match magic {
        [0x7f, b'E', b'L', b'F'] => Some(Platform::Linux),
        // Mach-O thin images in both endiannesses, plus fat binaries.
        [0xfe, 0xed, 0xfa, 0xce | 0xcf]
        | [0xce | 0xcf, 0xfa, 0xed, 0xfe]
        | [0xca, 0xfe, 0xba, 0xbe] => Some(Platform::Darwin),
        [b'M', b'Z', ..] => Some(Platform::Windows),
        _ => {
            debug!("unrecognized binary format: {path}");
            None
        }
    }
}
