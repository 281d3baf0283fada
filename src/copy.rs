//! Race-safe file deployment into an output directory.
//!
//! Independent build invocations may deploy into the same directory at the
//! same time. There is no lock: correctness comes from a timestamp
//! short-circuit, hard links (atomic by construction), and a copy to a
//! uniquely named temp file followed by an atomic rename. A partially
//! written file is never visible under its final name.

use crate::error::{DeployError, Result};
use camino::Utf8Path;
use log::debug;
use std::fs;

/// Deploys `src` to `dest`, returning whether a copy actually happened.
///
/// Algorithm:
/// 1. Skip when `dest` exists and is at least as new as `src`.
/// 2. Best-effort unlink of a stale destination.
/// 3. Prefer a hard link (instant, zero disk space).
/// 4. Fall back to copy-to-temp plus atomic rename.
/// 5. Treat a rename failure with a same-size destination as a benign
///    concurrent-build race and back off.
///
/// # Errors
///
/// Returns an error only for I/O failures that are not attributable to a
/// concurrent deployment of the same file.
pub fn atomic_deploy(src: &Utf8Path, dest: &Utf8Path) -> Result<bool> {
    if let Ok(dest_meta) = fs::metadata(dest.as_std_path()) {
        let src_meta = fs::metadata(src.as_std_path())?;
        if let (Ok(src_mtime), Ok(dest_mtime)) = (src_meta.modified(), dest_meta.modified())
            && src_mtime <= dest_mtime
        {
            debug!("skipped (up-to-date): {}", dest_name(dest));
            return Ok(false);
        }

        // Stale destination: try to remove it. A failure here surfaces at
        // the link/rename step instead.
        if let Err(e) = fs::remove_file(dest.as_std_path()) {
            debug!("could not remove outdated {}: {e}", dest_name(dest));
        }
    }

    if fs::hard_link(src.as_std_path(), dest.as_std_path()).is_ok() {
        debug!("deployed (hard link): {}", dest_name(dest));
        return Ok(true);
    }

    copy_and_rename(src, dest)
}

/// Copy fallback: write a uniquely named temp file beside the destination,
/// then rename it onto the final name.
fn copy_and_rename(src: &Utf8Path, dest: &Utf8Path) -> Result<bool> {
    let dir = dest
        .parent()
        .ok_or_else(|| DeployError::Io(std::io::Error::other("destination has no parent")))?;

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", dest_name(dest)))
        .suffix(".tmp")
        .tempfile_in(dir.as_std_path())?;

    let mut reader = fs::File::open(src.as_std_path())?;
    std::io::copy(&mut reader, temp.as_file_mut())?;

    let permissions = fs::metadata(src.as_std_path())?.permissions();
    fs::set_permissions(temp.path(), permissions)?;
    let temp_len = temp.as_file().metadata()?.len();

    match temp.persist(dest.as_std_path()) {
        Ok(_) => {
            debug!("deployed (copy): {}", dest_name(dest));
            Ok(true)
        }
        Err(persist_error) => {
            // Another process may have won the rename. If the destination
            // now exists with the same size, back off; the temp file is
            // removed when `persist_error.file` drops.
            if let Ok(dest_meta) = fs::metadata(dest.as_std_path())
                && dest_meta.len() == temp_len
            {
                debug!("skipped (concurrent deployment): {}", dest_name(dest));
                return Ok(false);
            }
            Err(DeployError::Io(persist_error.error))
        }
    }
}

/// Creates a relative symlink `link -> target_name` unless `link` exists.
///
/// Used on Linux for the SONAME alias of a versioned library
/// (`libfoo.so.1 -> libfoo.so.1.2.3`). Returns whether a link was created.
///
/// # Errors
///
/// Returns an error if the symlink cannot be created.
#[cfg(unix)]
pub fn symlink_alias(target_name: &str, link: &Utf8Path) -> Result<bool> {
    let link_std = link.as_std_path();
    if link_std.exists() || link_std.is_symlink() {
        return Ok(false);
    }
    std::os::unix::fs::symlink(target_name, link_std)?;
    debug!("created symlink: {} -> {target_name}", dest_name(link));
    Ok(true)
}

/// Symlink aliases are not produced on non-Unix hosts.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn symlink_alias(target_name: &str, link: &Utf8Path) -> Result<bool> {
    debug!(
        "symlink {} -> {target_name} not created (unsupported on this host)",
        dest_name(link)
    );
    Ok(false)
}

fn dest_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}
