//! Per-file materialization from the cache into a game directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{LinkFailure, ModError, Result};
use crate::fs::LinkMethod;

/// Materialize `src` at `dst` using `method`.
///
/// Parent directories of `dst` are created. `dst` must not exist. Hardlinks
/// across filesystems fail with [`LinkFailure::CrossDevice`]; they are not
/// downgraded to copies.
pub fn link_file(src: &Path, dst: &Path, method: LinkMethod) -> Result<()> {
    let failed = |reason: LinkFailure| ModError::LinkFailed {
        method,
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        reason,
    };

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|err| ModError::io(parent, err))?;
    }

    let result = match method {
        LinkMethod::Symlink => create_file_symlink(src, dst),
        LinkMethod::Hardlink => fs::hard_link(src, dst),
        LinkMethod::Copy => copy_via_temp(src, dst),
    };

    result.map_err(|err| {
        if method == LinkMethod::Hardlink && is_cross_device_os_error(&err) {
            failed(LinkFailure::CrossDevice)
        } else {
            failed(LinkFailure::Io(err.to_string()))
        }
    })
}

/// True when `dst` is a symlink pointing exactly at `src`.
pub fn is_symlink_to(dst: &Path, src: &Path) -> bool {
    fs::read_link(dst)
        .map(|target| same_path(&target, src))
        .unwrap_or(false)
}

/// Remove a file previously placed with `method`.
///
/// Returns `Ok(false)` when nothing exists at `dst`. A symlink-deployed path
/// that is no longer a symlink was replaced by someone else and is left alone.
pub fn unlink_file(dst: &Path, method: LinkMethod) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if method == LinkMethod::Symlink && !meta.file_type().is_symlink() {
        return Err(io::Error::other(format!(
            "{} is no longer a symlink; refusing to remove",
            dst.display()
        )));
    }
    if meta.is_dir() {
        return Err(io::Error::other(format!(
            "{} is a directory; refusing to remove",
            dst.display()
        )));
    }

    fs::remove_file(dst)?;
    Ok(true)
}

pub fn remove_path_if_exists(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Remove empty directories from `start` upward, stopping at (and keeping) `root`.
pub fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        // remove_dir only succeeds on empty directories
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn copy_via_temp(src: &Path, dst: &Path) -> io::Result<()> {
    let tmp = unique_temp_path(dst)?;
    if let Err(err) = fs::copy(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

fn unique_temp_path(dst: &Path) -> io::Result<PathBuf> {
    let parent = dst.parent().ok_or_else(|| {
        io::Error::other(format!("Destination path has no parent: {}", dst.display()))
    })?;
    let base = dst.file_name().ok_or_else(|| {
        io::Error::other(format!("Destination path has no filename: {}", dst.display()))
    })?;

    for attempt in 0u32..1000 {
        let name = if attempt == 0 {
            format!(".{}.tmp.{}", base.to_string_lossy(), std::process::id())
        } else {
            format!(
                ".{}.tmp.{}.{}",
                base.to_string_lossy(),
                std::process::id(),
                attempt
            )
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::other(format!(
        "Failed to allocate a unique temp path for {}",
        dst.display()
    )))
}

fn is_cross_device_os_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(unix)]
    {
        const EXDEV: i32 = 18;
        code == EXDEV
    }

    #[cfg(windows)]
    {
        const ERROR_NOT_SAME_DEVICE: i32 = 17;
        code == ERROR_NOT_SAME_DEVICE
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        false
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    a == b
}

#[cfg(unix)]
fn create_file_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn create_file_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

#[cfg(not(any(unix, windows)))]
fn create_file_symlink(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Symlinks are not supported on this platform",
    ))
}
