//! Collision-safe move of a source file to its new name.
//!
//! [`unique_path`] tries `name.pdf`, `name (1).pdf`, `name (2).pdf`, … until
//! it finds an unused path; [`relocate`] then moves the file there with a
//! single `rename`. Choosing a name and moving onto it is not transactional:
//! two writers targeting the same directory at once can race. One batch per
//! output directory at a time is assumed.

use crate::error::ItemError;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// First unused path for `filename` inside `dir`.
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !occupied(&candidate) {
        return candidate;
    }

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from(filename));
    let ext = name.extension();

    (1u64..)
        .map(|i| {
            let mut numbered = stem.clone();
            numbered.push(format!(" ({i})"));
            if let Some(ext) = ext {
                numbered.push(".");
                numbered.push(ext);
            }
            dir.join(numbered)
        })
        .find(|p| !occupied(p))
        .unwrap_or(candidate)
}

/// `symlink_metadata` so a dangling symlink still counts as taken.
fn occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Move `source` into `dir` under `filename` (or a numbered variant).
///
/// Creates `dir` if needed. When the file already carries its target name it
/// is left where it is. Returns the final path.
pub fn relocate(source: &Path, dir: &Path, filename: &str) -> Result<PathBuf, ItemError> {
    let move_err = |to: &Path, e: io::Error| ItemError::Move {
        from: source.to_path_buf(),
        to: to.to_path_buf(),
        cause: e.to_string(),
    };

    std::fs::create_dir_all(dir).map_err(|e| move_err(dir, e))?;

    if already_named(source, dir, filename) {
        info!("{} already has its target name", source.display());
        return Ok(source.to_path_buf());
    }

    let target = unique_path(dir, filename);
    debug!("Resolved {} → {}", source.display(), target.display());

    match std::fs::rename(source, &target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                "{} and {} are on different filesystems; copying",
                source.display(),
                target.display()
            );
            copy_then_remove(source, dir, &target).map_err(|e| move_err(&target, e))?;
        }
        Err(e) => return Err(move_err(&target, e)),
    }

    info!("Moved {} → {}", source.display(), target.display());
    Ok(target)
}

/// Whether `source` already sits in `dir` under `filename` or one of its
/// numbered variants (`stem (n).ext`), as left by an earlier run.
fn already_named(source: &Path, dir: &Path, filename: &str) -> bool {
    let same_dir = match (source.parent(), std::fs::canonicalize(dir)) {
        (Some(parent), Ok(dir)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            std::fs::canonicalize(parent).is_ok_and(|p| p == dir)
        }
        _ => false,
    };
    if !same_dir {
        return false;
    }

    match source.file_name().and_then(|n| n.to_str()) {
        Some(name) => name == filename || is_numbered_variant(name, filename),
        None => false,
    }
}

/// `name` is `filename` with a ` (n)` counter before the extension, n ≥ 1.
fn is_numbered_variant(name: &str, filename: &str) -> bool {
    let wanted = Path::new(filename);
    let Some(stem) = wanted.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = match wanted.extension().map(|e| e.to_str()) {
        Some(Some(e)) => format!(".{e}"),
        Some(None) => return false,
        None => String::new(),
    };

    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_suffix(ext.as_str()))
        .and_then(|rest| rest.strip_prefix(" ("))
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|n| !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit()))
        .is_some_and(|n| n.parse::<u64>().is_ok())
}

/// Copy into a temp file beside `target`, publish it without clobbering, then
/// drop the source.
///
/// Once the copy is published the move has happened: a source that cannot be
/// removed afterwards is logged and left behind.
fn copy_then_remove(source: &Path, dir: &Path, target: &Path) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".millsheet-")
        .suffix(".part")
        .tempfile_in(dir)?;
    let mut reader = std::fs::File::open(source)?;
    io::copy(&mut reader, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(target).map_err(|e| e.error)?;

    if let Err(e) = std::fs::remove_file(source) {
        warn!(
            "Copied {} → {} but could not remove the source: {}",
            source.display(),
            target.display(),
            e
        );
    }
    Ok(())
}
