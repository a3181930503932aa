//! Evidence Writer
//!
//! Moves an [`ArtifactTree`] to and from disk. The tree is the unit of
//! comparison; the filesystem only stores it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::core::error::{SspError, SspResult};
use crate::evidence::artifacts::ArtifactTree;

/// Write every file of `tree` under `root`, creating folders as needed.
pub fn write_tree(root: &Path, tree: &ArtifactTree) -> SspResult<()> {
    for (rel, bytes) in tree.iter() {
        let path = join_relative(root, rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SspError::io(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| SspError::io(&path, e))?;
    }
    debug!(root = %root.display(), files = tree.len(), "evidence tree written");
    Ok(())
}

/// Read every regular file under `root` into a tree.
///
/// Paths are keyed by their `/`-joined components relative to `root`.
/// Names that are not valid UTF-8 are rejected.
pub fn read_tree(root: &Path) -> SspResult<ArtifactTree> {
    let mut tree = ArtifactTree::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = relative_key(root, path)?;
        let bytes = fs::read(path).map_err(|e| SspError::io(path, e))?;
        tree.insert(rel, bytes);
    }
    Ok(tree)
}

fn relative_key(root: &Path, path: &Path) -> SspResult<String> {
    let invalid = |kind: io::ErrorKind, msg: &str| SspError::io(path, io::Error::new(kind, msg));
    let rel = path
        .strip_prefix(root)
        .map_err(|_| invalid(io::ErrorKind::InvalidInput, "path outside evidence root"))?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid(io::ErrorKind::InvalidData, "file name is not UTF-8"))?;
    Ok(parts.join("/"))
}

fn walk_error(root: &Path, err: walkdir::Error) -> SspError {
    let path = err.path().unwrap_or(root).to_path_buf();
    SspError::io(path, err.into())
}

/// Remove `root` and everything below it. Missing folders are fine.
pub fn remove_tree(root: &Path) -> SspResult<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => {
            debug!(root = %root.display(), "stale evidence removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SspError::io(root, e)),
    }
}

fn join_relative(root: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(root.to_path_buf(), |path, part| path.join(part))
}
