use std::path::{Path, PathBuf};

use stacked_errors::{bail, Result, StackableErr};

/// Canonicalizes and checks the existence of a path. Also adds on better
/// information to errors.
///
/// Note: this does not prevent TOCTOU bugs.
pub async fn acquire_path(path_str: impl AsRef<Path>) -> Result<PathBuf> {
    // canonicalization already tests for existence and resolves symbolic links
    let path = path_str.as_ref().to_owned();
    tokio::task::spawn_blocking(move || {
        dunce::canonicalize(&path).stack_err_with(|| format!("acquire_path(path_str: {path:?})"))
    })
    .await
    .stack()?
}

/// Canonicalizes and checks the existence of a directory path. Also adds on
/// better information to errors.
///
/// Note: this does not prevent TOCTOU bugs.
pub async fn acquire_dir_path(dir_path_str: impl AsRef<Path>) -> Result<PathBuf> {
    let dir_path_str = dir_path_str.as_ref();
    let path = acquire_path(dir_path_str)
        .await
        .stack_err_with(|| format!("acquire_dir_path(dir_path_str: {dir_path_str:?})"))?;
    if path.is_dir() {
        Ok(path)
    } else {
        bail!("acquire_dir_path(dir_path_str: {dir_path_str:?}) -> is not a directory")
    }
}

/// Acquires the canonical parent directory of `dir_path_str`
pub async fn acquire_parent_dir_path(dir_path_str: impl AsRef<Path>) -> Result<PathBuf> {
    let dir_path = acquire_dir_path(dir_path_str).await?;
    match dir_path.parent() {
        Some(parent) => acquire_dir_path(parent).await,
        // the filesystem root is its own parent
        None => Ok(dir_path),
    }
}
