//! Directory moves between the build root and the cache

use kiln_errors::{Error, StorageError};
use std::path::Path;
use tokio::fs;

/// Recursively copy directory contents
///
/// # Errors
///
/// Returns an error if any directory or file cannot be read or written.
pub async fn copy_directory_recursive(src: &Path, dst: &Path) -> Result<(), Error> {
    fs::create_dir_all(dst).await?;

    let mut entries = fs::read_dir(src)
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, src))?;
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type().await?.is_dir() {
            Box::pin(copy_directory_recursive(&entry_path, &dst_path)).await?;
        } else {
            fs::copy(&entry_path, &dst_path).await?;
        }
    }

    Ok(())
}

/// Move `src` to `dst`, copying when a rename is not possible
///
/// # Errors
///
/// Returns an error if neither a rename nor a copy succeeds.
pub async fn move_directory(src: &Path, dst: &Path) -> Result<(), Error> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::from_io_with_path(&e, src).into())
        }
        Err(e) => {
            tracing::debug!(src = %src.display(), error = %e, "rename failed, copying instead");
            copy_directory_recursive(src, dst).await?;
            fs::remove_dir_all(src)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, src))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_copy_directory_recursive() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("lib/cmake")).await.unwrap();
        fs::write(src.join("lib/cmake/zlib-config.cmake"), "# config")
            .await
            .unwrap();

        let dst = temp.path().join("dst");
        copy_directory_recursive(&src, &dst).await.unwrap();
        assert_eq!(
            fs::read_to_string(dst.join("lib/cmake/zlib-config.cmake"))
                .await
                .unwrap(),
            "# config"
        );
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let temp = tempdir().unwrap();
        let err = move_directory(&temp.path().join("absent"), &temp.path().join("dst"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::PathNotFound { .. })
        ));
    }
}
