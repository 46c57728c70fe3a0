//! Moving sanitized-but-original files into an archive directory.
//!
//! A same-named file already in the archive directory is never silently
//! overwritten: a collision gets a numeric suffix instead, so a second run
//! against a same-named file from a different directory never destroys a
//! previous archival copy.

use crate::prelude::*;

/// Move `original_path` into `archive_dir`, creating the directory if
/// needed and resolving any filename collision by appending `.N` before the
/// extension.
pub async fn archive_original(original_path: &Path, archive_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(archive_dir)
        .await
        .with_context(|| format!("failed to create archive directory {}", archive_dir.display()))?;

    let file_name = original_path
        .file_name()
        .context("original path has no file name")?;
    let mut destination = archive_dir.join(file_name);

    let mut attempt = 1u32;
    while tokio::fs::try_exists(&destination).await.unwrap_or(false) {
        destination = archive_dir.join(collision_name(file_name, attempt));
        attempt += 1;
    }

    tokio::fs::rename(original_path, &destination)
        .await
        .with_context(|| {
            format!(
                "failed to move {} into archive at {}",
                original_path.display(),
                destination.display()
            )
        })?;

    Ok(destination)
}

fn collision_name(file_name: &std::ffi::OsStr, attempt: u32) -> PathBuf {
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name).to_string_lossy();
    match path.extension() {
        Some(ext) => PathBuf::from(format!("{stem}.{attempt}.{}", ext.to_string_lossy())),
        None => PathBuf::from(format!("{stem}.{attempt}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archives_into_fresh_directory() {
        let src_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();
        let original = src_dir.path().join("a.pdf");
        tokio::fs::write(&original, b"hello").await.unwrap();

        let archived = archive_original(&original, archive_dir.path()).await.unwrap();
        assert_eq!(archived, archive_dir.path().join("a.pdf"));
        assert!(!original.exists());
        assert_eq!(tokio::fs::read(&archived).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn collision_gets_a_numeric_suffix() {
        let src_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();

        tokio::fs::write(archive_dir.path().join("a.pdf"), b"existing")
            .await
            .unwrap();

        let original = src_dir.path().join("a.pdf");
        tokio::fs::write(&original, b"new").await.unwrap();

        let archived = archive_original(&original, archive_dir.path()).await.unwrap();
        assert_eq!(archived, archive_dir.path().join("a.1.pdf"));
        assert_eq!(
            tokio::fs::read(archive_dir.path().join("a.pdf")).await.unwrap(),
            b"existing"
        );
        assert_eq!(tokio::fs::read(&archived).await.unwrap(), b"new");
    }
}
