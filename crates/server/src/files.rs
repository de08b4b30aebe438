//! Upload file lifecycle.
//!
//! Files live under `<uploads root>/<entity>/<uuid>.<ext>` and are referenced
//! from the database by their public URL `/uploads/<entity>/<uuid>.<ext>`.
//! The database row is the authority: an orphaned file is tolerated, a row
//! pointing at a missing file is not. Hence:
//!
//! - files are deleted only after the transaction that removed their rows has
//!   committed ([`FileStore::cleanup`]);
//! - files written for a request whose transaction failed are removed before
//!   the error is returned ([`FileStore::discard`]);
//! - both are best-effort and only log failures.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Default URL prefix under which uploads are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MAX_EXTENSION_LEN: usize = 8;

/// Errors from the upload store.
#[derive(Debug, Error)]
pub enum FileError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// URL does not point inside the uploads directory.
    #[error("invalid upload URL: {0}")]
    InvalidUrl(String),
}

/// Entity directory an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Product,
    Certificate,
    Carousel,
    Partnership,
    Review,
}

impl UploadKind {
    /// Directory name under the uploads root.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Certificate => "certificates",
            Self::Carousel => "homepage",
            Self::Partnership => "partnership",
            Self::Review => "reviews",
        }
    }
}

/// A file received from the client, not yet on disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name as sent by the client.
    pub original_name: String,
    /// MIME type as sent by the client.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// A file written to the uploads directory for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Public URL stored in the database.
    pub url: String,
    /// File name as sent by the client.
    pub original_name: String,
    /// MIME type as sent by the client.
    pub content_type: Option<String>,
}

/// Upload store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    public_prefix: String,
}

impl FileStore {
    /// Create a store rooted at `root` (created lazily on first save) whose
    /// files are served under `public_prefix`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let public_prefix: String = public_prefix.into();
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of a stored file.
    #[must_use]
    pub fn url_for(&self, kind: UploadKind, file_name: &str) -> String {
        format!("{}/{}/{file_name}", self.public_prefix, kind.dir())
    }

    /// The uploads root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload to disk under a generated name.
    ///
    /// # Errors
    ///
    /// Returns `FileError::Io` if the directory or file cannot be written.
    pub async fn save(&self, kind: UploadKind, file: UploadedFile) -> Result<StoredFile, FileError> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| FileError::Io {
                path: dir.clone(),
                source,
            })?;

        let file_name = match extension_of(&file.original_name) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let path = dir.join(&file_name);

        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "stored upload");

        Ok(StoredFile {
            url: self.url_for(kind, &file_name),
            original_name: file.original_name,
            content_type: file.content_type,
        })
    }

    /// Map a public URL to its path under the uploads root.
    ///
    /// # Errors
    ///
    /// Returns `FileError::InvalidUrl` for URLs outside the public prefix or with
    /// anything other than plain path segments.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, FileError> {
        let relative = url
            .strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| FileError::InvalidUrl(url.to_string()))?;

        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(FileError::InvalidUrl(url.to_string()));
        }

        Ok(self.root.join(relative))
    }

    /// Delete the file behind `url`.
    ///
    /// Returns `Ok(false)` when the file was already absent, so deleting twice
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns `FileError::InvalidUrl` for URLs outside the uploads directory
    /// and `FileError::Io` for any failure other than "not found".
    pub async fn delete(&self, url: &str) -> Result<bool, FileError> {
        let path = self.resolve(url)?;

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?;
        if !exists {
            return Ok(false);
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            // Removed by someone else between the check and the unlink.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(FileError::Io { path, source }),
        }
    }

    /// Best-effort delete of files whose rows were removed by a committed
    /// transaction.
    pub async fn cleanup<S: AsRef<str> + Sync>(&self, urls: &[S]) {
        for url in urls {
            let url = url.as_ref();
            match self.delete(url).await {
                Ok(true) => tracing::debug!(url, "deleted upload"),
                Ok(false) => tracing::debug!(url, "upload already absent"),
                Err(e) => tracing::warn!(url, error = %e, "failed to delete upload"),
            }
        }
    }

    /// Remove the files written for a request whose transaction failed.
    pub async fn discard(&self, files: &[StoredFile]) {
        if files.is_empty() {
            return;
        }
        tracing::info!(count = files.len(), "discarding uploads of failed request");
        let urls: Vec<&str> = files.iter().map(|f| f.url.as_str()).collect();
        self.cleanup(&urls).await;
    }
}

/// Lowercased alphanumeric extension of a client file name, if any.
fn extension_of(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("weird.p$p"), None);
        assert_eq!(extension_of("long.abcdefghij"), None);
    }

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let store = FileStore::new("/srv/uploads", "/media/");
        assert_eq!(
            store.url_for(UploadKind::Certificate, "a.pdf"),
            "/media/certificates/a.pdf"
        );
    }

    #[test]
    fn test_resolve_maps_under_root() {
        let store = FileStore::new("/srv/uploads", PUBLIC_PREFIX);
        assert_eq!(
            store.resolve("/uploads/products/a.png").unwrap(),
            PathBuf::from("/srv/uploads/products/a.png")
        );
    }

    #[test]
    fn test_resolve_rejects_foreign_and_traversal_urls() {
        let store = FileStore::new("/srv/uploads", PUBLIC_PREFIX);
        assert!(matches!(
            store.resolve("/static/a.png"),
            Err(FileError::InvalidUrl(_))
        ));
        assert!(matches!(
            store.resolve("/uploads/../etc/passwd"),
            Err(FileError::InvalidUrl(_))
        ));
        assert!(matches!(
            store.resolve("/uploads/"),
            Err(FileError::InvalidUrl(_))
        ));
        assert!(matches!(
            store.resolve("/uploadsX/a.png"),
            Err(FileError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_save_writes_under_entity_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), PUBLIC_PREFIX);

        let stored = store.save(UploadKind::Product, png("front.PNG")).await.unwrap();

        assert!(stored.url.starts_with("/uploads/products/"));
        assert!(stored.url.ends_with(".png"));
        assert_eq!(stored.original_name, "front.PNG");
        let path = store.resolve(&stored.url).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), PUBLIC_PREFIX);
        let stored = store.save(UploadKind::Review, png("me.png")).await.unwrap();

        assert!(store.delete(&stored.url).await.unwrap());
        assert!(!store.delete(&stored.url).await.unwrap());
        assert!(!store.resolve(&stored.url).unwrap().exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), PUBLIC_PREFIX);
        assert!(!store.delete("/uploads/products/never-existed.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_discard_removes_request_uploads() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), PUBLIC_PREFIX);
        let first = store.save(UploadKind::Carousel, png("1.png")).await.unwrap();
        let second = store.save(UploadKind::Carousel, png("2.png")).await.unwrap();

        store.discard(&[first.clone(), second.clone()]).await;

        assert!(!store.resolve(&first.url).unwrap().exists());
        assert!(!store.resolve(&second.url).unwrap().exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_invalid_and_missing_urls() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), PUBLIC_PREFIX);
        let kept = store.save(UploadKind::Partnership, png("keep.png")).await.unwrap();

        store
            .cleanup(&["/elsewhere/x.png", "/uploads/partnership/gone.png"])
            .await;

        assert!(store.resolve(&kept.url).unwrap().exists());
    }
}
