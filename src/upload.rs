use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Reduces a client-supplied filename to a safe basename: path
/// components are dropped and anything outside [A-Za-z0-9._-] is
/// replaced. Never trust the wire name.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = safe.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Removes the persisted upload when the request finishes, unless
/// `keep` was called. Uploads otherwise accumulate forever.
pub struct UploadGuard {
    path: PathBuf,
    keep: bool,
}

impl UploadGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leaves the file on disk for auditing.
    pub fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            log::warn!("failed to remove upload {}: {}", self.path.display(), err);
        }
    }
}

/// Writes the upload under a per-request-unique name so concurrent
/// requests with the same client filename cannot clobber each other.
pub async fn persist(
    dir: &Path,
    client_name: &str,
    bytes: &[u8],
) -> std::io::Result<UploadGuard> {
    let filename = format!("{}_{}", Uuid::new_v4(), sanitize_filename(client_name));
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    Ok(UploadGuard { path, keep: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_upload_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sanitize_strips_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\evil.png"), "evil.png");
        assert_eq!(sanitize_filename("C:\\photos\\bug.jpg"), "bug.jpg");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_filename("ant;rm -rf.png"), "ant_rm_-rf.png");
    }

    #[test]
    fn sanitize_never_returns_empty_or_dotfiles() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("/"), "upload");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
    }

    #[tokio::test]
    async fn persisted_upload_is_removed_on_drop() {
        let dir = temp_upload_dir();
        let path = {
            let guard = persist(&dir, "ant.jpg", b"bytes").await.unwrap();
            let path = guard.path().to_path_buf();
            assert!(path.exists());
            assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
            path
        };
        assert!(!path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn kept_upload_survives_the_guard() {
        let dir = temp_upload_dir();
        let guard = persist(&dir, "ant.jpg", b"bytes").await.unwrap();
        let path = guard.path().to_path_buf();
        guard.keep();
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn colliding_client_names_get_distinct_paths() {
        let dir = temp_upload_dir();
        let a = persist(&dir, "same.jpg", b"a").await.unwrap();
        let b = persist(&dir, "same.jpg", b"b").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"b");
        drop(a);
        drop(b);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
