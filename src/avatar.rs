/// Avatar image storage on the local filesystem
///
/// Each account has at most one avatar file, `<directory>/<account id>.<ext>`.
/// Files are served under `/public/avatars`.
use crate::error::{BlogError, BlogResult};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Image extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Disk avatar store
#[derive(Clone, Debug)]
pub struct AvatarStore {
    directory: PathBuf,
    public_base: String,
}

impl AvatarStore {
    /// `public_url` is the externally visible server URL
    pub fn new(directory: PathBuf, public_url: &str) -> Self {
        Self {
            directory,
            public_base: format!("{}/public/avatars", public_url.trim_end_matches('/')),
        }
    }

    #[cfg(test)]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Lower-cased extension of `filename` if it is an accepted image type
    pub fn extension_for(filename: &str) -> BlogResult<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| BlogError::Validation("Avatar file must have an extension".to_string()))?;

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(BlogError::Validation(format!(
                "Unsupported avatar type: {}",
                ext
            )));
        }

        Ok(ext)
    }

    fn file_name(account_id: i64, ext: &str) -> String {
        format!("{}.{}", account_id, ext)
    }

    /// Public URL for a stored avatar
    pub fn url_for(&self, account_id: i64, ext: &str) -> String {
        format!("{}/{}", self.public_base, Self::file_name(account_id, ext))
    }

    /// Replace the account's avatar with `data`, returning its public URL
    pub async fn save(&self, account_id: i64, ext: &str, data: &[u8]) -> BlogResult<String> {
        fs::create_dir_all(&self.directory).await?;

        let removed = self.remove_all(account_id).await?;
        if removed > 0 {
            tracing::debug!(account_id, removed, "removed previous avatar files");
        }

        let path = self.directory.join(Self::file_name(account_id, ext));
        fs::write(&path, data).await?;

        tracing::info!(account_id, path = %path.display(), "avatar stored");
        Ok(self.url_for(account_id, ext))
    }

    /// Delete every `<account id>.*` file, returning how many were removed
    pub async fn remove_all(&self, account_id: i64) -> BlogResult<usize> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let stem = account_id.to_string();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str());
            if !matches || !entry.file_type().await?.is_file() {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extension_filter() {
        assert_eq!(AvatarStore::extension_for("me.PNG").unwrap(), "png");
        assert_eq!(AvatarStore::extension_for("a.b.jpeg").unwrap(), "jpeg");
        assert!(AvatarStore::extension_for("script.sh").is_err());
        assert!(AvatarStore::extension_for("noext").is_err());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_file() {
        let dir = tempdir().unwrap();
        let store = AvatarStore::new(dir.path().join("avatars"), "http://localhost:8080/");

        let url = store.save(7, "png", b"first").await.unwrap();
        assert_eq!(url, "http://localhost:8080/public/avatars/7.png");

        store.save(7, "gif", b"second").await.unwrap();
        assert!(!dir.path().join("avatars/7.png").exists());
        assert_eq!(
            std::fs::read(dir.path().join("avatars/7.gif")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn test_remove_all_only_touches_owner() {
        let dir = tempdir().unwrap();
        let store = AvatarStore::new(dir.path().to_path_buf(), "http://localhost:8080");

        store.save(1, "png", b"one").await.unwrap();
        store.save(11, "png", b"eleven").await.unwrap();

        assert_eq!(store.remove_all(1).await.unwrap(), 1);
        assert!(dir.path().join("11.png").exists());
    }

    #[tokio::test]
    async fn test_remove_all_missing_directory() {
        let dir = tempdir().unwrap();
        let store = AvatarStore::new(dir.path().join("absent"), "http://localhost:8080");
        assert_eq!(store.remove_all(3).await.unwrap(), 0);
    }
}
