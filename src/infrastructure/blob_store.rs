// Blob Store - upload acceptance, storage keys and public URL resolution
// The core only ever sees opaque keys; this module owns where bytes live

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, FieldErrors};

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// What an upload is for; decides the accepted types, size cap and directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    ProfilePicture,
    CoverPhoto,
    PostMedia,
}

impl UploadKind {
    pub fn directory(&self) -> &'static str {
        match self {
            UploadKind::ProfilePicture => "profile_pictures",
            UploadKind::CoverPhoto => "cover_photos",
            UploadKind::PostMedia => "posts",
        }
    }

    /// Request field the upload arrives in.
    pub fn field(&self) -> &'static str {
        match self {
            UploadKind::ProfilePicture => "profile_picture",
            UploadKind::CoverPhoto => "cover_photo",
            UploadKind::PostMedia => "media",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::ProfilePicture | UploadKind::CoverPhoto => &["jpg", "jpeg", "png"],
            UploadKind::PostMedia => &["jpg", "jpeg", "png", "mp4", "mov", "avi"],
        }
    }

    pub fn allowed_mimes(&self) -> &'static [&'static str] {
        match self {
            UploadKind::ProfilePicture | UploadKind::CoverPhoto => &["image/jpeg", "image/png"],
            UploadKind::PostMedia => &[
                "image/jpeg",
                "image/png",
                "video/mp4",
                "video/quicktime",
                "video/x-msvideo",
            ],
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadKind::ProfilePicture | UploadKind::CoverPhoto => 2 * MIB,
            UploadKind::PostMedia => 10 * MIB,
        }
    }
}

/// Deduce a media type from the leading bytes of a file.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"AVI " {
        return Some("video/x-msvideo");
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(match &bytes[8..12] {
            b"qt  " => "video/quicktime",
            _ => "video/mp4",
        });
    }
    None
}

/// A file received from a client, before it has been stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Declared type, if the client sent a specific one.
    fn declared_mime(&self) -> Option<Result<mime::Mime, mime::FromStrError>> {
        self.content_type
            .as_deref()
            .map(str::parse::<mime::Mime>)
            .filter(|parsed| !matches!(parsed, Ok(m) if *m == mime::APPLICATION_OCTET_STREAM))
    }

    /// True when both the declared type and the file contents are allowed for `kind`.
    fn type_matches(&self, kind: UploadKind) -> bool {
        let allowed = kind.allowed_mimes();
        let declared_ok = match self.declared_mime() {
            None => true,
            Some(Ok(declared)) => allowed.contains(&declared.essence_str()),
            Some(Err(e)) => {
                debug!("Unparseable upload content type: {}", e);
                false
            }
        };
        let sniffed = sniff_mime(&self.bytes);
        if declared_ok && sniffed.is_none() {
            warn!(file_name = %self.file_name, "Upload contents match no known media type");
        }
        declared_ok && sniffed.is_some_and(|sniffed| allowed.contains(&sniffed))
    }

    /// Check type and size against `kind`; returns the normalised extension.
    pub fn validate(&self, kind: UploadKind) -> AppResult<String> {
        let field = kind.field();
        let allowed = kind.allowed_extensions();
        let mut errors = FieldErrors::new();

        let extension = self.extension().filter(|ext| allowed.contains(&ext.as_str()));
        if extension.is_none() || !self.type_matches(kind) {
            errors.add(
                field,
                format!("The {} must be a file of type: {}.", field, allowed.join(", ")),
            );
        }
        if self.bytes.len() > kind.max_bytes() {
            errors.add(
                field,
                format!(
                    "The {} may not be greater than {} kilobytes.",
                    field,
                    kind.max_bytes() / KIB
                ),
            );
        }

        errors.into_result()?;
        extension.ok_or_else(|| AppError::Internal("validated upload lost its extension".into()))
    }
}

/// Storage collaborator: persists uploads and turns keys into fetchable URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store an upload and return its opaque key.
    async fn store(&self, kind: UploadKind, upload: Upload) -> AppResult<String>;

    /// Remove a stored key; a key that is already gone is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Public URL for a stored key.
    fn url(&self, key: &str) -> String;

    /// Public URL for a bundled static asset such as the default avatar.
    fn asset_url(&self, asset: &str) -> String;
}

/// True for references that already point outside the blob store.
pub fn is_external_url(reference: &str) -> bool {
    reference.starts_with("https://") || reference.starts_with("http://")
}

/// Resolve a stored media reference: external URLs pass through, keys go
/// through the blob store.
pub fn resolve_media_url(store: &dyn BlobStore, reference: Option<&str>) -> Option<String> {
    reference.map(|reference| {
        if is_external_url(reference) {
            reference.to_string()
        } else {
            store.url(reference)
        }
    })
}

/// Filesystem-backed store served under `<public_url>/storage`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn random_name() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(40)
            .map(char::from)
            .collect()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, kind: UploadKind, upload: Upload) -> AppResult<String> {
        let extension = upload.validate(kind)?;
        let key = format!("{}/{}.{}", kind.directory(), Self::random_name(), extension);

        let directory = self.root.join(kind.directory());
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            AppError::Internal(format!("Failed to create {}: {}", directory.display(), e))
        })?;

        let path = self.root.join(&key);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!(key = %key, bytes = upload.bytes.len(), "Stored upload");
        Ok(key)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::Internal(format!("Refusing to delete blob key {}", key)));
        }

        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/storage/{}", self.public_url, key.trim_start_matches('/'))
    }

    fn asset_url(&self, asset: &str) -> String {
        format!("{}/{}", self.public_url, asset.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `size` bytes starting with a signature that fits the extension.
    fn upload(name: &str, size: usize) -> Upload {
        let lower = name.to_ascii_lowercase();
        let signature: &[u8] = if lower.ends_with(".png") {
            b"\x89PNG\r\n\x1a\n"
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            &[0xFF, 0xD8, 0xFF, 0xE0]
        } else {
            b"\0\0\0\x18ftypmp42"
        };
        let mut bytes = signature.to_vec();
        bytes.resize(size.max(signature.len()), 0);
        Upload {
            file_name: name.to_string(),
            content_type: None,
            bytes,
        }
    }

    #[tokio::test]
    async fn test_store_writes_under_kind_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000/");

        let key = store
            .store(UploadKind::PostMedia, upload("clip.MP4", 128))
            .await
            .unwrap();

        assert!(key.starts_with("posts/"));
        assert!(key.ends_with(".mp4"));
        assert_eq!(std::fs::read(dir.path().join(&key)).unwrap().len(), 128);
        assert_eq!(
            store.url(&key),
            format!("http://localhost:3000/storage/{}", key)
        );
    }

    #[tokio::test]
    async fn test_delete_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000");
        let key = store
            .store(UploadKind::PostMedia, upload("a.png", 32))
            .await
            .unwrap();

        store.delete(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        // Already gone.
        store.delete(&key).await.unwrap();
        assert!(store.delete("../outside.png").await.is_err());
    }

    #[tokio::test]
    async fn test_avatar_policy_rejects_video_and_oversize() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000");

        let err = store
            .store(UploadKind::ProfilePicture, upload("me.mp4", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .store(UploadKind::CoverPhoto, upload("wide.png", 2 * MIB + 1))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("cover_photo").is_some()),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sniffs_leading_bytes() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\nrest"), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xDB]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"\0\0\0\x14ftypqt  "), Some("video/quicktime"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0AVI LIST"), Some("video/x-msvideo"));
        assert_eq!(sniff_mime(b"just some text"), None);
    }

    #[test]
    fn test_text_disguised_as_png_is_rejected() {
        let disguised = Upload {
            file_name: "cat.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: b"definitely not an image".to_vec(),
        };
        match disguised.validate(UploadKind::PostMedia) {
            Err(AppError::Validation(errors)) => assert!(errors.get("media").is_some()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_declared_type_must_be_allowed() {
        let mut avatar = upload("me.png", 64);
        avatar.content_type = Some("text/html".to_string());
        assert!(avatar.validate(UploadKind::ProfilePicture).is_err());

        avatar.content_type = Some("image/png; charset=binary".to_string());
        assert_eq!(avatar.validate(UploadKind::ProfilePicture).unwrap(), "png");

        avatar.content_type = Some("application/octet-stream".to_string());
        assert_eq!(avatar.validate(UploadKind::ProfilePicture).unwrap(), "png");

        // Video contents under an image extension.
        let mut swapped = upload("clip.mp4", 64);
        swapped.file_name = "clip.png".to_string();
        assert!(swapped.validate(UploadKind::ProfilePicture).is_err());
    }

    #[test]
    fn test_external_urls_pass_through() {
        let store = LocalBlobStore::new("/tmp/unused", "http://cdn.local");
        assert_eq!(
            resolve_media_url(&store, Some("https://images.example.com/a.png")).as_deref(),
            Some("https://images.example.com/a.png")
        );
        assert_eq!(
            resolve_media_url(&store, Some("posts/abc.png")).as_deref(),
            Some("http://cdn.local/storage/posts/abc.png")
        );
        assert_eq!(resolve_media_url(&store, None), None);
    }
}
