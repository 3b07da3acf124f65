//! Local file storage for cover images

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;

use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Suffix unique to one write: `<pid>-<nanos>-<sequence>`
fn partial_suffix() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    format!(
        "{}-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

fn storage_error(e: std::io::Error) -> AppError {
    AppError::Storage(e.to_string())
}

/// Reject anything that is not a plain file or directory name
fn check_segment(segment: &str) -> AppResult<()> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !segment.contains(['/', '\\']) => Ok(()),
        _ => Err(AppError::Validation(format!("Invalid file name: {}", segment))),
    }
}

fn content_type_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Join URL parts with single slashes, skipping empty parts
fn join_url(parts: &[&str]) -> String {
    let mut url = String::new();
    for (i, part) in parts.iter().enumerate() {
        let part = if i == 0 {
            part.trim_end_matches('/')
        } else {
            part.trim_matches('/')
        };
        if part.is_empty() {
            continue;
        }
        if !url.is_empty() {
            url.push('/');
        }
        url.push_str(part);
    }
    url
}

#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    public_url: String,
    image_prefix: String,
    static_prefix: String,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_path),
            public_url: config.public_url.clone(),
            image_prefix: config.image_prefix.clone(),
            static_prefix: config.static_prefix.clone(),
        }
    }

    /// Create the storage root if missing
    pub async fn init(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(storage_error)?;
        tracing::info!("Storage root at {}", self.root.display());
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Resolve a `/`-separated path below the root, refusing traversal
    fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            check_segment(segment)?;
            path.push(segment);
        }
        Ok(path)
    }

    fn extension(file: &UploadedFile) -> AppResult<String> {
        let from_name = file
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));

        from_name
            .or_else(|| {
                file.content_type
                    .as_deref()
                    .and_then(content_type_extension)
                    .map(str::to_string)
            })
            .ok_or_else(|| AppError::Validation("Unsupported image type".to_string()))
    }

    /// Store `file` as `<dir>/<name>.<ext>` below the root and return the full path
    pub async fn store(
        &self,
        file: &UploadedFile,
        dir: &str,
        name: &str,
        overwrite: bool,
    ) -> AppResult<PathBuf> {
        if file.bytes.is_empty() {
            return Err(AppError::Validation("Failed to store empty file".to_string()));
        }
        if let Some(ref content_type) = file.content_type {
            if !content_type.starts_with("image/") {
                return Err(AppError::Validation(format!(
                    "Expected an image, got {}",
                    content_type
                )));
            }
        }
        check_segment(name)?;

        let directory = self.resolve(dir)?;
        let target = directory.join(format!("{}.{}", name, Self::extension(file)?));

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(storage_error)?;

        if !overwrite && tokio::fs::try_exists(&target).await.map_err(storage_error)? {
            return Err(AppError::Storage(format!(
                "File {} already exists",
                target.display()
            )));
        }

        // Write beside the target then rename so readers never see a partial file.
        // Each write gets its own partial file; concurrent stores of one name must not share it.
        let partial = directory.join(format!(
            "{}.{}.part",
            target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            partial_suffix()
        ));
        tokio::fs::write(&partial, &file.bytes)
            .await
            .map_err(storage_error)?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(storage_error(e));
        }

        tracing::debug!("Stored {} bytes at {}", file.bytes.len(), target.display());
        Ok(target)
    }

    /// Path of a stored file relative to the root, with a leading `/`
    pub fn relative_path(&self, stored: &Path) -> AppResult<String> {
        let relative = stored.strip_prefix(&self.root).map_err(|_| {
            AppError::Internal(format!("{} is outside the storage root", stored.display()))
        })?;

        let mut path = String::new();
        for component in relative.components() {
            path.push('/');
            path.push_str(&component.as_os_str().to_string_lossy());
        }
        Ok(path)
    }

    /// Remove a stored file; returns false when it did not exist
    pub async fn delete(&self, relative: &str) -> AppResult<bool> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(e)),
        }
    }

    pub fn compose_image_url(&self, relative: &str) -> String {
        join_url(&[&self.public_url, &self.image_prefix, relative])
    }

    pub fn compose_static_url(&self, path: &str) -> String {
        join_url(&[&self.public_url, &self.static_prefix, path])
    }
}
