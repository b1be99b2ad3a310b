//! # ag-storage-local
//! agri-sentinel/crates/ag-plugins/ag-storage-local/src/lib.rs
//! Local filesystem implementation of `MediaStore`, used for the image
//! previews attached to questions.
//! Features: Content-addressable storage, directory sharding, and thumbnailing.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ag_core::traits::MediaStore;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use image::ImageReader;
use sha2::{Digest, Sha256};
use tokio::fs;

/// Longest edge of generated thumbnails, in pixels.
const THUMB_SIZE: u32 = 250;

/// Uploads larger than this are refused.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Generates a sharded path: "ab/cd/ef...hash"
    fn sharded_path(&self, hash: &str) -> PathBuf {
        let mut path = self.root_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(hash);
        path
    }

    fn relative_url(&self, media_id: &str, file_name: &str) -> String {
        if media_id.len() < 4 || !media_id.is_ascii() {
            return format!("{}/{}", self.url_prefix, file_name);
        }
        format!("{}/{}/{}/{}", self.url_prefix, &media_id[0..2], &media_id[2..4], file_name)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Saves an upload using its SHA-256 hash as the filename.
    /// This automatically deduplicates files.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        if !content_type.starts_with("image/") {
            bail!("unsupported media type {content_type}");
        }
        if data.is_empty() {
            bail!("empty upload");
        }
        if data.len() > MAX_UPLOAD_BYTES {
            bail!("upload of {} bytes exceeds the {} byte limit", data.len(), MAX_UPLOAD_BYTES);
        }

        let hash = hex::encode(Sha256::digest(&data));
        let target_path = self.sharded_path(&hash);
        let parent = target_path
            .parent()
            .ok_or_else(|| anyhow!("no parent directory for {}", target_path.display()))?;

        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;

        if fs::try_exists(&target_path).await? {
            log::debug!("upload {} already stored", hash);
            return Ok(hash);
        }

        // Decode before writing so undecodable bytes never land on disk.
        let thumb_path = parent.join(format!("thumb_{hash}.webp"));
        let bytes = data.clone();
        tokio::task::spawn_blocking(move || write_thumbnail(&bytes, &thumb_path)).await??;

        fs::write(&target_path, &data).await?;
        log::info!("stored upload {} ({} bytes, {})", hash, data.len(), content_type);
        Ok(hash)
    }

    async fn remove(&self, media_id: &str) -> anyhow::Result<()> {
        if media_id.len() != 64 || !media_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!("invalid media id {media_id:?}");
        }
        let original = self.sharded_path(media_id);
        let thumb = original.with_file_name(format!("thumb_{media_id}.webp"));
        for path in [original, thumb] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
            }
        }
        log::info!("removed upload {}", media_id);
        Ok(())
    }

    fn get_url(&self, media_id: &str) -> String {
        self.relative_url(media_id, media_id)
    }

    fn get_thumbnail_url(&self, media_id: &str) -> String {
        self.relative_url(media_id, &format!("thumb_{media_id}.webp"))
    }
}

/// Decodes `data` and writes a WebP thumbnail next to the original.
fn write_thumbnail(data: &[u8], thumb_path: &Path) -> anyhow::Result<()> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .context("decoding image")?;

    let thumb = img.thumbnail(THUMB_SIZE, THUMB_SIZE);
    thumb
        .to_rgba8()
        .save_with_format(thumb_path, image::ImageFormat::WebP)
        .context("writing thumbnail")?;
    Ok(())
}
