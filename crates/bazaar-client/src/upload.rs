//! Listing image uploads.
//!
//! Two mechanisms sit behind [`ImageUploader`]: the backend's storage
//! bucket ([`StorageUploader`]) and a third-party image host taking base64
//! data URIs with an unsigned upload preset ([`ImageHostUploader`]).
//! [`uploader_for`] picks one from the configuration.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use bazaar_shared::constants::{DEFAULT_IMAGE_EXT, MAX_IMAGE_EXT_LEN};

use crate::config::{ClientConfig, UploadMode};
use crate::error::{ClientError, Result};
use crate::remote::Backend;

/// A picked image ready to upload.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Where the image came from (file path or URI); only its extension is
    /// used.
    pub source: String,
    pub bytes: Bytes,
    /// Declared MIME type, if the picker reported one.
    pub content_type: Option<String>,
}

impl ImageData {
    pub fn new(source: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            source: source.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn extension(&self) -> String {
        image_extension(&self.source)
    }

    pub fn content_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| format!("image/{}", self.extension()))
    }
}

/// Lower-cased extension of the last path segment of `source`; `jpg` when
/// there is none or it is longer than five characters.
pub fn image_extension(source: &str) -> String {
    let name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    match name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= MAX_IMAGE_EXT_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_IMAGE_EXT.to_string(),
    }
}

/// `<folder>/<millis>.<ext>`
pub fn storage_path(folder: &str, millis: i64, ext: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{millis}.{ext}")
    } else {
        format!("{folder}/{millis}.{ext}")
    }
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload `image` and return its public URL.
    async fn upload(&self, image: ImageData) -> Result<String>;
}

/// Uploads into a storage bucket of the backend, overwriting on conflict.
pub struct StorageUploader {
    backend: Arc<dyn Backend>,
    bucket: String,
    folder: String,
}

impl StorageUploader {
    pub fn new(backend: Arc<dyn Backend>, bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl ImageUploader for StorageUploader {
    async fn upload(&self, image: ImageData) -> Result<String> {
        let path = storage_path(
            &self.folder,
            Utc::now().timestamp_millis(),
            &image.extension(),
        );
        let content_type = image.content_type();
        let url = self
            .backend
            .upload(&self.bucket, &path, &content_type, image.bytes)
            .await?;
        info!(bucket = %self.bucket, %path, "image uploaded");
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ImageHostResponse {
    secure_url: Option<String>,
    #[serde(default)]
    error: Option<ImageHostError>,
}

#[derive(Debug, Deserialize)]
struct ImageHostError {
    message: String,
}

/// Uploads to a third-party image host as a base64 data URI.
pub struct ImageHostUploader {
    http: reqwest::Client,
    endpoint: Url,
    preset: String,
}

impl ImageHostUploader {
    pub fn new(endpoint: &str, preset: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
            preset: preset.into(),
        })
    }

    fn data_uri(image: &ImageData) -> String {
        format!(
            "data:{};base64,{}",
            image.content_type(),
            BASE64.encode(&image.bytes)
        )
    }
}

#[async_trait]
impl ImageUploader for ImageHostUploader {
    async fn upload(&self, image: ImageData) -> Result<String> {
        let form = [
            ("file", Self::data_uri(&image)),
            ("upload_preset", self.preset.clone()),
        ];
        let resp = self
            .http
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        let body: ImageHostResponse = resp.json().await?;

        match body.secure_url {
            Some(url) if status.is_success() => {
                info!(size = image.bytes.len(), "image uploaded to host");
                Ok(url)
            }
            _ => {
                let message = body
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "no secure_url in response".to_string());
                warn!(status = status.as_u16(), %message, "image host upload failed");
                Err(ClientError::Remote {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// The uploader selected by `config.upload_mode`.
pub fn uploader_for(config: &ClientConfig, backend: Arc<dyn Backend>) -> Result<Box<dyn ImageUploader>> {
    match config.upload_mode {
        UploadMode::Storage => Ok(Box::new(StorageUploader::new(
            backend,
            config.image_bucket.clone(),
            config.image_folder.clone(),
        ))),
        UploadMode::ImageHost => {
            let (Some(endpoint), Some(preset)) =
                (&config.image_host_url, &config.image_upload_preset)
            else {
                return Err(ClientError::Config(
                    "image host URL and upload preset are required".to_string(),
                ));
            };
            Ok(Box::new(ImageHostUploader::new(endpoint, preset.clone())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBackend;

    #[test]
    fn extension_falls_back_to_jpg() {
        assert_eq!(image_extension("file:///tmp/cat.PNG"), "png");
        assert_eq!(image_extension("/photos/IMG_0001"), "jpg");
        assert_eq!(image_extension("/photos/blob.unknownext"), "jpg");
        assert_eq!(image_extension("/a.dir/photo"), "jpg");
        assert_eq!(image_extension("photo.webp"), "webp");
    }

    #[test]
    fn path_layout() {
        assert_eq!(storage_path("products", 1712345678901, "jpg"), "products/1712345678901.jpg");
        assert_eq!(storage_path("/products/", 5, "png"), "products/5.png");
        assert_eq!(storage_path("", 5, "png"), "5.png");
    }

    #[test]
    fn data_uri_shape() {
        let image = ImageData::new("x.png", vec![1u8, 2, 3]);
        assert_eq!(ImageHostUploader::data_uri(&image), "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn storage_upload_lands_in_bucket() {
        let backend = Arc::new(MemoryBackend::new());
        let uploader = StorageUploader::new(backend.clone(), "product-images", "products");

        let url = uploader
            .upload(ImageData::new("/tmp/desk.heic", vec![0u8; 16]))
            .await
            .unwrap();
        assert!(url.starts_with("memory://product-images/products/"));
        assert!(url.ends_with(".heic"));

        let path = url.trim_start_matches("memory://product-images/");
        assert_eq!(backend.object("product-images", path).unwrap().len(), 16);
    }

    #[test]
    fn config_selects_uploader() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let mut config = ClientConfig::default();
        assert!(uploader_for(&config, backend.clone()).is_ok());

        config.upload_mode = UploadMode::ImageHost;
        assert!(uploader_for(&config, backend.clone()).is_err());

        config.image_host_url = Some("https://api.example.com/upload".into());
        config.image_upload_preset = Some("unsigned".into());
        assert!(uploader_for(&config, backend).is_ok());
    }
}
