//! Client configuration loaded from environment variables.
//!
//! Everything except the backend URL and key has a default, so a local
//! build only needs `BAZAAR_BACKEND_URL` and `BAZAAR_ANON_KEY`.

use std::path::PathBuf;
use std::str::FromStr;

use bazaar_shared::constants::{
    DEFAULT_IMAGE_BUCKET, DEFAULT_IMAGE_FOLDER, REALTIME_HEARTBEAT_SECS,
};

use crate::error::ClientError;

/// Which mechanism receives listing images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// The backend's object storage bucket.
    #[default]
    Storage,
    /// A third-party image host taking base64 uploads with a preset.
    ImageHost,
}

impl FromStr for UploadMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" => Ok(Self::Storage),
            "image-host" | "image_host" => Ok(Self::ImageHost),
            other => Err(ClientError::Config(format!("unknown upload mode '{other}'"))),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend project, e.g. `https://xyz.supabase.co`.
    /// Env: `BAZAAR_BACKEND_URL`
    pub backend_url: String,

    /// Public (anon) API key sent with every request.
    /// Env: `BAZAAR_ANON_KEY`
    pub anon_key: String,

    /// Storage bucket for listing images.
    /// Env: `BAZAAR_IMAGE_BUCKET`
    /// Default: `product-images`
    pub image_bucket: String,

    /// Folder inside the bucket.
    /// Env: `BAZAAR_IMAGE_FOLDER`
    /// Default: `products`
    pub image_folder: String,

    /// Env: `BAZAAR_UPLOAD_MODE` (`storage` / `image-host`)
    /// Default: `storage`
    pub upload_mode: UploadMode,

    /// Upload endpoint of the third-party image host.
    /// Env: `BAZAAR_IMAGE_HOST_URL`
    pub image_host_url: Option<String>,

    /// Unsigned upload preset for the image host.
    /// Env: `BAZAAR_IMAGE_UPLOAD_PRESET`
    pub image_upload_preset: Option<String>,

    /// Restrict sign-ups to one email domain (e.g. `silicon.ac.in`).
    /// Env: `BAZAAR_SIGNUP_EMAIL_DOMAIN`
    /// Default: unrestricted.
    pub signup_email_domain: Option<String>,

    /// Realtime heartbeat interval.
    /// Env: `BAZAAR_HEARTBEAT_SECS`
    /// Default: `30`
    pub heartbeat_secs: u64,

    /// Directory holding the local store.
    /// Env: `BAZAAR_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            image_bucket: DEFAULT_IMAGE_BUCKET.to_string(),
            image_folder: DEFAULT_IMAGE_FOLDER.to_string(),
            upload_mode: UploadMode::Storage,
            image_host_url: None,
            image_upload_preset: None,
            signup_email_domain: None,
            heartbeat_secs: REALTIME_HEARTBEAT_SECS,
            data_dir: None,
        }
    }
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = non_empty("BAZAAR_BACKEND_URL") {
            config.backend_url = url;
        }

        if let Some(key) = non_empty("BAZAAR_ANON_KEY") {
            config.anon_key = key;
        }

        if let Some(bucket) = non_empty("BAZAAR_IMAGE_BUCKET") {
            config.image_bucket = bucket;
        }

        if let Some(folder) = non_empty("BAZAAR_IMAGE_FOLDER") {
            config.image_folder = folder.trim_matches('/').to_string();
        }

        if let Some(mode) = non_empty("BAZAAR_UPLOAD_MODE") {
            match mode.parse() {
                Ok(m) => config.upload_mode = m,
                Err(e) => tracing::warn!(value = %mode, error = %e, "ignoring BAZAAR_UPLOAD_MODE"),
            }
        }

        config.image_host_url = non_empty("BAZAAR_IMAGE_HOST_URL");
        config.image_upload_preset = non_empty("BAZAAR_IMAGE_UPLOAD_PRESET");
        config.signup_email_domain =
            non_empty("BAZAAR_SIGNUP_EMAIL_DOMAIN").map(|d| d.trim_start_matches('@').to_string());

        if let Some(secs) = non_empty("BAZAAR_HEARTBEAT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) if s > 0 => config.heartbeat_secs = s,
                _ => tracing::warn!(value = %secs, "ignoring BAZAAR_HEARTBEAT_SECS"),
            }
        }

        config.data_dir = non_empty("BAZAAR_DATA_DIR").map(PathBuf::from);

        config
    }

    /// Check the settings a remote client cannot work without.
    pub fn validate(&self) -> Result<(), ClientError> {
        url::Url::parse(&self.backend_url)?;
        if self.upload_mode == UploadMode::ImageHost
            && (self.image_host_url.is_none() || self.image_upload_preset.is_none())
        {
            return Err(ClientError::Config(
                "image-host uploads need BAZAAR_IMAGE_HOST_URL and BAZAAR_IMAGE_UPLOAD_PRESET"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_mode_parses() {
        assert_eq!("storage".parse::<UploadMode>().unwrap(), UploadMode::Storage);
        assert_eq!("Image-Host".parse::<UploadMode>().unwrap(), UploadMode::ImageHost);
        assert!("ftp".parse::<UploadMode>().is_err());
    }

    #[test]
    fn image_host_needs_endpoint_and_preset() {
        let mut config = ClientConfig {
            upload_mode: UploadMode::ImageHost,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        config.image_host_url = Some("https://api.example.com/v1_1/demo/image/upload".into());
        config.image_upload_preset = Some("unsigned".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_backend_url_is_rejected() {
        let config = ClientConfig {
            backend_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::Url(_))));
    }
}
