//! Media storage on an S3-compatible bucket
//!
//! Images arrive from clients as `data:<mime>;base64,<payload>` references.
//! They are decoded, stored under a ULID key and served from the bucket's
//! public URL. Deletion works from that public URL.

use aws_sdk_s3::Client as S3Client;
use base64::{Engine as _, engine::general_purpose};

use crate::config::MediaStorageConfig;
use crate::error::AppError;

/// Where an uploaded image is used, which decides its key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PostImage,
    ProfileImage,
    CoverImage,
}

impl MediaKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::PostImage => "posts",
            Self::ProfileImage => "avatars",
            Self::CoverImage => "covers",
        }
    }
}

/// A decoded `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl DataUrl {
    /// Parse a base64 image data URL
    ///
    /// # Errors
    /// `Validation` if the reference is not a base64 data URL of a
    /// supported image type
    pub fn parse(reference: &str) -> Result<Self, AppError> {
        let invalid = || AppError::Validation("Invalid image data".to_string());

        let rest = reference.trim().strip_prefix("data:").ok_or_else(invalid)?;
        let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
        let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
        let content_type = content_type.to_ascii_lowercase();

        if extension_for(&content_type).is_none() {
            return Err(AppError::Validation(format!(
                "Unsupported image type: {}",
                content_type
            )));
        }

        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| invalid())?;
        if data.is_empty() {
            return Err(invalid());
        }

        Ok(Self { content_type, data })
    }

    fn extension(&self) -> &'static str {
        extension_for(&self.content_type).unwrap_or("bin")
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Media storage service
///
/// Uploads images and returns public URLs.
pub struct MediaStorage {
    /// S3-compatible client
    client: S3Client,
    /// Media bucket name
    bucket: String,
    /// Public URL base without trailing slash
    /// e.g., "https://media.example.com"
    public_url: String,
}

impl MediaStorage {
    /// Create new media storage client
    ///
    /// No request is made; credentials are checked on first use.
    pub fn new(config: &MediaStorageConfig) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "murmur-media",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .http_client(super::build_s3_http_client())
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Decode a data URL and upload it
    ///
    /// # Returns
    /// Public URL of the stored image
    pub async fn upload_data_url(&self, kind: MediaKind, reference: &str) -> Result<String, AppError> {
        let image = DataUrl::parse(reference)?;
        let key = format!(
            "{}/{}.{}",
            kind.prefix(),
            ulid::Ulid::new().to_string().to_lowercase(),
            image.extension()
        );

        self.upload(&key, image.data, &image.content_type).await
    }

    /// Upload raw bytes under `key`
    ///
    /// # Returns
    /// Public URL for the uploaded file
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control("public, max-age=31536000") // 1 year
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Media upload failed: {}", e)))?;

        crate::metrics::MEDIA_UPLOADS_TOTAL.inc();
        tracing::info!(key, size, content_type, "Uploaded media");

        Ok(self.get_public_url(key))
    }

    /// Delete the object behind a public URL
    ///
    /// URLs that do not point into this bucket are skipped.
    pub async fn delete_by_url(&self, url: &str) -> Result<(), AppError> {
        match self.key_for_url(url) {
            Some(key) => self.delete(&key).await,
            None => {
                tracing::warn!(url, "Skipping delete of media outside the bucket");
                Ok(())
            }
        }
    }

    /// Delete media file
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Media delete failed: {}", e)))?;

        tracing::info!(key, "Deleted media");
        Ok(())
    }

    /// Get public URL for an object key
    pub fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Object key for one of our public URLs
    fn key_for_url(&self, url: &str) -> Option<String> {
        let base = url::Url::parse(&format!("{}/", self.public_url)).ok()?;
        let target = url::Url::parse(url).ok()?;
        if base.origin() != target.origin() {
            return None;
        }

        let key = target.path().strip_prefix(base.path())?;
        if key.is_empty() {
            return None;
        }
        Some(key.to_string())
    }
}
