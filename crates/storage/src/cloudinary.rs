use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{MediaStore, StoreError, StoreResult, StoredMedia, UploadMetadata, UploadPolicy};

pub const DEFAULT_CLOUDINARY_FOLDER: &str = "video-edit";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

impl CloudinaryConfig {
    pub fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.cloud_name
        )
    }
}

/// Signs upload parameters: sorted `key=value` pairs joined by `&`, followed by the secret.
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    #[serde(default)]
    public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Signed uploads to Cloudinary's `auto` resource endpoint.
pub struct CloudinaryMediaStore {
    config: CloudinaryConfig,
    policy: UploadPolicy,
    client: reqwest::Client,
}

impl CloudinaryMediaStore {
    pub fn new(config: CloudinaryConfig, policy: UploadPolicy) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("TemplateServer/1.0")
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| StoreError::Upstream(e.to_string()))?;
        Ok(Self {
            config,
            policy,
            client,
        })
    }

    fn form(&self, data: Vec<u8>, metadata: &UploadMetadata, timestamp: &str) -> StoreResult<Form> {
        let signature = sign_params(
            &[("folder", self.config.folder.as_str()), ("timestamp", timestamp)],
            &self.config.api_secret,
        );
        let mut part = Part::bytes(data).file_name(metadata.file_name.clone());
        if let Some(content_type) = &metadata.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| StoreError::Validation(format!("bad content type: {}", e)))?;
        }
        Ok(Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("folder", self.config.folder.clone())
            .text("signature", signature))
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    async fn store(&self, data: Vec<u8>, metadata: UploadMetadata) -> StoreResult<StoredMedia> {
        self.policy.check(&metadata, data.len() as u64)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let form = self.form(data, &metadata, &timestamp)?;

        debug!(file = %metadata.file_name, folder = %self.config.folder, "uploading to cloudinary");
        let response = self
            .client
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Upstream(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Upstream(e.to_string()))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, %message, "cloudinary upload failed");
            return Err(StoreError::Upstream(format!(
                "cloudinary returned {}: {}",
                status, message
            )));
        }

        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Upstream(format!("unexpected cloudinary response: {}", e)))?;
        info!(
            url = %uploaded.secure_url,
            public_id = uploaded.public_id.as_deref().unwrap_or(""),
            "media uploaded to cloudinary"
        );
        Ok(StoredMedia {
            file_path: uploaded.secure_url.clone(),
            url: uploaded.secure_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let direct = {
            let mut hasher = Sha1::new();
            hasher.update(b"folder=video-edit&timestamp=1315060510abcd");
            format!("{:x}", hasher.finalize())
        };
        let signed = sign_params(
            &[("timestamp", "1315060510"), ("folder", "video-edit")],
            "abcd",
        );
        assert_eq!(signed, direct);
        assert_eq!(signed.len(), 40);
    }

    #[test]
    fn upload_url_uses_cloud_name() {
        let config = CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: DEFAULT_CLOUDINARY_FOLDER.to_string(),
        };
        assert_eq!(
            config.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/auto/upload"
        );
    }

    #[tokio::test]
    async fn rejected_uploads_never_reach_the_network() {
        let store = CloudinaryMediaStore::new(
            CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                folder: DEFAULT_CLOUDINARY_FOLDER.to_string(),
            },
            UploadPolicy::default(),
        )
        .unwrap();
        let err = store
            .store(b"#!/bin/sh".to_vec(), UploadMetadata::new("run.sh"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
