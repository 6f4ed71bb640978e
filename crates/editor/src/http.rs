use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use storage::{validate_filename, StoreError, StoreResult, StoredMedia, UploadMetadata};
use template::Template;
use tracing::{debug, info};

use crate::{ProgressFn, TemplateBackend, UploadProgress, UPLOAD_CHUNK_SIZE};

/// Talks to a running template server.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct FilenameReply {
    filename: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadReply {
    file_path: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct MessageReply {
    #[serde(alias = "error")]
    message: String,
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Upstream(e.to_string())
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("TemplateEditor/1.0")
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(transport)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn template_url(&self, name: &str) -> String {
        format!(
            "{}/templates/{}",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    /// Maps non-success statuses onto store errors, using the server's `message` when present.
    async fn check(response: Response, subject: &str) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageReply>(&body)
            .map(|m| m.message)
            .unwrap_or(body);
        debug!(%status, %message, subject, "server rejected request");
        Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
                StoreError::Validation(message)
            }
            StatusCode::NOT_FOUND => StoreError::NotFound(subject.to_string()),
            StatusCode::CONFLICT => StoreError::Conflict(subject.to_string()),
            _ => StoreError::Upstream(format!("server returned {}: {}", status, message)),
        })
    }
}

#[async_trait]
impl TemplateBackend for HttpBackend {
    async fn list(&self) -> StoreResult<Vec<String>> {
        let url = format!("{}/templates", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport)?;
        let names: Vec<String> = Self::check(response, "templates")
            .await?
            .json()
            .await
            .map_err(transport)?;
        debug!(count = names.len(), "listed templates");
        Ok(names)
    }

    async fn read(&self, name: &str) -> StoreResult<Template> {
        validate_filename(name)?;
        let response = self
            .client
            .get(self.template_url(name))
            .send()
            .await
            .map_err(transport)?;
        let value: Value = Self::check(response, name)
            .await?
            .json()
            .await
            .map_err(transport)?;
        let (template, _) = Template::from_value(value).map_err(|source| StoreError::Corrupt {
            name: name.to_string(),
            source,
        })?;
        Ok(template)
    }

    async fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String> {
        if let Some(name) = requested {
            validate_filename(name)?;
        }
        let mut request = self
            .client
            .post(format!("{}/templates", self.base_url))
            .json(template);
        if let Some(name) = requested {
            request = request.query(&[("name", name)]);
        }
        let response = request.send().await.map_err(transport)?;
        let reply: FilenameReply = Self::check(response, requested.unwrap_or("template"))
            .await?
            .json()
            .await
            .map_err(transport)?;
        info!(file = %reply.filename, "template created on server");
        Ok(reply.filename)
    }

    async fn update(&self, name: &str, template: &Template) -> StoreResult<()> {
        validate_filename(name)?;
        let response = self
            .client
            .put(self.template_url(name))
            .json(template)
            .send()
            .await
            .map_err(transport)?;
        Self::check(response, name).await?;
        info!(file = name, "template updated on server");
        Ok(())
    }

    async fn upload(
        &self,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> StoreResult<StoredMedia> {
        let total = data.len() as u64;
        let mut tracker = UploadProgress::new(total, progress);
        tracker.advance(0);

        let chunks: Vec<Vec<u8>> = data.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let body = stream::iter(chunks).map(move |chunk| {
            tracker.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        });

        let mut part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(metadata.file_name.clone());
        if let Some(content_type) = &metadata.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| StoreError::Validation(format!("bad content type: {}", e)))?;
        }
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let reply: UploadReply = Self::check(response, &metadata.file_name)
            .await?
            .json()
            .await
            .map_err(transport)?;
        info!(file = %metadata.file_name, path = %reply.file_path, "media uploaded");
        Ok(StoredMedia {
            url: reply.url.unwrap_or_else(|| reply.file_path.clone()),
            file_path: reply.file_path,
        })
    }
}
