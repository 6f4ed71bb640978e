use async_trait::async_trait;
use std::sync::Arc;
use storage::{MediaStore, StoreResult, StoredMedia, TemplateStore, UploadMetadata};
use template::Template;

use crate::{ProgressFn, TemplateBackend, UploadProgress};

/// In-process backend over a template store and a media store.
#[derive(Clone)]
pub struct LocalBackend {
    templates: Arc<dyn TemplateStore>,
    media: Arc<dyn MediaStore>,
}

impl LocalBackend {
    pub fn new(templates: Arc<dyn TemplateStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { templates, media }
    }

    pub fn templates(&self) -> &Arc<dyn TemplateStore> {
        &self.templates
    }
}

#[async_trait]
impl TemplateBackend for LocalBackend {
    async fn list(&self) -> StoreResult<Vec<String>> {
        self.templates.list()
    }

    async fn read(&self, name: &str) -> StoreResult<Template> {
        self.templates.read(name)
    }

    async fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String> {
        self.templates.create(template, requested)
    }

    async fn update(&self, name: &str, template: &Template) -> StoreResult<()> {
        self.templates.update(name, template)
    }

    async fn upload(
        &self,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> StoreResult<StoredMedia> {
        let mut tracker = UploadProgress::new(data.len() as u64, progress);
        tracker.advance(0);
        let stored = self.media.store(data, metadata).await?;
        tracker.finish();
        Ok(stored)
    }
}
