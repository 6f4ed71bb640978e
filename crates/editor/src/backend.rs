use async_trait::async_trait;
use std::sync::Arc;
use storage::{StoreResult, StoredMedia, UploadMetadata};
use template::Template;

/// Receives upload progress as a whole percentage.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Where the editor lists, reads, saves templates and sends media.
#[async_trait]
pub trait TemplateBackend: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<String>>;

    async fn read(&self, name: &str) -> StoreResult<Template>;

    async fn create(&self, template: &Template, requested: Option<&str>) -> StoreResult<String>;

    async fn update(&self, name: &str, template: &Template) -> StoreResult<()>;

    async fn upload(
        &self,
        data: Vec<u8>,
        metadata: UploadMetadata,
        progress: Option<ProgressFn>,
    ) -> StoreResult<StoredMedia>;
}

/// Turns byte counts into monotonically increasing percentages.
pub struct UploadProgress {
    total: u64,
    sent: u64,
    last: Option<u8>,
    callback: Option<ProgressFn>,
}

impl UploadProgress {
    pub fn new(total: u64, callback: Option<ProgressFn>) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    pub fn percent(sent: u64, total: u64) -> u8 {
        if total == 0 {
            return 100;
        }
        let pct = (sent.min(total) as f64 * 100.0 / total as f64).round();
        pct as u8
    }

    pub fn advance(&mut self, bytes: u64) {
        self.sent = self.sent.saturating_add(bytes);
        self.emit(Self::percent(self.sent, self.total));
    }

    pub fn finish(&mut self) {
        self.emit(100);
    }

    fn emit(&mut self, pct: u8) {
        if self.last.map_or(true, |last| pct > last) {
            self.last = Some(pct);
            if let Some(callback) = &self.callback {
                callback(pct);
            }
        }
    }
}
