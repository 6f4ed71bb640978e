use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use storage::{
    CloudinaryConfig, UploadPolicy, DEFAULT_CLOUDINARY_FOLDER, DEFAULT_MAX_UPLOAD_BYTES,
};

pub const DEFAULT_LOG_FILTER: &str = "template_server=debug,storage=debug,tower_http=info";

/// REST backend for video template documents and media uploads
#[derive(Parser, Debug, Clone)]
#[command(name = "template-server", version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "TEMPLATE_SERVER_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory holding template JSON files
    #[arg(long, env = "TEMPLATE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for locally stored uploads (unused with Cloudinary)
    #[arg(long, env = "TEMPLATE_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "TEMPLATE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Comma separated list of accepted file extensions
    #[arg(long, env = "TEMPLATE_ALLOWED_FORMATS")]
    pub allowed_formats: Option<String>,

    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    pub cloudinary_api_key: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub cloudinary_api_secret: Option<String>,

    #[arg(long, env = "CLOUDINARY_FOLDER", default_value = DEFAULT_CLOUDINARY_FOLDER)]
    pub cloudinary_folder: String,
}

impl Config {
    pub fn upload_policy(&self) -> UploadPolicy {
        let mut policy = UploadPolicy {
            max_bytes: self.max_upload_bytes,
            ..UploadPolicy::default()
        };
        if let Some(list) = &self.allowed_formats {
            let extensions = UploadPolicy::parse_extensions(list);
            if !extensions.is_empty() {
                policy.allowed_extensions = extensions;
            }
        }
        policy
    }

    /// Cloudinary settings, when cloud name, key and secret are all given.
    pub fn cloudinary(&self) -> Option<CloudinaryConfig> {
        match (
            &self.cloudinary_cloud_name,
            &self.cloudinary_api_key,
            &self.cloudinary_api_secret,
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
                folder: self.cloudinary_folder.clone(),
            }),
            _ => None,
        }
    }

    /// Request body limit: the upload limit plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(1024 * 1024)
    }
}
