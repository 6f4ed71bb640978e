use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    pub name: Option<String>,
}

/// Reply to template create and update.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
