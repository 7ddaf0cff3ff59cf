use std::{ffi::OsStr, path::{Path, PathBuf}, sync::Arc};

use anyhow::Context;
use axum::{
    debug_handler,
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    Json,
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config::Config, AppError, AppResult};

/// Where uploads go and how they are addressed afterwards.
#[derive(Debug, Clone)]
pub struct Uploads {
    pub dir: PathBuf,
    pub public_url: String,
    pub max_bytes: usize,
}

impl From<&Config> for Uploads {
    fn from(config: &Config) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            public_url: config.public_url.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_url: String,
}

#[debug_handler(state = crate::AppState)]
pub async fn upload(
    State(uploads): State<Arc<Uploads>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    // a request that isn't multipart at all carries no file either
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "upload without a multipart body");
        AppError::bad_request("No file uploaded")
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let stored_name = stored_name(&file_name);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        tokio::fs::create_dir_all(&uploads.dir).await
            .context("failed to store upload")?;
        tokio::fs::write(uploads.dir.join(&stored_name), &bytes).await
            .context("failed to store upload")?;

        tracing::info!(file = %stored_name, original = %file_name, bytes = bytes.len(), "stored upload");

        return Ok(Json(UploadResponse {
            file_url: format!("{}/uploads/{stored_name}", uploads.public_url.trim_end_matches('/')),
        }));
    }

    Err(AppError::bad_request("No file uploaded"))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err)
}

/// `<unix millis>-<uuid><.ext>`; the extension survives only if it is plain
/// alphanumeric.
fn stored_name(original: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let ext = Path::new(original)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("{millis}-{}{ext}", Uuid::now_v7())
}
