use std::collections::BTreeMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use serde::Serialize;
use tracing::{debug, info};

use cs_common::files::{secure_filename, validate_upload_names};

use crate::SharedState;
use crate::error::ApiError;

const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub uploads: BTreeMap<String, String>,
}

/// Accept exactly the two expected spreadsheets and store each in its container.
///
/// Nothing is written until every file name has been validated.
pub async fn upload_files(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "request is not multipart");
        ApiError::Validation("No files provided".into())
    })?;

    let mut files: Vec<(String, Bytes)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("Malformed multipart body: {}", err.body_text())))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let name = secure_filename(&raw_name);
        let bytes = field.bytes().await.map_err(|err| {
            ApiError::Validation(format!("Malformed multipart body: {}", err.body_text()))
        })?;
        files.push((name, bytes));
    }

    let expected = validate_upload_names(files.iter().map(|(name, _)| name.as_str()))?;

    let mut uploads = BTreeMap::new();
    for ((name, bytes), file) in files.into_iter().zip(expected) {
        let container = file.container(&state.config.containers);
        let size = bytes.len();
        let url = state
            .blob_store
            .put(container, &name, bytes.to_vec())
            .await
            .map_err(|err| ApiError::Storage(format!("Upload failed for {name}: {err}")))?;

        info!(file = %name, container, size, "file uploaded");
        uploads.insert(name, url);
    }

    Ok(Json(UploadResponse {
        message: "Files uploaded successfully",
        uploads,
    }))
}
