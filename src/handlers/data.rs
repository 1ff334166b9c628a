//! Dataset upload handler

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use crate::{AppState, AppResult, AppError};
use crate::models::Dataset;

/// Accepted upload extension
pub const CSV_EXTENSION: &str = ".csv";

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Upload a CSV dataset, replacing the current one
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.ends_with(CSV_EXTENSION) {
            return Err(AppError::ValidationError("Please upload a CSV file".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;

        let dataset = state.model.store_data(Dataset::from_csv(bytes.as_ref())?);

        tracing::info!(
            "Dataset '{}' uploaded: {} rows, columns {:?}",
            filename,
            dataset.len(),
            dataset.columns()
        );
        if dataset.is_empty() {
            tracing::warn!("Dataset '{}' has a header but no rows", filename);
        }

        return Ok(Json(UploadResponse {
            message: "Data uploaded successfully",
            rows: dataset.len(),
            columns: dataset.columns().to_vec(),
        }));
    }

    Err(AppError::ValidationError(format!("Missing '{}' field", FILE_FIELD)))
}
