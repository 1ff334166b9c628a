//! Train / predict handlers

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use serde::Deserialize;

use crate::{AppState, AppResult, AppError};
use crate::models::{ModelStatus, Prediction, PredictionInput};

#[derive(Debug, Deserialize)]
pub struct PredictForm {
    pub temperature: f64,
    pub run_time: f64,
}

/// Train on the current dataset
pub async fn train(
    State(state): State<AppState>,
) -> AppResult<Json<BTreeMap<String, f64>>> {
    // Fitting is CPU-bound
    let model = state.model.clone();
    let metrics = tokio::task::spawn_blocking(move || model.train()).await??;

    Ok(Json(metrics))
}

/// Predict downtime for one (temperature, run_time) pair
pub async fn predict(
    State(state): State<AppState>,
    form: Result<Form<PredictForm>, FormRejection>,
) -> AppResult<Json<Prediction>> {
    let Form(form) = form.map_err(|e| AppError::ValidationError(e.body_text()))?;

    let input = PredictionInput::new(form.temperature, form.run_time);
    let prediction = state.model.predict(&input)?;

    tracing::debug!("Prediction for {:?}: {:?}", input, prediction);

    Ok(Json(prediction))
}

/// Dataset and model status
pub async fn status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.model.status())
}
