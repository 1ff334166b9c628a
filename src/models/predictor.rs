//! Downtime Predictor - scaler + logistic regression over uploaded data
//!
//! The model is a two-state machine:
//!
//! ```text
//!   Untrained ──train()──▶ Trained ──train()──▶ Trained
//! ```
//!
//! A failed `train()` or `predict()` leaves the state untouched. The
//! `(scaler, classifier)` pair is swapped as one `Arc`, so readers never
//! observe a scaler from one run paired with a classifier from another.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2, Axis};
use parking_lot::{Mutex, RwLock};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::dataset::{Dataset, DatasetError, DatasetStore};

/// Feature columns, in the order the scaler and classifier see them
pub const FEATURE_COLUMNS: [&str; 2] = ["Temperature", "Run_Time"];

pub const DEFAULT_LABEL_COLUMN: &str = "Downtime_Flag";

/// Smallest dataset that still leaves both partitions non-empty
pub const MIN_TRAINING_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no data uploaded")]
    NoData,

    #[error("model not trained")]
    NotTrained,

    #[error("training failed: {0}")]
    Training(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl From<DatasetError> for ModelError {
    fn from(err: DatasetError) -> Self {
        ModelError::Training(err.to_string())
    }
}

/// Training hyper-parameters
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Share of rows used for fitting (rest is held out)
    pub train_ratio: f64,

    /// Seed for the row shuffle
    pub seed: u64,

    /// Optimizer iteration cap
    pub max_iterations: u64,

    /// Column holding the downtime label
    pub label_column: String,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 42,
            max_iterations: 100,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }
}

/// Single prediction request
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput {
    pub temperature: f64,
    pub run_time: f64,
}

impl PredictionInput {
    pub fn new(temperature: f64, run_time: f64) -> Self {
        Self { temperature, run_time }
    }

    /// Features in `FEATURE_COLUMNS` order
    fn features(&self) -> Result<[f64; 2], ModelError> {
        let features = [self.temperature, self.run_time];

        for (name, value) in FEATURE_COLUMNS.iter().zip(features) {
            if !value.is_finite() {
                return Err(ModelError::Prediction(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }

        Ok(features)
    }
}

/// Prediction output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "Downtime")]
    pub downtime: serde_json::Value,

    /// Probability of the predicted label
    #[serde(rename = "Confidence")]
    pub confidence: f64,
}

/// Fitted scaler/classifier pair from one training run
pub struct TrainedClassifier {
    pub id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
    scaler: LinearScaler<f64>,
    classifier: FittedLogisticRegression<f64, String>,
}

impl TrainedClassifier {
    fn predict(&self, input: &PredictionInput) -> Result<Prediction, ModelError> {
        let features = input.features()?;
        let records = Array2::from_shape_vec((1, FEATURE_COLUMNS.len()), features.to_vec())
            .map_err(|e| ModelError::Prediction(e.to_string()))?;
        let records = self.scaler.transform(records);

        let label = self
            .classifier
            .predict(&records)
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Prediction("classifier returned no label".to_string()))?;

        // P(positive class); labels are assigned at the 0.5 threshold
        let positive = self
            .classifier
            .predict_probabilities(&records)
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Prediction("classifier returned no probability".to_string()))?;

        Ok(Prediction {
            downtime: label_value(&label),
            confidence: positive.max(1.0 - positive),
        })
    }
}

/// Integer-looking labels are emitted as JSON numbers
fn label_value(label: &str) -> serde_json::Value {
    match label.parse::<i64>() {
        Ok(n) => serde_json::Value::from(n),
        Err(_) => serde_json::Value::from(label),
    }
}

/// Status snapshot for the UI
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub data_loaded: bool,
    pub dataset_rows: usize,
    pub dataset_columns: Vec<String>,
    pub model_trained: bool,
    pub model_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, f64>,
    pub feature_columns: [&'static str; 2],
    pub label_column: String,
}

/// Owner of the dataset store and the trained classifier state
pub struct MachineLearningModel {
    options: TrainingOptions,
    store: DatasetStore,
    trained: RwLock<Option<Arc<TrainedClassifier>>>,
    training: Mutex<()>,
}

impl MachineLearningModel {
    pub fn new(options: TrainingOptions) -> Self {
        Self {
            options,
            store: DatasetStore::new(),
            trained: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Replace the current dataset, returning the stored snapshot
    pub fn store_data(&self, dataset: Dataset) -> Arc<Dataset> {
        self.store.store(dataset)
    }

    /// Fit a new scaler/classifier pair on the current dataset
    pub fn train(&self) -> Result<BTreeMap<String, f64>, ModelError> {
        // One fit at a time; the latest upload always trains last
        let _guard = self.training.lock();

        let dataset = self.store.current().ok_or(ModelError::NoData)?;
        let fitted = fit(&dataset, &self.options)?;
        let metrics = fitted.metrics.clone();

        tracing::info!(
            "Model {} trained on {} rows: {:?}",
            fitted.id,
            dataset.len(),
            metrics
        );

        *self.trained.write() = Some(Arc::new(fitted));
        Ok(metrics)
    }

    pub fn predict(&self, input: &PredictionInput) -> Result<Prediction, ModelError> {
        let trained = self.trained.read().clone().ok_or(ModelError::NotTrained)?;
        trained.predict(input)
    }

    pub fn is_trained(&self) -> bool {
        self.trained.read().is_some()
    }

    pub fn status(&self) -> ModelStatus {
        let dataset = self.store.current();
        let trained = self.trained.read().clone();

        ModelStatus {
            data_loaded: dataset.is_some(),
            dataset_rows: dataset.as_ref().map(|d| d.len()).unwrap_or(0),
            dataset_columns: dataset.map(|d| d.columns().to_vec()).unwrap_or_default(),
            model_trained: trained.is_some(),
            model_id: trained.as_ref().map(|t| t.id),
            trained_at: trained.as_ref().map(|t| t.trained_at),
            metrics: trained.map(|t| t.metrics.clone()).unwrap_or_default(),
            feature_columns: FEATURE_COLUMNS,
            label_column: self.options.label_column.clone(),
        }
    }
}

impl Default for MachineLearningModel {
    fn default() -> Self {
        Self::new(TrainingOptions::default())
    }
}

/// Build the `(n, 2)` feature matrix and label vector
fn training_matrix(
    dataset: &Dataset,
    label_column: &str,
) -> Result<(Array2<f64>, Array1<String>), ModelError> {
    let labels = normalize_labels(dataset.text_column(label_column)?);
    let temperature = dataset.numeric_column(FEATURE_COLUMNS[0])?;
    let run_time = dataset.numeric_column(FEATURE_COLUMNS[1])?;

    let records = Array2::from_shape_fn((dataset.len(), FEATURE_COLUMNS.len()), |(row, col)| {
        match col {
            0 => temperature[row],
            _ => run_time[row],
        }
    });

    Ok((records, Array1::from(labels)))
}

/// Numeric label columns compare by value, so `1` and `1.0` are one class.
/// Whole numbers become integer text; anything non-numeric is kept as-is.
fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let numeric: Option<Vec<f64>> = labels
        .iter()
        .map(|l| l.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    let Some(values) = numeric else {
        return labels;
    };

    values
        .into_iter()
        .map(|v| {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                (v as i64).to_string()
            } else {
                v.to_string()
            }
        })
        .collect()
}

/// Shuffled `(train, test)` row indices; both sides non-empty for `n >= 2`
fn split_indices(n: usize, train_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_len = ((n as f64) * train_ratio).floor() as usize;
    let train_len = train_len.clamp(1, n.saturating_sub(1));

    let test = indices.split_off(train_len);
    (indices, test)
}

fn fit(dataset: &Dataset, options: &TrainingOptions) -> Result<TrainedClassifier, ModelError> {
    let (records, targets) = training_matrix(dataset, &options.label_column)?;

    let n = records.nrows();
    if n < MIN_TRAINING_ROWS {
        return Err(ModelError::Training(format!(
            "need at least {} rows to split into training and test sets, got {}",
            MIN_TRAINING_ROWS, n
        )));
    }

    let (train_idx, test_idx) = split_indices(n, options.train_ratio, options.seed);
    let train = DatasetBase::new(
        records.select(Axis(0), &train_idx),
        targets.select(Axis(0), &train_idx),
    );
    let test = DatasetBase::new(
        records.select(Axis(0), &test_idx),
        targets.select(Axis(0), &test_idx),
    );

    let scaler = LinearScaler::<f64>::standard()
        .fit(&train)
        .map_err(|e| ModelError::Training(e.to_string()))?;
    let train = scaler.transform(train);
    let test = scaler.transform(test);

    let classifier = LogisticRegression::default()
        .max_iterations(options.max_iterations)
        .fit(&train)
        .map_err(|e| ModelError::Training(e.to_string()))?;

    let predicted = classifier.predict(&test);
    let accuracy = predicted
        .confusion_matrix(&test)
        .map_err(|e| ModelError::Training(e.to_string()))?
        .accuracy();

    let mut metrics = BTreeMap::new();
    metrics.insert("accuracy".to_string(), f64::from(accuracy));
    metrics.insert("train_samples".to_string(), train_idx.len() as f64);
    metrics.insert("test_samples".to_string(), test_idx.len() as f64);

    Ok(TrainedClassifier {
        id: Uuid::new_v4(),
        trained_at: Utc::now(),
        metrics,
        scaler,
        classifier,
    })
}
