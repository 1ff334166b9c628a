//! Configuration module

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::models::{TrainingOptions, DEFAULT_LABEL_COLUMN};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,

    /// Share of rows used for fitting
    pub train_ratio: f64,

    /// Seed for the train/test shuffle
    pub split_seed: u64,

    /// Optimizer iteration cap
    pub max_iterations: u64,

    /// Downtime label column
    pub label_column: String,
}

impl Default for Config {
    fn default() -> Self {
        let training = TrainingOptions::default();

        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            environment: "development".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            train_ratio: training.train_ratio,
            split_seed: training.seed,
            max_iterations: training.max_iterations,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: parse_var("HOST").unwrap_or(defaults.host),

            port: parse_var("PORT").unwrap_or(defaults.port),

            environment: env::var("ENVIRONMENT")
                .unwrap_or(defaults.environment),

            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES")
                .unwrap_or(defaults.max_upload_bytes),

            train_ratio: parse_var("TRAIN_RATIO")
                .filter(|r: &f64| *r > 0.0 && *r < 1.0)
                .unwrap_or(defaults.train_ratio),

            split_seed: parse_var("SPLIT_SEED").unwrap_or(defaults.split_seed),

            max_iterations: parse_var("MAX_ITERATIONS")
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.max_iterations),

            label_column: env::var("LABEL_COLUMN")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.label_column),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            train_ratio: self.train_ratio,
            seed: self.split_seed,
            max_iterations: self.max_iterations,
            label_column: self.label_column.clone(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_training_options() {
        let config = Config::default();
        let options = config.training_options();

        assert_eq!(config.port, 8000);
        assert!(!config.is_production());
        assert_eq!(options.train_ratio, 0.8);
        assert_eq!(options.seed, 42);
        assert_eq!(options.label_column, "Downtime_Flag");
    }

    #[test]
    fn test_invalid_env_values_fall_back() {
        env::set_var("TRAIN_RATIO", "1.5");
        env::set_var("MAX_ITERATIONS", "0");
        env::set_var("PORT", "not-a-port");
        env::set_var("SPLIT_SEED", " 7 ");
        env::set_var("LABEL_COLUMN", "  ");

        let config = Config::from_env();

        for key in ["TRAIN_RATIO", "MAX_ITERATIONS", "PORT", "SPLIT_SEED", "LABEL_COLUMN"] {
            env::remove_var(key);
        }

        assert_eq!(config.train_ratio, 0.8);
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.port, 8000);
        assert_eq!(config.split_seed, 7);
        assert_eq!(config.label_column, "Downtime_Flag");
    }

    #[test]
    fn test_parse_var() {
        env::set_var("DOWNTIME_PREDICTOR_TEST_VALUE", "0.25");
        assert_eq!(parse_var::<f64>("DOWNTIME_PREDICTOR_TEST_VALUE"), Some(0.25));
        assert_eq!(parse_var::<u16>("DOWNTIME_PREDICTOR_TEST_VALUE"), None);
        env::remove_var("DOWNTIME_PREDICTOR_TEST_VALUE");

        assert_eq!(parse_var::<u64>("DOWNTIME_PREDICTOR_TEST_MISSING"), None);
    }
}
