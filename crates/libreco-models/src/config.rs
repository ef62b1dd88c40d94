//! Model hyperparameters.
//!
//! Both configurations deserialize from JSON with every field optional;
//! missing fields take the defaults below.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use libreco_core::{seq_mode, Combiner, SeqMode};

use crate::error::{ModelError, ModelResult};

/// Prediction target of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Implicit feedback, scores are probabilities.
    #[default]
    Ranking,
    /// Explicit ratings, scores are (optionally clipped) regressions.
    Rating,
}

fn load_json<T: DeserializeOwned>(path: &Path) -> ModelResult<T> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(ModelError::Deserialization)
}

fn check_embed_size(embed_size: usize) -> ModelResult<()> {
    if embed_size == 0 {
        return Err(ModelError::config("embed_size must be positive"));
    }
    Ok(())
}

/// Parses a comma-separated list of layer widths such as `"128,64"`.
pub fn parse_hidden_units(units: &str) -> ModelResult<Vec<usize>> {
    units
        .split(',')
        .map(|u| {
            let u = u.trim();
            match u.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ModelError::config(format!(
                    "invalid hidden unit `{u}` in `{units}`"
                ))),
            }
        })
        .collect()
}

/// Configuration of [`FmModel`](crate::fm::FmModel).
///
/// # Example
///
/// ```
/// use libreco_models::config::{FmConfig, Task};
///
/// let config = FmConfig::from_json_str(r#"{"task": "rating", "embed_size": 8}"#).unwrap();
/// assert_eq!(config.task, Task::Rating);
/// assert_eq!(config.embed_size, 8);
/// assert!(config.use_bn);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmConfig {
    /// Prediction target.
    pub task: Task,
    /// Dimension of every embedding vector.
    pub embed_size: usize,
    /// Batch-normalize the pairwise term.
    pub use_bn: bool,
    /// Pooling of multi-valued sparse fields.
    pub multi_sparse_combiner: Combiner,
    /// Seed of all weight initializers.
    pub seed: u64,
    /// Clip range of rating predictions.
    pub lower_upper_bound: Option<(f32, f32)>,
}

impl Default for FmConfig {
    fn default() -> Self {
        Self {
            task: Task::Ranking,
            embed_size: 16,
            use_bn: true,
            multi_sparse_combiner: Combiner::SqrtN,
            seed: 42,
            lower_upper_bound: None,
        }
    }
}

impl FmConfig {
    /// Creates a default configuration for `task`.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            ..Self::default()
        }
    }

    /// Sets the embedding dimension.
    pub fn with_embed_size(mut self, embed_size: usize) -> Self {
        self.embed_size = embed_size;
        self
    }

    /// Enables or disables batch normalization of the pairwise term.
    pub fn with_batch_norm(mut self, use_bn: bool) -> Self {
        self.use_bn = use_bn;
        self
    }

    /// Sets the multi-valued field combiner.
    pub fn with_combiner(mut self, combiner: Combiner) -> Self {
        self.multi_sparse_combiner = combiner;
        self
    }

    /// Sets the initializer seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the rating clip range.
    pub fn with_bounds(mut self, lower: f32, upper: f32) -> Self {
        self.lower_upper_bound = Some((lower, upper));
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ModelResult<()> {
        check_embed_size(self.embed_size)?;
        if let Some((lower, upper)) = self.lower_upper_bound {
            if !(lower < upper) {
                return Err(ModelError::config(format!(
                    "lower_upper_bound must satisfy lower < upper, got ({lower}, {upper})"
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(ModelError::Deserialization)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let config: Self = load_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration of [`YouTubeRetrieval`](crate::youtube_retrieval::YouTubeRetrieval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeRetrievalConfig {
    /// Prediction target, only ranking is supported.
    pub task: Task,
    /// Dimension of the user and item vectors.
    pub embed_size: usize,
    /// Comma-separated hidden layer widths of the user tower.
    pub hidden_units: String,
    /// Batch-normalize hidden layers.
    pub use_bn: bool,
    /// Dropout rate of hidden layers.
    pub dropout_rate: Option<f32>,
    /// Window of the most recent interactions.
    pub recent_num: Option<usize>,
    /// Window of randomly sampled interactions, used when `recent_num` is unset.
    pub random_num: Option<usize>,
    /// Pooling of multi-valued sparse fields.
    pub multi_sparse_combiner: Combiner,
    /// Seed of initializers, window sampling and dropout.
    pub seed: u64,
}

impl Default for YouTubeRetrievalConfig {
    fn default() -> Self {
        Self {
            task: Task::Ranking,
            embed_size: 16,
            hidden_units: "128,64".to_string(),
            use_bn: true,
            dropout_rate: None,
            recent_num: Some(10),
            random_num: None,
            multi_sparse_combiner: Combiner::SqrtN,
            seed: 42,
        }
    }
}

impl YouTubeRetrievalConfig {
    /// Sets the vector dimension.
    pub fn with_embed_size(mut self, embed_size: usize) -> Self {
        self.embed_size = embed_size;
        self
    }

    /// Sets the hidden layer widths, e.g. `"128,64"`.
    pub fn with_hidden_units(mut self, units: impl Into<String>) -> Self {
        self.hidden_units = units.into();
        self
    }

    /// Enables or disables batch normalization.
    pub fn with_batch_norm(mut self, use_bn: bool) -> Self {
        self.use_bn = use_bn;
        self
    }

    /// Sets the dropout rate.
    pub fn with_dropout(mut self, rate: f32) -> Self {
        self.dropout_rate = Some(rate);
        self
    }

    /// Uses the `n` most recent interactions.
    pub fn with_recent(mut self, n: usize) -> Self {
        self.recent_num = Some(n);
        self.random_num = None;
        self
    }

    /// Uses `n` randomly sampled interactions.
    pub fn with_random(mut self, n: usize) -> Self {
        self.recent_num = None;
        self.random_num = Some(n);
        self
    }

    /// Sets the multi-valued field combiner.
    pub fn with_combiner(mut self, combiner: Combiner) -> Self {
        self.multi_sparse_combiner = combiner;
        self
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Hidden widths followed by the output width `embed_size`.
    pub fn tower_units(&self) -> ModelResult<Vec<usize>> {
        let mut units = parse_hidden_units(&self.hidden_units)?;
        units.push(self.embed_size);
        Ok(units)
    }

    /// Window mode and length.
    pub fn window(&self) -> ModelResult<(SeqMode, usize)> {
        Ok(seq_mode(self.recent_num, self.random_num)?)
    }

    /// Effective dropout rate, zero when disabled.
    pub fn dropout(&self) -> f32 {
        self.dropout_rate.unwrap_or(0.0)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ModelResult<()> {
        if self.task != Task::Ranking {
            return Err(ModelError::config(
                "YouTube retrieval only supports the ranking task",
            ));
        }
        check_embed_size(self.embed_size)?;
        self.tower_units()?;
        self.window()?;
        if !(0.0..1.0).contains(&self.dropout()) {
            return Err(ModelError::config(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout()
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(ModelError::Deserialization)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let config: Self = load_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let fm = FmConfig::default();
        assert_eq!(fm.embed_size, 16);
        assert!(fm.use_bn);
        assert_eq!(fm.multi_sparse_combiner, Combiner::SqrtN);
        assert_eq!(fm.seed, 42);

        let yt = YouTubeRetrievalConfig::default();
        assert_eq!(yt.tower_units().unwrap(), vec![128, 64, 16]);
        assert_eq!(yt.window().unwrap(), (SeqMode::Recent, 10));
        assert_eq!(yt.dropout(), 0.0);
        assert!(yt.validate().is_ok());
    }

    #[test]
    fn test_parse_hidden_units() {
        assert_eq!(parse_hidden_units("256, 32").unwrap(), vec![256, 32]);
        assert!(parse_hidden_units("128,").is_err());
        assert!(parse_hidden_units("0").is_err());
        assert!(parse_hidden_units("a,b").is_err());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(FmConfig::default().with_embed_size(0).validate().is_err());
        assert!(FmConfig::default().with_bounds(5.0, 1.0).validate().is_err());

        let rating = YouTubeRetrievalConfig {
            task: Task::Rating,
            ..YouTubeRetrievalConfig::default()
        };
        assert!(matches!(
            rating.validate(),
            Err(ModelError::ConfigError { .. })
        ));
        assert!(YouTubeRetrievalConfig::default()
            .with_recent(0)
            .validate()
            .is_err());
        assert!(YouTubeRetrievalConfig::default()
            .with_dropout(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_overrides() {
        let config = YouTubeRetrievalConfig::from_json_str(
            r#"{"hidden_units": "32", "recent_num": null, "random_num": 5, "multi_sparse_combiner": "mean"}"#,
        )
        .unwrap();
        assert_eq!(config.window().unwrap(), (SeqMode::Random, 5));
        assert_eq!(config.multi_sparse_combiner, Combiner::Mean);
        assert_eq!(config.tower_units().unwrap(), vec![32, 16]);

        assert!(matches!(
            FmConfig::from_json_str(r#"{"multi_sparse_combiner": "max"}"#),
            Err(ModelError::Deserialization(_))
        ));
    }
}
