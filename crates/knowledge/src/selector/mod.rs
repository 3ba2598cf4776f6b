//! Example selection policies.
//!
//! An [`ExampleSelector`] owns the trained [`VectorIndex`] and a selection
//! policy resolved from [`SelectorConfig`] at construction time. Every
//! configuration error surfaces from [`ExampleSelector::new`], before any
//! embedding call.

pub mod balanced;
pub mod mmr;
pub mod similarity;

pub use balanced::ClassBalancedPolicy;
pub use mmr::MmrPolicy;
pub use similarity::SimilarityPolicy;

use crate::embeddings::EmbeddingProvider;
use crate::types::{ExampleRecord, Supervision, OUTPUT_FIELD};
use crate::vector_index::{Metric, VectorIndex};
use meteo_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Default number of examples returned per query.
pub const DEFAULT_K: usize = 3;

/// Default seed for the class-balanced shuffle.
pub const DEFAULT_SEED: u64 = 42;

/// Selection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorAlgorithm {
    /// Plain nearest neighbours
    #[default]
    Similarity,
    /// Maximal marginal relevance
    #[serde(alias = "relevance")]
    Mmr,
    /// Nearest neighbours per class, budget split evenly
    SimilarityClassBalanced,
}

impl SelectorAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorAlgorithm::Similarity => "similarity",
            SelectorAlgorithm::Mmr => "mmr",
            SelectorAlgorithm::SimilarityClassBalanced => "similarity_class_balanced",
        }
    }
}

impl FromStr for SelectorAlgorithm {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "similarity" => Ok(SelectorAlgorithm::Similarity),
            "mmr" | "relevance" => Ok(SelectorAlgorithm::Mmr),
            "similarity_class_balanced" => Ok(SelectorAlgorithm::SimilarityClassBalanced),
            other => Err(AppError::Configuration(format!(
                "Unknown selector algorithm: {}. \
                 Supported: similarity, mmr, similarity_class_balanced",
                other
            ))),
        }
    }
}

impl fmt::Display for SelectorAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_class_key() -> String {
    OUTPUT_FIELD.to_string()
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Selector configuration, persisted with the trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub algorithm: SelectorAlgorithm,

    /// Example budget per query
    #[serde(default = "default_k")]
    pub k: usize,

    /// Classes to balance across (class-balanced only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_list: Vec<String>,

    /// Record field holding the class
    #[serde(default = "default_class_key")]
    pub class_key: String,

    /// MMR candidate pool size; defaults to `max(4k, 20)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_k: Option<usize>,

    /// Shuffle seed (class-balanced only)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Record fields to embed; all fields when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_keys: Option<Vec<String>>,

    #[serde(default)]
    pub metric: Metric,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            algorithm: SelectorAlgorithm::default(),
            k: DEFAULT_K,
            class_list: Vec::new(),
            class_key: default_class_key(),
            fetch_k: None,
            seed: DEFAULT_SEED,
            input_keys: None,
            metric: Metric::default(),
        }
    }
}

impl SelectorConfig {
    pub fn new(algorithm: SelectorAlgorithm, k: usize) -> Self {
        Self {
            algorithm,
            k,
            ..Self::default()
        }
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_list = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = Some(fetch_k);
        self
    }

    pub fn with_input_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Distinct classes in first-seen order.
    pub fn distinct_classes(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.class_list
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` if `k` is zero, the MMR pool is
    /// smaller than `k`, or a class-balanced selector has no classes or more
    /// distinct classes than `k`.
    pub fn validate(&self) -> AppResult<()> {
        if self.k == 0 {
            return Err(AppError::Configuration(
                "Selector k must be greater than 0".to_string(),
            ));
        }

        if let Some(keys) = &self.input_keys {
            if keys.is_empty() {
                return Err(AppError::Configuration(
                    "input_keys cannot be an empty list".to_string(),
                ));
            }
        }

        match self.algorithm {
            SelectorAlgorithm::Similarity => {}
            SelectorAlgorithm::Mmr => {
                if let Some(fetch_k) = self.fetch_k {
                    if fetch_k < self.k {
                        return Err(AppError::Configuration(format!(
                            "fetch_k ({}) must be at least k ({})",
                            fetch_k, self.k
                        )));
                    }
                }
            }
            SelectorAlgorithm::SimilarityClassBalanced => {
                let classes = self.distinct_classes();
                if classes.is_empty() {
                    return Err(AppError::Configuration(
                        "similarity_class_balanced requires a non-empty class list".to_string(),
                    ));
                }
                if self.k < classes.len() {
                    return Err(AppError::Configuration(format!(
                        "k value is {} and it must be at least the number of classes ({}) \
                         for balanced example selection",
                        self.k,
                        classes.len()
                    )));
                }
                if self.class_key.trim().is_empty() {
                    return Err(AppError::Configuration(
                        "class_key cannot be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// One selection algorithm.
pub trait SelectionPolicy: Send + Sync + fmt::Debug {
    fn algorithm(&self) -> SelectorAlgorithm;

    /// Pick at most `k` records for `query`.
    fn select(
        &self,
        index: &VectorIndex,
        provider: &dyn EmbeddingProvider,
        query: &str,
    ) -> AppResult<Vec<ExampleRecord>>;
}

/// Resolve the policy for a configuration.
pub fn create_policy(config: &SelectorConfig) -> AppResult<Box<dyn SelectionPolicy>> {
    config.validate()?;

    Ok(match config.algorithm {
        SelectorAlgorithm::Similarity => Box::new(SimilarityPolicy::new(config.k)),
        SelectorAlgorithm::Mmr => Box::new(MmrPolicy::new(config.k, config.fetch_k)),
        SelectorAlgorithm::SimilarityClassBalanced => Box::new(ClassBalancedPolicy::new(
            config.k,
            config.distinct_classes(),
            config.class_key.clone(),
            config.seed,
        )),
    })
}

/// Trainable example selector.
#[derive(Debug)]
pub struct ExampleSelector {
    config: SelectorConfig,
    supervision: Supervision,
    provider: Arc<dyn EmbeddingProvider>,
    policy: Box<dyn SelectionPolicy>,
    index: Option<VectorIndex>,
}

impl ExampleSelector {
    /// Create an untrained selector.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` for an invalid configuration or a
    /// class-balanced selector over unsupervised examples.
    pub fn new(
        config: SelectorConfig,
        supervision: Supervision,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let policy = create_policy(&config)?;

        if config.algorithm == SelectorAlgorithm::SimilarityClassBalanced
            && config.class_key == OUTPUT_FIELD
            && !supervision.is_supervised()
        {
            return Err(AppError::Configuration(
                "similarity_class_balanced needs annotated examples; use it with a supervised task"
                    .to_string(),
            ));
        }

        tracing::debug!(
            algorithm = %config.algorithm,
            k = config.k,
            supervision = %supervision,
            "Created example selector"
        );

        Ok(Self {
            config,
            supervision,
            provider,
            policy,
            index: None,
        })
    }

    /// Wrap an existing index.
    pub fn from_index(
        config: SelectorConfig,
        supervision: Supervision,
        provider: Arc<dyn EmbeddingProvider>,
        index: VectorIndex,
    ) -> AppResult<Self> {
        let mut selector = Self::new(config, supervision, provider)?;
        selector.attach(index)?;
        Ok(selector)
    }

    fn attach(&mut self, index: VectorIndex) -> AppResult<()> {
        index.check_provider(self.provider.as_ref())?;
        if index.metric() != self.config.metric {
            tracing::warn!(
                "Index metric {} differs from configured {}; using the index metric",
                index.metric(),
                self.config.metric
            );
        }
        self.index = Some(index);
        Ok(())
    }

    /// Build the index from examples and, for supervised selectors, their
    /// annotations. Replaces any previous index.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if annotations are missing for a
    /// supervised selector, supplied for an unsupervised one, or differ in
    /// length from the examples.
    pub fn train(&mut self, examples: &[String], annotations: Option<&[String]>) -> AppResult<()> {
        let records: Vec<ExampleRecord> = match (self.supervision, annotations) {
            (Supervision::Supervised, None) => {
                return Err(AppError::Validation(
                    "A supervised selector needs annotations to train".to_string(),
                ))
            }
            (Supervision::Unsupervised, Some(_)) => {
                return Err(AppError::Validation(
                    "An unsupervised selector cannot take annotations".to_string(),
                ))
            }
            (Supervision::Supervised, Some(annotations)) => {
                if annotations.len() != examples.len() {
                    return Err(AppError::Validation(format!(
                        "Got {} examples but {} annotations",
                        examples.len(),
                        annotations.len()
                    )));
                }
                examples
                    .iter()
                    .zip(annotations)
                    .map(|(input, output)| {
                        ExampleRecord::annotated(input.as_str(), output.as_str())
                    })
                    .collect()
            }
            (Supervision::Unsupervised, None) => examples
                .iter()
                .map(|input| ExampleRecord::new(input.as_str()))
                .collect(),
        };

        self.train_records(records)
    }

    /// Build the index from prepared records.
    pub fn train_records(&mut self, records: Vec<ExampleRecord>) -> AppResult<()> {
        if self.supervision.is_supervised() && records.iter().any(|r| r.output.is_none()) {
            return Err(AppError::Validation(
                "Every record of a supervised selector needs an output".to_string(),
            ));
        }

        let index = VectorIndex::build(
            records,
            self.provider.as_ref(),
            self.config.input_keys.as_deref(),
            self.config.metric,
        )?;

        tracing::info!(
            examples = index.len(),
            algorithm = %self.config.algorithm,
            "Trained example selector"
        );
        self.index = Some(index);
        Ok(())
    }

    /// Select examples for `query`, best first (shuffled for class-balanced).
    ///
    /// An untrained unsupervised selector returns no examples.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if a supervised selector is untrained.
    pub fn select(&self, query: &str) -> AppResult<Vec<ExampleRecord>> {
        let Some(index) = &self.index else {
            return match self.supervision {
                Supervision::Unsupervised => Ok(Vec::new()),
                Supervision::Supervised => Err(AppError::Validation(
                    "Selector has not been trained".to_string(),
                )),
            };
        };

        let selected = self.policy.select(index, self.provider.as_ref(), query)?;
        tracing::debug!(
            algorithm = %self.policy.algorithm(),
            selected = selected.len(),
            "Selected examples"
        );
        Ok(selected)
    }

    /// Save the trained index to `path`.
    pub fn persist(&self, path: &Path) -> AppResult<()> {
        self.trained_index()?.save(path)
    }

    /// Load a selector whose index was written by [`ExampleSelector::persist`].
    pub fn restore(
        config: SelectorConfig,
        supervision: Supervision,
        provider: Arc<dyn EmbeddingProvider>,
        path: &Path,
    ) -> AppResult<Self> {
        let mut selector = Self::new(config, supervision, provider)?;
        let index = VectorIndex::load(path)?;
        selector.attach(index)?;
        Ok(selector)
    }

    /// The trained index.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the selector is untrained.
    pub fn trained_index(&self) -> AppResult<&VectorIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| AppError::Validation("Selector has not been trained".to_string()))
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.index.is_some()
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn supervision(&self) -> Supervision {
        self.supervision
    }
}
