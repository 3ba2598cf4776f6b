//! Train command handler.
//!
//! Reads a JSON array of `{"input": ..., "output": ...}` rows, trains a task
//! pipeline and saves it as a `.meteo` artifact.

use anyhow::Context;
use clap::Args;
use meteo_core::{config::AppConfig, AppError, AppResult};
use meteo_knowledge::{EmbeddingConfig, SelectorAlgorithm};
use meteo_task::{PipelineParams, TaskPipeline, TaskType};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Train a task model from labelled examples
#[derive(Args, Debug)]
pub struct TrainCommand {
    /// Task type (classification, qa, code-generation, ...)
    #[arg(short, long)]
    pub task: String,

    /// JSON file with the training rows
    #[arg(short, long)]
    pub examples: PathBuf,

    /// Where to write the model (.meteo)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Allowed labels, comma separated (inferred when omitted)
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Examples per prompt
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Selection algorithm (similarity, mmr, similarity_class_balanced)
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Shuffle seed for class-balanced selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Domain of the texts
    #[arg(long)]
    pub domain: Option<String>,

    /// Extra instructions for the model
    #[arg(long)]
    pub detail: Option<String>,

    /// YAML template used instead of the registry
    #[arg(long)]
    pub template: Option<PathBuf>,
}

/// One training row.
#[derive(Debug, Deserialize)]
struct TrainingRow {
    input: String,
    #[serde(default)]
    output: Option<String>,
}

impl TrainCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing train command");
        tracing::debug!("Train options: {:?}", self);

        // Fail on a bad output path before spending time on embeddings
        meteo_task::validate_artifact_path(&self.output)?;

        let (examples, annotations) = read_examples(&self.examples)
            .with_context(|| format!("Failed to load training data from {:?}", self.examples))?;

        let mut params = self.params(config)?;
        if let Some(path) = &self.template {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {:?}", path))?;
            params = params.with_custom_template(source);
        }

        let registry = super::load_registry(config)?;
        let mut pipeline = TaskPipeline::new(params, &registry)?;
        pipeline.train(&examples, annotations.as_deref())?;
        pipeline.save(&self.output)?;

        println!(
            "Trained {} on {} examples -> {}",
            pipeline.params().task_type,
            examples.len(),
            self.output.display()
        );
        if !pipeline.labels().is_empty() {
            println!("Labels: {}", pipeline.labels().join(", "));
        }

        Ok(())
    }

    fn params(&self, config: &AppConfig) -> AppResult<PipelineParams> {
        let task_type: TaskType = self.task.parse()?;
        let mut params = PipelineParams::new(task_type, config.language.parse()?)
            .with_model(config.provider.as_str(), config.model.as_str())
            .with_labels(self.labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()));

        let settings = &config.embeddings;
        let mut embedding = EmbeddingConfig::new(
            settings.provider.as_str(),
            settings.model.as_str(),
            settings.dimensions,
        );
        if settings.provider == "ollama" {
            embedding = embedding.with_endpoint(config.endpoint.as_str());
        }
        params = params.with_embedding(embedding);

        if config.provider == "ollama" {
            params = params.with_endpoint(config.endpoint.as_str());
        }

        let algorithm = match &self.algorithm {
            Some(name) => name.parse::<SelectorAlgorithm>()?,
            None => params.selector.algorithm,
        };
        let k = self.k.unwrap_or(params.selector.k);
        params = params.with_selector(algorithm, k);

        if let Some(seed) = self.seed {
            params = params.with_seed(seed);
        }
        if let Some(domain) = &self.domain {
            params = params.with_domain(domain.as_str());
        }
        if let Some(detail) = &self.detail {
            params = params.with_detail(detail.as_str());
        }

        Ok(params)
    }
}

/// Split rows into inputs and, when every row has one, annotations.
fn read_examples(path: &Path) -> AppResult<(Vec<String>, Option<Vec<String>>)> {
    let contents = std::fs::read_to_string(path)?;
    let rows: Vec<TrainingRow> = serde_json::from_str(&contents)?;

    let annotated = rows.iter().filter(|r| r.output.is_some()).count();
    if annotated != 0 && annotated != rows.len() {
        return Err(AppError::Validation(format!(
            "{} of {} rows have an output; annotate all rows or none",
            annotated,
            rows.len()
        )));
    }

    let mut examples = Vec::with_capacity(rows.len());
    let mut annotations = Vec::with_capacity(annotated);
    for row in rows {
        examples.push(row.input);
        annotations.extend(row.output);
    }

    Ok((examples, (annotated > 0).then_some(annotations)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("examples.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_annotated_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"[{"input": "estoy feliz", "output": "positivo"},
                {"input": "no me gusta", "output": "negativo"}]"#,
        );

        let (examples, annotations) = read_examples(&path).unwrap();
        assert_eq!(examples, vec!["estoy feliz", "no me gusta"]);
        assert_eq!(annotations.unwrap(), vec!["positivo", "negativo"]);
    }

    #[test]
    fn test_read_unannotated_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"[{"input": "Rust was released in 2015."}]"#);

        let (examples, annotations) = read_examples(&path).unwrap();
        assert_eq!(examples.len(), 1);
        assert!(annotations.is_none());
    }

    #[test]
    fn test_mixed_rows_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"[{"input": "a", "output": "x"}, {"input": "b"}]"#);

        assert!(matches!(read_examples(&path), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_bad_output_path_fails_before_training() {
        let dir = TempDir::new().unwrap();
        let examples = write(&dir, r#"[{"input": "estoy feliz", "output": "positivo"}]"#);
        let command = TrainCommand {
            task: "classification".to_string(),
            examples,
            output: dir.path().join("model.bin"),
            labels: Vec::new(),
            k: None,
            algorithm: None,
            seed: None,
            domain: None,
            detail: None,
            template: None,
        };

        let err = command.execute(&AppConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Validation(_))
        ));
        assert!(!dir.path().join("model.bin").exists());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "not json");

        assert!(matches!(
            read_examples(&path),
            Err(AppError::Serialization(_))
        ));
    }
}
