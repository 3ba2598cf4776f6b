//! Task pipeline: select examples, compose the prompt, call the model,
//! parse the answer.
//!
//! A pipeline starts `Configured`, with every collaborator resolved from
//! its parameters, and becomes `Trained` once its example selector has an
//! index. Supervised tasks only predict when trained; unsupervised tasks
//! also run zero-shot.

use crate::artifact::{load_artifact, save_artifact, validate_artifact_path};
use crate::parser::{create_parser, OutputParser};
use crate::types::{PipelineParams, TaskType};
use meteo_core::{AppError, AppResult};
use meteo_knowledge::{
    create_provider, EmbeddingProvider, ExampleRecord, ExampleSelector, SelectorAlgorithm,
};
use meteo_llm::{create_client, LlmClient};
use meteo_prompt::{compose, parse_template, PromptContext, PromptTemplate, Shot, TemplateRegistry};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Collaborators built, no examples indexed
    Configured,
    /// Example selector trained or loaded
    Trained,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Configured => f.write_str("configured"),
            PipelineState::Trained => f.write_str("trained"),
        }
    }
}

pub struct TaskPipeline {
    params: PipelineParams,
    template: Arc<PromptTemplate>,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    parser: Box<dyn OutputParser>,
    /// Frozen after the first successful train
    labels: Vec<String>,
    /// `None` only while a class-balanced selector waits for its labels
    selector: Option<ExampleSelector>,
}

impl fmt::Debug for TaskPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPipeline")
            .field("task_type", &self.params.task_type)
            .field("language", &self.params.language)
            .field("llm", &self.llm.provider_name())
            .field("embedder", &self.embedder)
            .field("labels", &self.labels)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskPipeline {
    /// Build every collaborator from `params`.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` for invalid parameters, unknown
    /// providers, a missing registry template or a bad selector setup, and
    /// `AppError::Template` for an invalid custom template. Nothing is
    /// embedded or sent to the model.
    pub fn new(params: PipelineParams, registry: &TemplateRegistry) -> AppResult<Self> {
        params.validate()?;

        let template = match &params.custom_template {
            Some(source) => Arc::new(parse_template(source)?),
            None => registry.get(
                &params.model_name,
                params.language,
                params.task_type.as_str(),
            )?,
        };

        let llm = create_client(
            &params.model_provider,
            &params.model_name,
            params.endpoint.as_deref(),
        )?;
        let embedder = create_provider(&params.embedding)?;
        let labels = params.labels.clone();

        let mut pipeline = Self {
            parser: create_parser(params.task_type, &labels),
            params,
            template,
            llm,
            embedder,
            labels,
            selector: None,
        };
        pipeline.selector = pipeline.untrained_selector(&pipeline.labels)?;

        tracing::info!(
            task = %pipeline.params.task_type,
            language = %pipeline.params.language,
            model = %pipeline.params.model_name,
            "Configured task pipeline"
        );
        Ok(pipeline)
    }

    /// Replace the model client (e.g. with a scripted fake).
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    /// Replace the embedding provider before training.
    ///
    /// # Errors
    /// Returns `AppError::Validation` once the pipeline is trained, since the
    /// index was embedded with the previous provider.
    pub fn with_embedding_provider(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        if self.state() == PipelineState::Trained {
            return Err(AppError::Validation(
                "Cannot swap the embedding provider of a trained pipeline".to_string(),
            ));
        }
        self.embedder = embedder;
        self.selector = self.untrained_selector(&self.labels)?;
        Ok(self)
    }

    /// A fresh selector, or `None` when the class list is still unknown.
    fn untrained_selector(&self, labels: &[String]) -> AppResult<Option<ExampleSelector>> {
        let config = self.params.selector_config(labels);
        let supervision = self.params.task_type.supervision();
        if config.algorithm == SelectorAlgorithm::SimilarityClassBalanced && labels.is_empty() {
            if !supervision.is_supervised() {
                return Err(AppError::Configuration(format!(
                    "similarity_class_balanced cannot be used with {}, which has no labels",
                    self.params.task_type
                )));
            }
            return Ok(None);
        }

        ExampleSelector::new(config, supervision, Arc::clone(&self.embedder)).map(Some)
    }

    pub fn state(&self) -> PipelineState {
        match &self.selector {
            Some(selector) if selector.is_trained() => PipelineState::Trained,
            _ => PipelineState::Configured,
        }
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Label set in effect: configured, or inferred by `train`.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn selector(&self) -> Option<&ExampleSelector> {
        self.selector.as_ref()
    }

    /// Index the training examples. Replaces any previous index.
    ///
    /// Without configured labels, the distinct annotations (first-seen
    /// order) become the label set and stay fixed afterwards.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for empty examples, annotation misuse,
    /// or an annotation outside the label set. Nothing changes on error.
    pub fn train(&mut self, examples: &[String], annotations: Option<&[String]>) -> AppResult<()> {
        if examples.is_empty() {
            return Err(AppError::Validation(
                "train() needs at least one example".to_string(),
            ));
        }
        let supervised = self.params.task_type.supervision().is_supervised();

        let labels = match annotations {
            Some(annotations) if supervised => {
                if annotations.len() != examples.len() {
                    return Err(AppError::Validation(format!(
                        "examples and annotations must have the same length, got {} and {}",
                        examples.len(),
                        annotations.len()
                    )));
                }
                self.labels_for(annotations)?
            }
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "{} trains without annotations",
                    self.params.task_type
                )))
            }
            None if supervised => {
                return Err(AppError::Validation(format!(
                    "{} needs annotations to train",
                    self.params.task_type
                )))
            }
            None => Vec::new(),
        };

        let mut selector = match self.untrained_selector(&labels)? {
            Some(selector) => selector,
            None => {
                return Err(AppError::Configuration(
                    "similarity_class_balanced needs at least one label".to_string(),
                ))
            }
        };
        selector.train(examples, annotations)?;

        if self.labels != labels {
            tracing::info!("Inferred labels: {}", labels.join(", "));
            self.parser = create_parser(self.params.task_type, &labels);
            self.labels = labels;
        }
        self.selector = Some(selector);

        tracing::info!(
            examples = examples.len(),
            task = %self.params.task_type,
            "Trained task pipeline"
        );
        Ok(())
    }

    /// Labels after checking `annotations` against the current set.
    fn labels_for(&self, annotations: &[String]) -> AppResult<Vec<String>> {
        // Only classification answers are labels
        if self.params.task_type != TaskType::Classification {
            return Ok(self.labels.clone());
        }

        if self.labels.is_empty() {
            let mut seen = BTreeSet::new();
            return Ok(annotations
                .iter()
                .filter(|a| seen.insert(a.as_str()))
                .cloned()
                .collect());
        }

        for (position, annotation) in annotations.iter().enumerate() {
            if !self.labels.contains(annotation) {
                return Err(AppError::Validation(format!(
                    "annotation {} ({:?}) is not one of the labels: {}",
                    position,
                    annotation,
                    self.labels.join(", ")
                )));
            }
        }
        Ok(self.labels.clone())
    }

    /// Compose the prompt for `sample` without calling the model.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if a supervised pipeline is untrained.
    pub fn render_prompt(&self, sample: &str) -> AppResult<String> {
        let examples = match &self.selector {
            Some(selector) => selector.select(sample)?,
            None => {
                return Err(AppError::Validation(
                    "Pipeline has not been trained".to_string(),
                ))
            }
        };

        let shots: Vec<Shot> = examples.into_iter().map(shot_from_record).collect();
        if shots.is_empty() {
            tracing::debug!("Composing zero-shot prompt");
        }

        let prompt = compose(&self.template, &self.prompt_context(), &shots, sample)?;
        tracing::trace!(prompt = %prompt, "Rendered prompt");
        Ok(prompt)
    }

    fn prompt_context(&self) -> PromptContext {
        let params = &self.params;
        let mut context = PromptContext::new(params.language, params.task_type.example_format())
            .with_labels(self.labels.iter().cloned());

        if let Some(domain) = &params.domain {
            context = context.with_domain(domain.as_str());
        }
        if let Some(detail) = &params.detail {
            context = context.with_detail(detail.as_str());
        }
        if let Some(text) = &params.answer_format {
            context = context.with_answer_format(text.as_str());
        }
        if let Some(text) = &params.chain_of_thought {
            context = context.with_chain_of_thought(text.as_str());
        }
        context
    }

    /// Predict one sample.
    pub fn predict_one(&self, sample: &str) -> AppResult<Vec<String>> {
        let prompt = self.render_prompt(sample)?;
        let request = self
            .params
            .model_params
            .request(prompt, self.params.model_name.as_str());

        let response = self.llm.complete(&request)?;
        let result = self.parser.parse(&response.content);

        tracing::debug!(
            matched = !result.is_empty(),
            completion_tokens = response.usage.completion_tokens,
            "Parsed model answer"
        );
        Ok(result)
    }

    /// Predict each sample in order. An empty inner list means no match.
    ///
    /// # Errors
    /// Returns `AppError::Validation` before any model call if a supervised
    /// pipeline is untrained.
    pub fn predict(&self, samples: &[String]) -> AppResult<Vec<Vec<String>>> {
        if self.params.task_type.supervision().is_supervised()
            && self.state() != PipelineState::Trained
        {
            return Err(AppError::Validation(format!(
                "{} pipeline must be trained before predict()",
                self.params.task_type
            )));
        }

        samples.iter().map(|s| self.predict_one(s)).collect()
    }

    /// Save the trained state as a `.meteo` artifact.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for a bad path or an untrained
    /// pipeline, `AppError::Storage` if writing fails.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        validate_artifact_path(path)?;

        let index = self
            .selector
            .as_ref()
            .ok_or_else(|| AppError::Validation("Pipeline has not been trained".to_string()))?
            .trained_index()?;

        let mut init = self.params.clone();
        init.labels = self.labels.clone();
        save_artifact(path, index, &init)
    }

    /// Rebuild a trained pipeline from a `.meteo` artifact.
    pub fn load(path: &Path, registry: &TemplateRegistry) -> AppResult<Self> {
        let (index, params): (_, PipelineParams) = load_artifact(path)?;

        let mut pipeline = Self::new(params, registry)?;
        let config = pipeline.params.selector_config(&pipeline.labels);
        pipeline.selector = Some(ExampleSelector::from_index(
            config,
            pipeline.params.task_type.supervision(),
            Arc::clone(&pipeline.embedder),
            index,
        )?);

        Ok(pipeline)
    }
}

fn shot_from_record(record: ExampleRecord) -> Shot {
    Shot::new(record.input, record.output)
}
