//! Task pipelines for Meteo.
//!
//! Wires the example selector, the prompt assembler, a model client and an
//! output parser into one train/predict/save/load lifecycle per task type.
//!
//! # Example
//! ```no_run
//! use meteo_prompt::{Language, TemplateRegistry};
//! use meteo_task::{PipelineParams, TaskPipeline, TaskType};
//!
//! # fn example() -> meteo_core::AppResult<()> {
//! let registry = TemplateRegistry::with_builtins()?;
//! let params = PipelineParams::new(TaskType::Classification, Language::En)
//!     .with_labels(["positive", "negative"]);
//!
//! let mut pipeline = TaskPipeline::new(params, &registry)?;
//! let examples = vec!["I love it".to_string(), "I hate it".to_string()];
//! let annotations = vec!["positive".to_string(), "negative".to_string()];
//! pipeline.train(&examples, Some(annotations.as_slice()))?;
//!
//! let predictions = pipeline.predict(&["Best purchase ever".to_string()])?;
//! println!("{:?}", predictions);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod parser;
pub mod pipeline;
pub mod types;

#[cfg(test)]
mod tests;

pub use artifact::{load_artifact, save_artifact, validate_artifact_path, ARTIFACT_EXTENSION};
pub use parser::{create_parser, OutputParser};
pub use pipeline::{PipelineState, TaskPipeline};
pub use types::{PipelineParams, TaskType};
