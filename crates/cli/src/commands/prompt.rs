//! Prompt command handler.
//!
//! Shows exactly what a saved model would send for a sample.

use clap::Args;
use meteo_core::config::AppConfig;
use meteo_task::TaskPipeline;
use std::path::PathBuf;

/// Print the composed prompt without calling the model
#[derive(Args, Debug)]
pub struct PromptCommand {
    /// Saved task model (.meteo)
    #[arg(short, long)]
    pub artifact: PathBuf,

    /// Sample text
    pub text: String,
}

impl PromptCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let registry = super::load_registry(config)?;
        let pipeline = TaskPipeline::load(&self.artifact, &registry)?;

        println!("{}", pipeline.render_prompt(&self.text)?);
        Ok(())
    }
}
