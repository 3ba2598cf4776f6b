//! Predict command handler.

use clap::Args;
use meteo_core::config::AppConfig;
use meteo_task::TaskPipeline;
use std::path::PathBuf;

/// Predict with a saved task model
#[derive(Args, Debug)]
pub struct PredictCommand {
    /// Saved task model (.meteo)
    #[arg(short, long)]
    pub artifact: PathBuf,

    /// Samples to predict
    #[arg(required = true)]
    pub texts: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PredictCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Predicting {} samples with {:?}", self.texts.len(), self.artifact);

        let registry = super::load_registry(config)?;
        let pipeline = TaskPipeline::load(&self.artifact, &registry)?;
        let predictions = pipeline.predict(&self.texts)?;

        if self.json {
            let output: Vec<_> = self
                .texts
                .iter()
                .zip(&predictions)
                .map(|(input, output)| serde_json::json!({ "input": input, "output": output }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for (input, output) in self.texts.iter().zip(&predictions) {
                println!("{}\t{}", input, output.join(", "));
            }
        }

        Ok(())
    }
}
