//! Templates command handler.

use clap::Args;
use meteo_core::config::AppConfig;

/// List registered prompt templates
#[derive(Args, Debug)]
pub struct TemplatesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TemplatesCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let registry = super::load_registry(config)?;
        let keys: Vec<_> = registry.keys().collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&keys)?);
        } else {
            for key in keys {
                println!("{:<12} {:<4} {}", key.model, key.language.as_str(), key.task);
            }
        }

        Ok(())
    }
}
