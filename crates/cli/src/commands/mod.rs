//! Command handlers for the Meteo CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod predict;
pub mod prompt;
pub mod templates;
pub mod train;

pub use predict::PredictCommand;
pub use prompt::PromptCommand;
pub use templates::TemplatesCommand;
pub use train::TrainCommand;

use meteo_core::{config::AppConfig, AppResult};
use meteo_prompt::TemplateRegistry;

/// Built-in templates plus the workspace template directory.
pub fn load_registry(config: &AppConfig) -> AppResult<TemplateRegistry> {
    let mut registry = TemplateRegistry::with_builtins()?;
    registry.load_dir(&config.template_dir())?;
    Ok(registry)
}
