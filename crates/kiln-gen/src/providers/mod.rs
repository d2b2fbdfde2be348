//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod flux;
pub mod mock;

use crate::config::KilnConfig;
use crate::provider::SpriteGenerator;
use kiln_core::{KilnError, Result};

/// Create a provider by name with configuration
pub fn create_provider(name: &str, config: &KilnConfig) -> Result<Box<dyn SpriteGenerator>> {
    if !config.is_enabled(name) {
        return Err(KilnError::Configuration(format!(
            "Provider '{}' is disabled in config",
            name
        )));
    }
    match name {
        "mock" => Ok(Box::new(mock::MockProvider::new())),
        "flux" => Ok(Box::new(flux::FluxProvider::from_config(config)?)),
        _ => Err(KilnError::Configuration(format!(
            "Unknown provider '{}'. Available: {}",
            name,
            available_providers().join(", ")
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock", "flux"]
}
