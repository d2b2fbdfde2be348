//! Image generation capability boundary
//!
//! The pipeline never knows how pixels are produced. It hands a compiled
//! prompt and the request parameters to a `SpriteGenerator` and receives a
//! raw sprite back. Implementations must honor two rules: the returned
//! sprite's dimensions equal `params.resolution`, and identical prompt +
//! params (including the effective seed) yield bit-identical pixels.

use crate::params::GenerationParams;
use crate::prompt::CompiledPrompt;
use kiln_core::{GeneratedSprite, KilnError, Result, SpriteMetadata};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Error text reported when a generator panics
pub const ADAPTER_PANIC: &str = "internal error in generator adapter";

/// Status returned by a provider health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    Unavailable(String),
    NoApiKey,
}

/// Trait implemented by each image provider (mock, flux)
pub trait SpriteGenerator: Send + Sync {
    /// Provider name (e.g. "mock", "flux")
    fn name(&self) -> &str;

    /// Check if the provider is usable (API key set, service reachable)
    fn health_check(&self) -> Result<ProviderStatus>;

    /// Produce one sprite.
    ///
    /// Failures are reported as `KilnError::Generation` with the
    /// underlying cause; callers decide whether to retry.
    fn generate(&self, prompt: &CompiledPrompt, params: &GenerationParams) -> Result<GeneratedSprite>;
}

/// Metadata echoing the request, filled in by providers
pub fn sprite_metadata(provider: &str, prompt: &CompiledPrompt, params: &GenerationParams) -> SpriteMetadata {
    let mut meta = SpriteMetadata::new(
        params.entity.as_str(),
        params.style.as_str(),
        params.perspective.as_str(),
    );
    meta.subject = params.subject.clone();
    meta.theme = params.theme.clone();
    meta.action = params.action.map(|a| a.as_str().to_string());
    meta.frame_count = params.frame_count;
    meta.tags = params.tags.clone();
    meta.provider = Some(provider.to_string());
    meta.model = Some(prompt.model.clone());
    meta.seed = Some(prompt.effective_seed());
    meta.prompt = Some(prompt.positive.clone());
    meta
}

/// Call `generator` with panics contained and the output size checked.
///
/// A panic inside the adapter is logged and reported as a generation
/// failure so batch callers can keep going.
pub fn generate_guarded(
    generator: &dyn SpriteGenerator,
    prompt: &CompiledPrompt,
    params: &GenerationParams,
) -> Result<GeneratedSprite> {
    let outcome = catch_unwind(AssertUnwindSafe(|| generator.generate(prompt, params)));
    let sprite = match outcome {
        Ok(result) => result?,
        Err(_) => {
            tracing::error!(provider = generator.name(), "generator adapter panicked");
            return Err(KilnError::Generation(ADAPTER_PANIC.to_string()));
        }
    };

    let expected = params.resolution;
    if (sprite.width, sprite.height) != (expected.width, expected.height) {
        return Err(KilnError::Generation(format!(
            "{} returned {}x{} but {} was requested",
            generator.name(),
            sprite.width,
            sprite.height,
            expected
        )));
    }
    Ok(sprite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EntityType, Perspective, VisualStyle};
    use crate::providers::mock::MockProvider;
    use crate::prompt::PromptCompiler;
    use crate::style::{StyleAnalyzer, StyleTable};
    use std::sync::Arc;

    struct PanickingGenerator;

    impl SpriteGenerator for PanickingGenerator {
        fn name(&self) -> &str {
            "panicky"
        }

        fn health_check(&self) -> Result<ProviderStatus> {
            Ok(ProviderStatus::Available)
        }

        fn generate(&self, _prompt: &CompiledPrompt, _params: &GenerationParams) -> Result<GeneratedSprite> {
            panic!("adapter wiring bug");
        }
    }

    fn request() -> (CompiledPrompt, GenerationParams) {
        let params = GenerationParams::new(EntityType::Character, VisualStyle::PixelArt, Perspective::SideView);
        let analyzer = StyleAnalyzer::new(Arc::new(StyleTable::builtin()));
        let config = analyzer.resolve(&params).config;
        (PromptCompiler::new().compile(&params, &config), params)
    }

    #[test]
    fn test_guarded_maps_panic() {
        let (prompt, params) = request();
        let err = generate_guarded(&PanickingGenerator, &prompt, &params).unwrap_err();
        assert!(err.to_string().contains(ADAPTER_PANIC));
    }

    #[test]
    fn test_guarded_passes_through() {
        let (prompt, params) = request();
        let sprite = generate_guarded(&MockProvider::new(), &prompt, &params).unwrap();
        assert_eq!(sprite.width, params.resolution.width);
    }

    #[test]
    fn test_sprite_metadata_echo() {
        let (prompt, mut params) = request();
        params.tags = vec!["hero".to_string()];
        let meta = sprite_metadata("mock", &prompt, &params);
        assert_eq!(meta.entity, "character");
        assert_eq!(meta.tags, vec!["hero".to_string()]);
        assert_eq!(meta.prompt.as_deref(), Some(prompt.positive.as_str()));
    }
}
