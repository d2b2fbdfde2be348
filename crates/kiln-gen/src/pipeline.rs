//! Asset pipeline orchestration
//!
//! `AssetPipeline::execute` runs one concept through every stage:
//!
//! ```text
//! Interpreting -> Compiling -> Generating -> PostProcessing? -> Validating? -> Exporting? -> Completed
//! ```
//!
//! Any stage may move the request to `Failed`. Each call is independent;
//! the pipeline only holds read-only tables and the generator handle, so
//! one instance can serve many concurrent requests.
//!
//! `execute` always returns a `PipelineResult`. Recoverable problems land
//! in `warnings`; anything that prevents a usable primary sprite lands in
//! `errors` with `success == false`. Generator failures are not retried.

use crate::concept::{ConceptInterpretation, ConceptInterpreter};
use crate::config::{KilnConfig, ValidationConfig};
use crate::export::{pack_sheet, render_bindings, ClipSpec, TargetEngine};
use crate::params::{AnimationAction, GenerationParams};
use crate::postprocess::PostProcessor;
use crate::prompt::{CompiledPrompt, PromptCompiler};
use crate::provider::{generate_guarded, SpriteGenerator, ADAPTER_PANIC};
use crate::providers::create_provider;
use crate::style::{StyleAnalyzer, StyleTable};
use crate::validate::{QualityValidator, ValidationReport};
use kiln_core::{GeneratedSprite, KilnError, Result, SpriteMetadata, SpriteSheetMetadata};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Confidence below which a warning is attached to the result
const LOW_CONFIDENCE: f32 = 0.25;

/// Stage of a single pipeline request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Interpreting,
    Compiling,
    Generating,
    PostProcessing,
    Validating,
    Exporting,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Interpreting => "interpreting",
            PipelineStage::Compiling => "compiling",
            PipelineStage::Generating => "generating",
            PipelineStage::PostProcessing => "post-processing",
            PipelineStage::Validating => "validating",
            PipelineStage::Exporting => "exporting",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives stage transitions for one request. Purely advisory.
pub trait ProgressObserver: Send + Sync {
    /// `progress` is in [0, 100]
    fn on_progress(&self, stage: PipelineStage, progress: u8);
}

/// Per-request switches
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub enable_post_processing: bool,
    pub enable_validation: bool,
    pub enable_export: bool,
    /// Engine name; unknown names fall back to generic with a warning
    pub target_engine: String,
    /// Treat validation warnings as fatal
    pub require_valid: bool,
    /// Overrides any seed derived from the concept
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_post_processing: true,
            enable_validation: true,
            enable_export: true,
            target_engine: TargetEngine::Generic.as_str().to_string(),
            require_valid: false,
            seed: None,
        }
    }
}

/// Outcome of one `execute` call
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    /// Final stage reached (`Completed` or `Failed`)
    pub stage: PipelineStage,
    /// Primary sprite; always present on success
    pub sprite: Option<GeneratedSprite>,
    /// Every produced frame, primary first
    pub frames: Vec<GeneratedSprite>,
    /// Packed PNG sheet when more than one frame was produced
    pub sheet: Option<Vec<u8>>,
    pub sheet_metadata: Option<SpriteSheetMetadata>,
    pub metadata: Option<SpriteMetadata>,
    pub code_bindings: Option<String>,
    pub target_engine: TargetEngine,
    pub interpretation: Option<ConceptInterpretation>,
    pub prompt: Option<CompiledPrompt>,
    pub validation: Option<ValidationReport>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PipelineResult {
    fn new() -> Self {
        Self {
            success: false,
            stage: PipelineStage::Interpreting,
            sprite: None,
            frames: Vec::new(),
            sheet: None,
            sheet_metadata: None,
            metadata: None,
            code_bindings: None,
            target_engine: TargetEngine::Generic,
            interpretation: None,
            prompt: None,
            validation: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Stage bookkeeping and observer notification
struct Progress<'a> {
    observer: Option<&'a dyn ProgressObserver>,
}

impl Progress<'_> {
    fn enter(&self, result: &mut PipelineResult, stage: PipelineStage, progress: u8) {
        result.stage = stage;
        tracing::debug!(stage = %stage, progress, "pipeline stage");
        if let Some(observer) = self.observer {
            observer.on_progress(stage, progress.min(100));
        }
    }
}

/// Per-action results of `generate_all_animation_states`
#[derive(Debug, Clone, Default)]
pub struct AnimationSetResult {
    pub results: Vec<(AnimationAction, PipelineResult)>,
}

impl AnimationSetResult {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.success).count()
    }

    /// One line per failed action
    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, r)| !r.success)
            .map(|(action, r)| format!("{} failed: {}", action, r.errors.join("; ")))
            .collect()
    }
}

/// Orchestrates concept-to-sprite generation
pub struct AssetPipeline {
    generator: Arc<dyn SpriteGenerator>,
    interpreter: ConceptInterpreter,
    analyzer: StyleAnalyzer,
    compiler: PromptCompiler,
    post: PostProcessor,
    validator: QualityValidator,
}

impl AssetPipeline {
    pub fn new(generator: Arc<dyn SpriteGenerator>, styles: Arc<StyleTable>, validation: ValidationConfig) -> Self {
        Self {
            generator,
            interpreter: ConceptInterpreter::new(),
            analyzer: StyleAnalyzer::new(styles),
            compiler: PromptCompiler::new(),
            post: PostProcessor::new(),
            validator: QualityValidator::new(validation),
        }
    }

    /// Build from layered config using `provider` or the configured default
    pub fn from_config(config: &KilnConfig, provider: Option<&str>) -> Result<Self> {
        let styles = match config.styles_file() {
            Some(path) => StyleTable::load_with_overrides(path)?,
            None => StyleTable::builtin(),
        };
        let name = provider.unwrap_or(config.default_provider());
        let generator: Arc<dyn SpriteGenerator> = Arc::from(create_provider(name, config)?);
        tracing::info!(provider = name, "pipeline ready");
        Ok(Self::new(generator, Arc::new(styles), config.validation.clone()))
    }

    pub fn with_post_processor(mut self, post: PostProcessor) -> Self {
        self.post = post;
        self
    }

    pub fn generator(&self) -> Arc<dyn SpriteGenerator> {
        Arc::clone(&self.generator)
    }

    pub fn analyzer(&self) -> &StyleAnalyzer {
        &self.analyzer
    }

    pub fn interpreter(&self) -> &ConceptInterpreter {
        &self.interpreter
    }

    pub fn compiler(&self) -> &PromptCompiler {
        &self.compiler
    }

    pub fn validator(&self) -> &QualityValidator {
        &self.validator
    }

    /// Run `concept` through every enabled stage
    #[tracing::instrument(skip_all, fields(concept = %concept))]
    pub fn execute(
        &self,
        concept: &str,
        config: &PipelineConfig,
        observer: Option<&dyn ProgressObserver>,
    ) -> PipelineResult {
        let progress = Progress { observer };
        let mut result = PipelineResult::new();
        progress.enter(&mut result, PipelineStage::Interpreting, 0);

        if concept.trim().is_empty() {
            return self.finish(
                result,
                &progress,
                Err(KilnError::InvalidParams("concept is empty".to_string())),
            );
        }

        let interpretation = self.interpreter.interpret(concept);
        if interpretation.confidence < LOW_CONFIDENCE {
            result.warn(format!(
                "concept interpretation has low confidence ({:.2})",
                interpretation.confidence
            ));
        }
        self.execute_interpretation(interpretation, config, progress, result)
    }

    /// Generate one result per action from a single concept.
    ///
    /// Every action runs even when others fail. An empty `actions` slice
    /// means every known action.
    pub fn generate_all_animation_states(
        &self,
        concept: &str,
        config: &PipelineConfig,
        actions: &[AnimationAction],
    ) -> AnimationSetResult {
        let actions: Vec<AnimationAction> = if actions.is_empty() {
            AnimationAction::ALL.to_vec()
        } else {
            actions.to_vec()
        };

        let mut set = AnimationSetResult::default();
        if concept.trim().is_empty() {
            for action in actions {
                set.results.push((action, self.execute(concept, config, None)));
            }
            return set;
        }

        let base = self.interpreter.interpret(concept);
        for action in actions {
            let mut interpretation = base.clone();
            let params = &mut interpretation.params;
            params.action = Some(action);
            params.frame_count = Some(action.default_frame_count());
            params.looping = Some(action.loops_by_default());
            interpretation
                .reasoning
                .push(format!("action set to {} for the animation set", action));

            let progress = Progress { observer: None };
            let mut result = PipelineResult::new();
            progress.enter(&mut result, PipelineStage::Interpreting, 0);
            let result = self.execute_interpretation(interpretation, config, progress, result);
            if !result.success {
                tracing::warn!(action = %action, "animation state failed");
            }
            set.results.push((action, result));
        }
        set
    }

    fn execute_interpretation(
        &self,
        mut interpretation: ConceptInterpretation,
        config: &PipelineConfig,
        progress: Progress<'_>,
        mut result: PipelineResult,
    ) -> PipelineResult {
        if config.seed.is_some() {
            interpretation.params.seed = config.seed;
        }
        result.interpretation = Some(interpretation.clone());

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(&interpretation.params, config, &progress, &mut result)
        }));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("pipeline stage panicked");
                Err(KilnError::Generation(ADAPTER_PANIC.to_string()))
            }
        };
        self.finish(result, &progress, outcome)
    }

    fn finish(&self, mut result: PipelineResult, progress: &Progress<'_>, outcome: Result<()>) -> PipelineResult {
        match outcome {
            Ok(()) if result.sprite.is_some() => {
                result.success = true;
                progress.enter(&mut result, PipelineStage::Completed, 100);
                tracing::info!(
                    sprite = %result.sprite.as_ref().map(|s| s.id.to_string()).unwrap_or_default(),
                    frames = result.frames.len(),
                    warnings = result.warnings.len(),
                    "pipeline completed"
                );
            }
            Ok(()) => {
                result.errors.push("pipeline produced no sprite".to_string());
                progress.enter(&mut result, PipelineStage::Failed, 100);
            }
            Err(e) => {
                let failed_at = result.stage;
                tracing::error!(stage = %failed_at, error = %e, "pipeline failed");
                result.errors.push(format!("{} failed: {}", failed_at, e));
                result.success = false;
                progress.enter(&mut result, PipelineStage::Failed, 100);
            }
        }
        result
    }

    fn run_stages(
        &self,
        params: &GenerationParams,
        config: &PipelineConfig,
        progress: &Progress<'_>,
        result: &mut PipelineResult,
    ) -> Result<()> {
        params.validate()?;

        // Compiling
        progress.enter(result, PipelineStage::Compiling, 15);
        let style = self.analyzer.resolve(params);
        for warning in style.warnings {
            result.warn(warning);
        }
        let prompt = self.compiler.compile(params, &style.config);
        result.prompt = Some(prompt.clone());

        // Generating
        progress.enter(result, PipelineStage::Generating, 30);
        let mut frames = self.generate_frames(&prompt, params, progress, result)?;

        // Post-processing
        if config.enable_post_processing {
            progress.enter(result, PipelineStage::PostProcessing, 60);
            frames = self.post_process(frames, params, result)?;
        }

        let primary = frames[0].clone();
        result.metadata = Some(primary.metadata.clone());
        result.sprite = Some(primary.clone());

        // Validating
        if config.enable_validation {
            progress.enter(result, PipelineStage::Validating, 75);
            let report = self.validator.validate(&primary);
            for warning in &report.warnings {
                result.warn(format!("validation: {}", warning));
            }
            let fatal = if !report.valid {
                Some(report.errors.join("; "))
            } else if config.require_valid && !report.warnings.is_empty() {
                Some(format!(
                    "score {:.2} with {} warnings and validation is required",
                    report.score,
                    report.warnings.len()
                ))
            } else {
                None
            };
            result.validation = Some(report);
            if let Some(reason) = fatal {
                result.frames = frames;
                return Err(KilnError::Validation(reason));
            }
        }

        // Exporting
        if config.enable_export {
            progress.enter(result, PipelineStage::Exporting, 90);
            self.export(&frames, params, config, result);
        }

        result.frames = frames;
        Ok(())
    }

    /// Produce every frame; only the first is required
    fn generate_frames(
        &self,
        prompt: &CompiledPrompt,
        params: &GenerationParams,
        progress: &Progress<'_>,
        result: &mut PipelineResult,
    ) -> Result<Vec<GeneratedSprite>> {
        let total = params.frames();
        let mut frames: Vec<GeneratedSprite> = Vec::with_capacity(total as usize);

        for index in 0..total {
            let frame_prompt = prompt.for_frame(index, total);
            match generate_guarded(self.generator.as_ref(), &frame_prompt, params) {
                Ok(mut sprite) => {
                    if let Some(first) = frames.first() {
                        sprite.id = first.id.derive(&format!("f{}", index));
                    }
                    frames.push(sprite);
                }
                Err(e) if index == 0 => return Err(e),
                Err(e) => result.warn(format!("frame {} of {} failed: {}", index + 1, total, e)),
            }
            if total > 1 {
                let pct = 30 + (25 * (index + 1) / total) as u8;
                progress.enter(result, PipelineStage::Generating, pct);
            }
        }
        Ok(frames)
    }

    fn post_process(
        &self,
        frames: Vec<GeneratedSprite>,
        params: &GenerationParams,
        result: &mut PipelineResult,
    ) -> Result<Vec<GeneratedSprite>> {
        let mut processed = Vec::with_capacity(frames.len());
        for (index, frame) in frames.into_iter().enumerate() {
            match self.post.apply_all(&frame, params) {
                Ok(outcome) => {
                    // Unknown-op warnings are the same for every frame
                    if index == 0 {
                        for warning in outcome.warnings {
                            result.warn(warning);
                        }
                    }
                    processed.push(outcome.sprite);
                }
                Err(e) if index == 0 => return Err(e),
                Err(e) => result.warn(format!("post-processing frame {} failed: {}", index + 1, e)),
            }
        }
        Ok(processed)
    }

    /// Sheet packing and bindings; failures here are warnings
    fn export(
        &self,
        frames: &[GeneratedSprite],
        params: &GenerationParams,
        config: &PipelineConfig,
        result: &mut PipelineResult,
    ) {
        let engine = match config.target_engine.parse::<TargetEngine>() {
            Ok(engine) => engine,
            Err(_) => {
                result.warn(format!(
                    "unknown target engine '{}'; using generic bindings",
                    config.target_engine
                ));
                TargetEngine::Generic
            }
        };
        result.target_engine = engine;

        if frames.len() > 1 {
            let clip = ClipSpec {
                name: params.action.map(|a| a.as_str()).unwrap_or("default").to_string(),
                frame_rate: params.action.map(|a| a.frame_rate()).unwrap_or(8.0),
                looping: params
                    .looping
                    .or(params.action.map(|a| a.loops_by_default()))
                    .unwrap_or(false),
            };
            match pack_sheet(frames, Some(&clip)) {
                Ok(packed) => {
                    result.sheet = Some(packed.data);
                    result.sheet_metadata = Some(packed.metadata);
                }
                Err(e) => result.warn(format!("sheet packing failed: {}", e)),
            }
        }

        let Some(primary) = frames.first() else {
            return;
        };
        match render_bindings(engine, primary, result.sheet_metadata.as_ref()) {
            Ok(code) => result.code_bindings = Some(code),
            Err(e) => result.warn(format!("{} bindings failed: {}", engine, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;
    use crate::providers::mock::MockProvider;
    use kiln_core::SpriteFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn pipeline_with(generator: Arc<dyn SpriteGenerator>) -> AssetPipeline {
        AssetPipeline::new(
            generator,
            Arc::new(StyleTable::builtin()),
            ValidationConfig::default(),
        )
    }

    fn pipeline() -> AssetPipeline {
        pipeline_with(Arc::new(MockProvider::new()))
    }

    fn phaser() -> PipelineConfig {
        PipelineConfig {
            target_engine: "phaser".to_string(),
            ..PipelineConfig::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(PipelineStage, u8)>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, stage: PipelineStage, progress: u8) {
            self.events.lock().unwrap().push((stage, progress));
        }
    }

    /// Counts calls and fails the `fail_at`-th one
    struct FlakyGenerator {
        calls: AtomicUsize,
        fail_at: usize,
        inner: MockProvider,
    }

    impl SpriteGenerator for FlakyGenerator {
        fn name(&self) -> &str {
            "flaky"
        }

        fn health_check(&self) -> Result<ProviderStatus> {
            Ok(ProviderStatus::Available)
        }

        fn generate(&self, prompt: &CompiledPrompt, params: &GenerationParams) -> Result<GeneratedSprite> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_at {
                return Err(KilnError::Generation("quota exceeded".to_string()));
            }
            self.inner.generate(prompt, params)
        }
    }

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

    #[test]
    fn test_fire_dragon_end_to_end() {
        let result = pipeline().execute(
            "pixel art fire dragon idle animation side view",
            &phaser(),
            None,
        );
        assert!(result.success, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());

        let sprite = result.sprite.as_ref().unwrap();
        assert_eq!(sprite.format, SpriteFormat::Png);
        assert_eq!(sprite.format.extension(), "png");

        let metadata = result.metadata.as_ref().unwrap();
        assert_eq!(metadata.entity, "creature");
        assert_eq!(metadata.perspective, "side-view");
        assert!(metadata.palette.as_ref().unwrap().is_consistent());

        assert_eq!(result.frames.len(), 4);
        assert!(result.sheet.is_some());
        let sheet = result.sheet_metadata.as_ref().unwrap();
        assert_eq!(sheet.animations[0].name, "idle");
        assert!(sheet.animations[0].looping);
        assert_eq!(result.target_engine, TargetEngine::Phaser);
        assert!(result.code_bindings.as_ref().unwrap().contains("scene.load.spritesheet"));
        assert_eq!(result.stage, PipelineStage::Completed);
    }

    #[test]
    fn test_empty_concept_fails() {
        let result = pipeline().execute("", &PipelineConfig::default(), None);
        assert!(!result.success);
        assert!(!result.errors.is_empty());
        assert!(result.sprite.is_none());
        assert_eq!(result.stage, PipelineStage::Failed);

        let blank = pipeline().execute("   ", &PipelineConfig::default(), None);
        assert!(!blank.success);
    }

    #[test]
    fn test_oversized_frame_count_fails_cleanly() {
        let result = pipeline().execute(
            "pixel art knight walk 4000000000 frames",
            &PipelineConfig::default(),
            None,
        );
        assert!(!result.success);
        assert_eq!(result.stage, PipelineStage::Failed);
        assert!(result.frames.is_empty());
        assert!(result.errors.iter().any(|e| e.contains("frame count")), "{:?}", result.errors);
    }

    #[test]
    fn test_oversized_resolution_fails_cleanly() {
        let result = pipeline().execute("pixel art knight 70000x70000", &PipelineConfig::default(), None);
        assert!(!result.success);
        assert!(result.sprite.is_none());
        assert!(result.errors.iter().any(|e| e.contains("exceeds")), "{:?}", result.errors);
        assert!(result.errors.iter().all(|e| !e.contains(ADAPTER_PANIC)));
    }

    #[test]
    fn test_decoded_size_matches_declared() {
        let result = pipeline().execute("knight 48x32", &PipelineConfig::default(), None);
        let sprite = result.sprite.unwrap();
        let img = sprite.decode().unwrap();
        assert_eq!(img.dimensions(), (sprite.width, sprite.height));
        assert_eq!(img.dimensions(), (48, 32));
    }

    #[test]
    fn test_background_removed_by_default() {
        let result = pipeline().execute("pixel art knight", &PipelineConfig::default(), None);
        let img = result.sprite.unwrap().decode().unwrap();
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_stages_can_be_disabled() {
        let config = PipelineConfig {
            enable_post_processing: false,
            enable_validation: false,
            enable_export: false,
            ..PipelineConfig::default()
        };
        let result = pipeline().execute("pixel art knight", &config, None);
        assert!(result.success);
        assert!(result.validation.is_none());
        assert!(result.code_bindings.is_none());
        let img = result.sprite.unwrap().decode().unwrap();
        assert_eq!(img.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_progress_events_ordered() {
        let recorder = Recorder::default();
        let result = pipeline().execute("pixel art knight", &PipelineConfig::default(), Some(&recorder));
        assert!(result.success);

        let events = recorder.events.lock().unwrap();
        let stages: Vec<PipelineStage> = events.iter().map(|(s, _)| *s).collect();
        let order = [
            PipelineStage::Interpreting,
            PipelineStage::Compiling,
            PipelineStage::Generating,
            PipelineStage::PostProcessing,
            PipelineStage::Validating,
            PipelineStage::Exporting,
            PipelineStage::Completed,
        ];
        let mut last = 0;
        for stage in order {
            let pos = stages.iter().position(|s| *s == stage).unwrap();
            assert!(pos >= last);
            last = pos;
        }
        assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(events.last().unwrap(), &(PipelineStage::Completed, 100));
    }

    #[test]
    fn test_generation_failure_is_fatal() {
        let result = pipeline_with(Arc::new(MockProvider::failing("backend down"))).execute(
            "pixel art knight",
            &PipelineConfig::default(),
            None,
        );
        assert!(!result.success);
        assert!(result.sprite.is_none());
        assert!(result.errors[0].contains("backend down"));
    }

    #[test]
    fn test_later_frame_failure_is_warning() {
        let flaky = FlakyGenerator {
            calls: AtomicUsize::new(0),
            fail_at: 2,
            inner: MockProvider::new(),
        };
        let result = pipeline_with(Arc::new(flaky)).execute("pixel art knight walk", &PipelineConfig::default(), None);
        assert!(result.success);
        assert_eq!(result.frames.len(), 7);
        assert!(result.warnings.iter().any(|w| w.contains("frame 3 of 8")));
    }

    #[test]
    fn test_adapter_panic_is_contained() {
        let result = pipeline_with(Arc::new(PanickingGenerator)).execute(
            "pixel art knight",
            &PipelineConfig::default(),
            None,
        );
        assert!(!result.success);
        assert!(result.errors[0].contains(ADAPTER_PANIC));
    }

    #[test]
    fn test_unknown_engine_falls_back() {
        let config = PipelineConfig {
            target_engine: "unreal".to_string(),
            ..PipelineConfig::default()
        };
        let result = pipeline().execute("pixel art coin", &config, None);
        assert!(result.success);
        assert_eq!(result.target_engine, TargetEngine::Generic);
        assert!(result.warnings.iter().any(|w| w.contains("unreal")));
    }

    #[test]
    fn test_require_valid_downgrades() {
        // 8x8 sprites trip the minimum-dimension check
        let strict = PipelineConfig {
            require_valid: true,
            ..PipelineConfig::default()
        };
        let result = pipeline().execute("pixel art coin 8x8", &strict, None);
        assert!(!result.success);
        assert!(result.validation.is_some());

        let lenient = pipeline().execute("pixel art coin 8x8", &PipelineConfig::default(), None);
        assert!(lenient.success);
        assert!(lenient.warnings.iter().any(|w| w.starts_with("validation:")));
    }

    #[test]
    fn test_seed_override_is_deterministic() {
        let config = PipelineConfig {
            seed: Some(1234),
            ..PipelineConfig::default()
        };
        let a = pipeline().execute("pixel art knight", &config, None);
        let b = pipeline().execute("pixel art knight", &config, None);
        assert_eq!(a.sprite.unwrap().data, b.sprite.unwrap().data);
        assert_eq!(a.metadata.unwrap().seed, Some(1234));
    }

    #[test]
    fn test_unknown_style_warns() {
        let mut interpretation = ConceptInterpreter::new().interpret("knight");
        interpretation.params.style = crate::params::VisualStyle::from("watercolor");
        let progress = Progress { observer: None };
        let result = pipeline().execute_interpretation(
            interpretation,
            &PipelineConfig::default(),
            progress,
            PipelineResult::new(),
        );
        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("watercolor")));
    }

    #[test]
    fn test_all_animation_states() {
        let actions = [AnimationAction::Idle, AnimationAction::Walk, AnimationAction::Hurt];
        let set = pipeline().generate_all_animation_states(
            "pixel art knight",
            &PipelineConfig::default(),
            &actions,
        );
        assert_eq!(set.results.len(), 3);
        assert_eq!(set.succeeded(), 3);
        let (action, hurt) = &set.results[2];
        assert_eq!(*action, AnimationAction::Hurt);
        assert_eq!(hurt.frames.len(), 3);
        assert_eq!(hurt.metadata.as_ref().unwrap().action.as_deref(), Some("hurt"));
    }

    #[test]
    fn test_animation_states_collect_failures() {
        let flaky = FlakyGenerator {
            calls: AtomicUsize::new(0),
            fail_at: 0,
            inner: MockProvider::new(),
        };
        let actions = [AnimationAction::Idle, AnimationAction::Hurt];
        let set = pipeline_with(Arc::new(flaky)).generate_all_animation_states(
            "pixel art knight",
            &PipelineConfig::default(),
            &actions,
        );
        assert_eq!(set.succeeded(), 1);
        assert_eq!(set.warnings().len(), 1);
        assert!(set.warnings()[0].starts_with("idle failed"));
    }
}
