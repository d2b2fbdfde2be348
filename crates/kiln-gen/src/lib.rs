//! Kiln Gen - concept-to-sprite generation pipeline
//!
//! Interprets free-text concepts, resolves style profiles, compiles prompts
//! for pluggable image generators, and post-processes, validates and
//! exports the results. Also hosts variant generation and asset-set
//! planning.

pub mod concept;
pub mod config;
pub mod export;
pub mod params;
pub mod pipeline;
pub mod planner;
pub mod postprocess;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod style;
pub mod validate;
pub mod variant;

pub use concept::{ConceptInterpretation, ConceptInterpreter};
pub use config::{KilnConfig, ValidationConfig};
pub use export::{pack_sheet, render_bindings, ClipSpec, PackedSheet, TargetEngine};
pub use params::{
    AnimationAction, EntityType, GenerationParams, Perspective, VisualStyle, MAX_DIMENSION, MAX_FRAME_COUNT,
};
pub use pipeline::{
    AnimationSetResult, AssetPipeline, PipelineConfig, PipelineResult, PipelineStage,
    ProgressObserver,
};
pub use planner::{AssetSetPlan, AssetSetPlanner, SetType};
pub use postprocess::{PostOperation, PostProcessor};
pub use prompt::{CompiledPrompt, PromptCompiler};
pub use provider::{generate_guarded, ProviderStatus, SpriteGenerator};
pub use style::{ModelConfig, StyleAnalyzer, StyleTable};
pub use validate::{QualityValidator, ValidationReport};
pub use variant::{ColorPreset, Direction, VariantBatch, VariantGenerator};
