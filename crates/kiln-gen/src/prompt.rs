//! Prompt compilation
//!
//! Turns parameters and a resolved model config into the prompt pair and
//! sampler settings handed to a generator. Compilation is pure: identical
//! inputs always give an identical `CompiledPrompt`.

use crate::params::GenerationParams;
use crate::style::ModelConfig;
use kiln_core::{ContentHash, PoseDescriptor};
use serde::{Deserialize, Serialize};

/// Negative terms applied to every style
const UNIVERSAL_NEGATIVES: &[&str] = &[
    "watermark",
    "text",
    "signature",
    "cropped",
    "multiple subjects",
];

/// A fully compiled generation prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    /// Never empty
    pub positive: String,
    pub negative: String,
    pub model: String,
    #[serde(default)]
    pub lora: Option<String>,
    #[serde(default)]
    pub lora_weight: Option<f32>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub guidance_scale: Option<f32>,
    #[serde(default)]
    pub sampler: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Pose conditioning for motion retargeting
    #[serde(default)]
    pub pose: Option<PoseDescriptor>,
}

impl CompiledPrompt {
    /// The explicit seed, or one derived from the prompt text
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            ContentHash::from_parts(&[
                self.positive.as_bytes(),
                self.negative.as_bytes(),
                self.model.as_bytes(),
            ])
            .to_seed()
        })
    }

    /// Prompt for frame `index` of an `total`-frame animation
    pub fn for_frame(&self, index: u32, total: u32) -> CompiledPrompt {
        let mut prompt = self.clone();
        prompt.seed = Some(self.effective_seed().wrapping_add(index as u64) & (i64::MAX as u64));
        if total > 1 {
            prompt.positive = format!("{}, animation frame {} of {}", self.positive, index + 1, total);
        }
        prompt
    }

    /// Prompt conditioned on a reference pose
    pub fn with_pose(mut self, pose: PoseDescriptor) -> CompiledPrompt {
        self.positive = format!("{}, pose: {}", self.positive, pose.describe());
        self.pose = Some(pose);
        self
    }
}

/// Compiles prompts from parameters and model settings
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptCompiler;

impl PromptCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile the prompt.
    ///
    /// Positive order: style descriptor, entity, theme, action,
    /// perspective, quality qualifiers (palette constraints last).
    pub fn compile(&self, params: &GenerationParams, model: &ModelConfig) -> CompiledPrompt {
        let mut parts: Vec<String> = Vec::new();

        if !model.descriptor.trim().is_empty() {
            parts.push(model.descriptor.trim().to_string());
        }

        parts.push(match &params.subject {
            Some(subject) => format!("{} {}", subject, params.entity),
            None => format!("{} sprite", params.entity),
        });

        if let Some(theme) = params.theme.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(theme.to_string());
        }

        if let Some(action) = params.action {
            let frames = params.frames();
            if frames > 1 {
                parts.push(format!("{} animation, {} frames", action, frames));
            } else {
                parts.push(format!("{} pose", action));
            }
        }

        parts.push(params.perspective.prompt_phrase().to_string());

        parts.extend(model.qualifiers.iter().cloned());

        if !model.palette.is_empty() {
            parts.push(format!("palette {}", model.palette.join(" ")));
        } else if let Some(max) = model.max_colors {
            parts.push(format!("at most {} colors", max));
        }

        let mut negatives: Vec<&str> = Vec::new();
        for term in model
            .denylist
            .iter()
            .map(String::as_str)
            .chain(UNIVERSAL_NEGATIVES.iter().copied())
        {
            if !negatives.contains(&term) {
                negatives.push(term);
            }
        }

        CompiledPrompt {
            positive: parts.join(", "),
            negative: negatives.join(", "),
            model: model.model.clone(),
            lora: model.lora.clone(),
            lora_weight: model.lora.as_ref().and(model.lora_weight),
            steps: Some(model.steps),
            guidance_scale: Some(model.guidance_scale),
            sampler: Some(model.sampler.clone()),
            seed: params.seed,
            pose: None,
        }
    }
}
