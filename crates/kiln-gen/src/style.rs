//! Style profiles and model selection
//!
//! A style table maps visual style names to a generation profile (model,
//! sampler defaults, prompt vocabulary, palette constraints). The table is
//! built once at startup, optionally extended from a TOML file, and then
//! shared read-only between requests.

use crate::params::GenerationParams;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Name of the profile used when a style is unknown
pub const FALLBACK_STYLE: &str = "pixel-art";

/// A style profile as stored in the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Style name (e.g., "pixel-art")
    pub name: String,
    /// Target model identifier
    pub model: String,
    #[serde(default)]
    pub lora: Option<String>,
    #[serde(default)]
    pub lora_weight: Option<f32>,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance")]
    pub guidance_scale: f32,
    #[serde(default = "default_sampler")]
    pub sampler: String,
    /// Leading prompt phrase describing the style
    pub descriptor: String,
    /// Trailing quality phrases
    #[serde(default)]
    pub qualifiers: Vec<String>,
    /// Style-specific negative prompt terms
    #[serde(default)]
    pub denylist: Vec<String>,
    /// Upper bound on distinct colors
    #[serde(default)]
    pub max_colors: Option<usize>,
    /// Default palette as hex strings
    #[serde(default)]
    pub palette: Vec<String>,
}

fn default_steps() -> u32 {
    30
}

fn default_guidance() -> f32 {
    7.0
}

fn default_sampler() -> String {
    "euler_a".to_string()
}

/// Resolved model settings for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The profile actually used (the fallback for unknown styles)
    pub profile: String,
    pub model: String,
    pub lora: Option<String>,
    pub lora_weight: Option<f32>,
    pub steps: u32,
    pub guidance_scale: f32,
    pub sampler: String,
    pub descriptor: String,
    pub qualifiers: Vec<String>,
    pub denylist: Vec<String>,
    pub max_colors: Option<usize>,
    pub palette: Vec<String>,
}

/// TOML file wrapper
#[derive(Debug, Deserialize)]
struct StyleFile {
    #[serde(default)]
    style: Vec<StyleProfile>,
}

/// Process-wide table of style profiles
#[derive(Debug, Clone)]
pub struct StyleTable {
    profiles: BTreeMap<String, StyleProfile>,
}

impl StyleTable {
    /// The built-in profiles
    pub fn builtin() -> Self {
        let profiles = builtin_profiles()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { profiles }
    }

    /// Built-in profiles extended (or overridden) by a TOML file of
    /// `[[style]]` entries
    pub fn load_with_overrides(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: StyleFile = toml::from_str(&content).map_err(|e| {
            KilnError::Configuration(format!(
                "Failed to parse style table {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut table = Self::builtin();
        for profile in file.style {
            tracing::debug!(style = %profile.name, "loaded style profile override");
            table.profiles.insert(profile.name.clone(), profile);
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&StyleProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|k| k.as_str())
    }

    fn fallback(&self) -> StyleProfile {
        self.profiles
            .get(FALLBACK_STYLE)
            .cloned()
            .unwrap_or_else(pixel_art_profile)
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Model settings plus any configuration warnings raised while resolving
#[derive(Debug, Clone)]
pub struct StyleResolution {
    pub config: ModelConfig,
    pub warnings: Vec<String>,
}

/// Resolves a request's style into model settings by table lookup
#[derive(Debug, Clone)]
pub struct StyleAnalyzer {
    table: Arc<StyleTable>,
}

impl StyleAnalyzer {
    pub fn new(table: Arc<StyleTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &StyleTable {
        &self.table
    }

    /// Resolve model settings for `params`.
    ///
    /// Unknown styles use the pixel-art profile and report a warning.
    /// Explicit model, LoRA and palette choices in `params` win over the
    /// profile's defaults.
    pub fn resolve(&self, params: &GenerationParams) -> StyleResolution {
        let mut warnings = Vec::new();
        let mut fell_back = false;
        let profile = match self.table.get(params.style.as_str()) {
            Some(profile) => profile.clone(),
            None => {
                fell_back = true;
                let msg = format!(
                    "unknown style '{}'; using the generic {} profile",
                    params.style, FALLBACK_STYLE
                );
                tracing::warn!("{}", msg);
                warnings.push(msg);
                self.table.fallback()
            }
        };

        let mut config = ModelConfig {
            profile: profile.name,
            model: profile.model,
            lora: profile.lora,
            lora_weight: profile.lora_weight,
            steps: profile.steps,
            guidance_scale: profile.guidance_scale,
            sampler: profile.sampler,
            descriptor: profile.descriptor,
            qualifiers: profile.qualifiers,
            denylist: profile.denylist,
            max_colors: profile.max_colors,
            palette: profile.palette,
        };

        // An unknown style keeps its own name in the prompt on the fallback profile
        if fell_back {
            let name = params.style.as_str();
            config.descriptor = format!("{} style, {}", name.trim(), config.descriptor);
        }

        if let Some(model) = &params.model {
            config.model = model.clone();
        }
        if let Some(lora) = &params.lora {
            config.lora = Some(lora.clone());
            config.lora_weight.get_or_insert(0.8);
        }
        if let Some(palette) = &params.palette {
            config.max_colors = Some(palette.len());
            config.palette = palette.clone();
        }

        StyleResolution { config, warnings }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn pixel_art_profile() -> StyleProfile {
    StyleProfile {
        name: "pixel-art".to_string(),
        model: "sdxl-base-1.0".to_string(),
        lora: Some("pixel-art-xl".to_string()),
        lora_weight: Some(0.8),
        steps: 30,
        guidance_scale: 7.0,
        sampler: "euler_a".to_string(),
        descriptor: "pixel art, crisp pixels, limited palette".to_string(),
        qualifiers: strings(&["game sprite", "clean outline", "centered", "plain background"]),
        denylist: strings(&[
            "photorealistic",
            "blurry",
            "anti-aliasing",
            "gradient",
            "3d render",
            "jpeg artifacts",
        ]),
        max_colors: Some(32),
        palette: Vec::new(),
    }
}

fn builtin_profiles() -> Vec<StyleProfile> {
    let base = |name: &str, model: &str, descriptor: &str, denylist: &[&str]| StyleProfile {
        name: name.to_string(),
        model: model.to_string(),
        lora: None,
        lora_weight: None,
        steps: default_steps(),
        guidance_scale: default_guidance(),
        sampler: default_sampler(),
        descriptor: descriptor.to_string(),
        qualifiers: strings(&["game asset", "centered", "plain background", "high quality"]),
        denylist: strings(denylist),
        max_colors: None,
        palette: Vec::new(),
    };

    vec![
        pixel_art_profile(),
        base(
            "hand-drawn",
            "sdxl-base-1.0",
            "hand-drawn illustration, ink linework",
            &["photorealistic", "3d render", "pixelated"],
        ),
        StyleProfile {
            guidance_scale: 6.5,
            ..base(
                "anime",
                "animagine-xl-3.1",
                "anime style, cel shading, clean lineart",
                &["photorealistic", "3d render", "western cartoon", "pixelated"],
            )
        },
        base(
            "cartoon",
            "sdxl-base-1.0",
            "cartoon style, bold outlines, flat colors",
            &["photorealistic", "gritty", "pixelated"],
        ),
        StyleProfile {
            steps: 40,
            ..base(
                "painterly",
                "sdxl-base-1.0",
                "digital painting, visible brush strokes",
                &["pixelated", "flat vector", "3d render"],
            )
        },
        base(
            "low-poly",
            "sdxl-base-1.0",
            "low poly 3d render, flat shaded facets",
            &["photorealistic", "high detail texture", "noise"],
        ),
        StyleProfile {
            max_colors: Some(16),
            ..base(
                "vector",
                "sdxl-base-1.0",
                "flat vector art, clean geometric shapes",
                &["photorealistic", "texture", "noise", "gradient"],
            )
        },
        base(
            "chibi",
            "animagine-xl-3.1",
            "chibi, super deformed proportions, big head",
            &["photorealistic", "realistic proportions", "3d render"],
        ),
    ]
}
