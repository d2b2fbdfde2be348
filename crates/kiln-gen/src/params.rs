//! Structured generation parameters
//!
//! The closed vocabularies (entity, style, perspective, action) that the
//! concept interpreter maps free text onto, and the `GenerationParams`
//! record every later stage consumes.

use kiln_core::{KilnError, Resolution, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Most frames a single request may ask for
pub const MAX_FRAME_COUNT: u32 = 256;
/// Largest width or height, in pixels
pub const MAX_DIMENSION: u32 = 4096;

/// Broad category of the depicted thing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Character,
    Creature,
    Item,
    Weapon,
    Tile,
    Effect,
    Ui,
    Prop,
    Vehicle,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        EntityType::Character,
        EntityType::Creature,
        EntityType::Item,
        EntityType::Weapon,
        EntityType::Tile,
        EntityType::Effect,
        EntityType::Ui,
        EntityType::Prop,
        EntityType::Vehicle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Creature => "creature",
            EntityType::Item => "item",
            EntityType::Weapon => "weapon",
            EntityType::Tile => "tile",
            EntityType::Effect => "effect",
            EntityType::Ui => "ui",
            EntityType::Prop => "prop",
            EntityType::Vehicle => "vehicle",
        }
    }

    /// Default frame size for this kind of asset
    pub fn default_resolution(&self) -> Resolution {
        match self {
            EntityType::Character | EntityType::Creature => Resolution::square(64),
            EntityType::Item | EntityType::Weapon | EntityType::Tile | EntityType::Ui => {
                Resolution::square(32)
            }
            EntityType::Effect | EntityType::Prop | EntityType::Vehicle => Resolution::square(48),
        }
    }

    /// Whether the entity usually animates with a body
    pub fn is_animated_body(&self) -> bool {
        matches!(self, EntityType::Character | EntityType::Creature)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| KilnError::InvalidParams(format!("unknown entity type '{}'", s)))
    }
}

/// Visual style name.
///
/// Known styles have built-in profiles; anything else is carried as
/// `Custom` and resolved to the fallback profile by the style analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VisualStyle {
    PixelArt,
    HandDrawn,
    Anime,
    Cartoon,
    Painterly,
    LowPoly,
    Vector,
    Chibi,
    Custom(String),
}

impl VisualStyle {
    pub const BUILTIN: [VisualStyle; 8] = [
        VisualStyle::PixelArt,
        VisualStyle::HandDrawn,
        VisualStyle::Anime,
        VisualStyle::Cartoon,
        VisualStyle::Painterly,
        VisualStyle::LowPoly,
        VisualStyle::Vector,
        VisualStyle::Chibi,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            VisualStyle::PixelArt => "pixel-art",
            VisualStyle::HandDrawn => "hand-drawn",
            VisualStyle::Anime => "anime",
            VisualStyle::Cartoon => "cartoon",
            VisualStyle::Painterly => "painterly",
            VisualStyle::LowPoly => "low-poly",
            VisualStyle::Vector => "vector",
            VisualStyle::Chibi => "chibi",
            VisualStyle::Custom(name) => name,
        }
    }
}

impl From<String> for VisualStyle {
    fn from(s: String) -> Self {
        let key = s.trim().to_lowercase().replace([' ', '_'], "-");
        VisualStyle::BUILTIN
            .into_iter()
            .find(|v| v.as_str() == key)
            .unwrap_or(VisualStyle::Custom(s))
    }
}

impl From<&str> for VisualStyle {
    fn from(s: &str) -> Self {
        VisualStyle::from(s.to_string())
    }
}

impl From<VisualStyle> for String {
    fn from(v: VisualStyle) -> Self {
        v.as_str().to_string()
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Perspective {
    SideView,
    TopDown,
    Isometric,
    Front,
}

impl Perspective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::SideView => "side-view",
            Perspective::TopDown => "top-down",
            Perspective::Isometric => "isometric",
            Perspective::Front => "front",
        }
    }

    /// Phrase used in prompts
    pub fn prompt_phrase(&self) -> &'static str {
        match self {
            Perspective::SideView => "side view, profile",
            Perspective::TopDown => "top-down view",
            Perspective::Isometric => "isometric view",
            Perspective::Front => "front view, facing camera",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Perspective {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "side-view" | "side" => Ok(Perspective::SideView),
            "top-down" | "top" => Ok(Perspective::TopDown),
            "isometric" | "iso" => Ok(Perspective::Isometric),
            "front" => Ok(Perspective::Front),
            other => Err(KilnError::InvalidParams(format!("unknown perspective '{}'", other))),
        }
    }
}

/// Animation state depicted by the sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationAction {
    Idle,
    Walk,
    Run,
    Attack,
    Jump,
    Hurt,
    Death,
    Cast,
    Fly,
    Swim,
}

impl AnimationAction {
    pub const ALL: [AnimationAction; 10] = [
        AnimationAction::Idle,
        AnimationAction::Walk,
        AnimationAction::Run,
        AnimationAction::Attack,
        AnimationAction::Jump,
        AnimationAction::Hurt,
        AnimationAction::Death,
        AnimationAction::Cast,
        AnimationAction::Fly,
        AnimationAction::Swim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationAction::Idle => "idle",
            AnimationAction::Walk => "walk",
            AnimationAction::Run => "run",
            AnimationAction::Attack => "attack",
            AnimationAction::Jump => "jump",
            AnimationAction::Hurt => "hurt",
            AnimationAction::Death => "death",
            AnimationAction::Cast => "cast",
            AnimationAction::Fly => "fly",
            AnimationAction::Swim => "swim",
        }
    }

    pub fn default_frame_count(&self) -> u32 {
        match self {
            AnimationAction::Idle => 4,
            AnimationAction::Walk | AnimationAction::Run => 8,
            AnimationAction::Attack | AnimationAction::Jump => 6,
            AnimationAction::Hurt => 3,
            AnimationAction::Death => 8,
            AnimationAction::Cast | AnimationAction::Fly => 6,
            AnimationAction::Swim => 8,
        }
    }

    pub fn loops_by_default(&self) -> bool {
        matches!(
            self,
            AnimationAction::Idle
                | AnimationAction::Walk
                | AnimationAction::Run
                | AnimationAction::Fly
                | AnimationAction::Swim
        )
    }

    /// Playback rate in frames per second
    pub fn frame_rate(&self) -> f32 {
        match self {
            AnimationAction::Idle => 6.0,
            AnimationAction::Run => 12.0,
            AnimationAction::Attack => 12.0,
            AnimationAction::Hurt => 10.0,
            _ => 10.0,
        }
    }
}

impl fmt::Display for AnimationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationAction {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        AnimationAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| KilnError::InvalidParams(format!("unknown action '{}'", s)))
    }
}

/// Post-processing operations applied when nothing else is requested
pub fn default_post_processing() -> Vec<String> {
    vec![
        "background-removal".to_string(),
        "normalization".to_string(),
        "palette-extraction".to_string(),
    ]
}

/// Fully resolved parameters for one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub entity: EntityType,
    /// The noun that selected the entity category (e.g. "dragon")
    #[serde(default)]
    pub subject: Option<String>,
    pub style: VisualStyle,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub action: Option<AnimationAction>,
    #[serde(default)]
    pub frame_count: Option<u32>,
    pub perspective: Perspective,
    pub resolution: Resolution,
    #[serde(default)]
    pub looping: Option<bool>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub lora: Option<String>,
    /// Fixed palette as hex strings
    #[serde(default)]
    pub palette: Option<Vec<String>>,
    #[serde(default = "default_post_processing")]
    pub post_processing: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GenerationParams {
    /// Parameters with every optional field empty
    pub fn new(entity: EntityType, style: VisualStyle, perspective: Perspective) -> Self {
        Self {
            entity,
            subject: None,
            style,
            theme: None,
            action: None,
            frame_count: None,
            perspective,
            resolution: entity.default_resolution(),
            looping: None,
            model: None,
            lora: None,
            palette: None,
            post_processing: default_post_processing(),
            seed: None,
            tags: Vec::new(),
        }
    }

    /// Resolution and frame count must be positive and within
    /// `MAX_DIMENSION` and `MAX_FRAME_COUNT`
    pub fn validate(&self) -> Result<()> {
        if !self.resolution.is_valid() {
            return Err(KilnError::InvalidParams(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.resolution.width > MAX_DIMENSION || self.resolution.height > MAX_DIMENSION {
            return Err(KilnError::InvalidParams(format!(
                "resolution {} exceeds {}x{}",
                self.resolution, MAX_DIMENSION, MAX_DIMENSION
            )));
        }
        match self.frame_count {
            Some(0) => Err(KilnError::InvalidParams(
                "frame count must be at least 1".to_string(),
            )),
            Some(n) if n > MAX_FRAME_COUNT => Err(KilnError::InvalidParams(format!(
                "frame count {} exceeds {}",
                n, MAX_FRAME_COUNT
            ))),
            _ => Ok(()),
        }
    }

    /// Effective number of frames to produce
    pub fn frames(&self) -> u32 {
        self.frame_count.unwrap_or(1).max(1)
    }

    /// Readable name used as the id prefix
    pub fn label(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(theme) = self.theme.as_deref() {
            parts.push(theme);
        }
        parts.push(self.subject.as_deref().unwrap_or(self.entity.as_str()));
        if let Some(action) = self.action {
            parts.push(action.as_str());
        }
        parts.join(" ")
    }
}
