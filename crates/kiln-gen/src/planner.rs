//! Asset set planning
//!
//! Given the id of a missing asset, decide which family of variants would
//! fill the gap and ask a suggestion engine for the concrete plan.

use crate::params::AnimationAction;
use crate::variant::{ColorPreset, Direction};
use kiln_core::{slug, KilnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DIRECTION_WORDS: &[&str] = &[
    "north", "south", "east", "west", "northeast", "northwest", "southeast", "southwest", "ne",
    "nw", "se", "sw", "facing", "direction", "directional",
];
const DIAGONAL_WORDS: &[&str] = &[
    "northeast", "northwest", "southeast", "southwest", "ne", "nw", "se", "sw",
];
const COLOR_WORDS: &[&str] = &[
    "color", "colour", "colors", "tint", "palette", "recolor", "red", "blue", "green", "gold",
    "crimson", "azure", "emerald", "golden", "shadow", "dark",
];
const EQUIPMENT_WORDS: &[&str] = &[
    "equipment", "equipped", "gear", "armed", "sword", "shield", "bow", "staff", "axe", "dagger",
    "spear", "armor", "armour", "helmet",
];
const ANIMATION_WORDS: &[&str] = &["anim", "animation", "animated", "frames", "cycle"];

/// Items suggested when the id names none
const DEFAULT_EQUIPMENT: &[&str] = &["sword", "shield", "bow", "staff"];

/// States planned for an animation set
const ANIMATION_SET: [AnimationAction; 6] = [
    AnimationAction::Idle,
    AnimationAction::Walk,
    AnimationAction::Run,
    AnimationAction::Attack,
    AnimationAction::Hurt,
    AnimationAction::Death,
];

/// Variant family a missing asset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetType {
    Directional,
    Animation,
    ColorVariants,
    Equipment,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Directional => "directional",
            SetType::Animation => "animation",
            SetType::ColorVariants => "color-variants",
            SetType::Equipment => "equipment",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetType {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "directional" | "direction" => Ok(SetType::Directional),
            "animation" | "animations" => Ok(SetType::Animation),
            "color-variants" | "color" | "colors" => Ok(SetType::ColorVariants),
            "equipment" => Ok(SetType::Equipment),
            other => Err(KilnError::InvalidParams(format!("unknown set type '{}'", other))),
        }
    }
}

fn tokens(asset_id: &str) -> Vec<String> {
    asset_id
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

fn is_action_word(token: &str) -> bool {
    ANIMATION_WORDS.contains(&token) || token.parse::<AnimationAction>().is_ok()
}

/// Infer the set type from keywords in `asset_id`.
///
/// Checked in order: directional, color, equipment, animation. Ids with
/// no keyword default to animation.
pub fn detect_set_type(asset_id: &str) -> SetType {
    let tokens = tokens(asset_id);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));

    if has(DIRECTION_WORDS) {
        SetType::Directional
    } else if has(COLOR_WORDS) {
        SetType::ColorVariants
    } else if has(EQUIPMENT_WORDS) {
        SetType::Equipment
    } else {
        // animation keywords and the default land in the same place
        SetType::Animation
    }
}

/// How one planned asset differs from the base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VariantSpec {
    Direction(Direction),
    Color(ColorPreset),
    Equipment(String),
    Animation(AnimationAction),
}

/// One asset to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAsset {
    pub id: String,
    /// Concept text for the generation pipeline
    pub concept: String,
    pub variant: VariantSpec,
}

/// A set of assets that fills a detected gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSetPlan {
    pub missing_id: String,
    pub base_id: String,
    pub set_type: SetType,
    pub assets: Vec<PlannedAsset>,
    pub rationale: String,
}

/// Builds concrete plans for a set type
pub trait SuggestionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn suggest(&self, missing_id: &str, set_type: SetType) -> Result<AssetSetPlan>;
}

/// Keyword-driven suggestion engine
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleSuggestionEngine;

impl RuleSuggestionEngine {
    /// Id tokens with set keywords removed
    fn base_tokens(tokens: &[String]) -> Vec<String> {
        let base: Vec<String> = tokens
            .iter()
            .filter(|t| {
                let t = t.as_str();
                !DIRECTION_WORDS.contains(&t)
                    && !COLOR_WORDS.contains(&t)
                    && !EQUIPMENT_WORDS.contains(&t)
                    && !is_action_word(t)
                    && t != "with"
            })
            .cloned()
            .collect();
        if base.is_empty() {
            vec!["sprite".to_string()]
        } else {
            base
        }
    }
}

impl SuggestionEngine for RuleSuggestionEngine {
    fn name(&self) -> &str {
        "rules"
    }

    fn suggest(&self, missing_id: &str, set_type: SetType) -> Result<AssetSetPlan> {
        let tokens = tokens(missing_id);
        let base_tokens = Self::base_tokens(&tokens);
        let base_id = base_tokens.join("_");
        let subject = base_tokens.join(" ");

        let (assets, rationale) = match set_type {
            SetType::Directional => {
                let eight_way = tokens.iter().any(|t| DIAGONAL_WORDS.contains(&t.as_str()));
                let directions: &[Direction] = if eight_way {
                    &Direction::EIGHT_WAY
                } else {
                    &Direction::FOUR_WAY
                };
                let assets = directions
                    .iter()
                    .map(|d| PlannedAsset {
                        id: format!("{}_{}", base_id, slug(d.as_str())),
                        concept: format!("{} facing {}", subject, d.as_str().replace('-', " ")),
                        variant: VariantSpec::Direction(*d),
                    })
                    .collect();
                let ways = if eight_way { 8 } else { 4 };
                (assets, format!("{}-way directional views of {}", ways, subject))
            }
            SetType::Animation => {
                let mut actions: Vec<AnimationAction> = tokens
                    .iter()
                    .filter_map(|t| t.parse::<AnimationAction>().ok())
                    .collect();
                for action in ANIMATION_SET {
                    if !actions.contains(&action) {
                        actions.push(action);
                    }
                }
                let assets = actions
                    .into_iter()
                    .map(|a| PlannedAsset {
                        id: format!("{}_{}", base_id, a.as_str()),
                        concept: format!("{} {} animation", subject, a.as_str()),
                        variant: VariantSpec::Animation(a),
                    })
                    .collect();
                (assets, format!("animation states for {}", subject))
            }
            SetType::ColorVariants => {
                let assets = ColorPreset::ALL
                    .iter()
                    .map(|p| PlannedAsset {
                        id: format!("{}_{}", base_id, p.as_str()),
                        concept: format!("{} {} color scheme", p.as_str(), subject),
                        variant: VariantSpec::Color(*p),
                    })
                    .collect();
                (assets, format!("color variants of {}", subject))
            }
            SetType::Equipment => {
                let mut items: Vec<String> = tokens
                    .iter()
                    .filter(|t| {
                        EQUIPMENT_WORDS.contains(&t.as_str())
                            && !matches!(t.as_str(), "equipment" | "equipped" | "gear" | "armed")
                    })
                    .cloned()
                    .collect();
                for item in DEFAULT_EQUIPMENT {
                    if !items.iter().any(|i| i == item) {
                        items.push(item.to_string());
                    }
                }
                let assets = items
                    .into_iter()
                    .map(|item| PlannedAsset {
                        id: format!("{}_with_{}", base_id, slug(&item)),
                        concept: format!("{} equipped with {}", subject, item),
                        variant: VariantSpec::Equipment(item),
                    })
                    .collect();
                (assets, format!("equipment loadouts for {}", subject))
            }
        };

        Ok(AssetSetPlan {
            missing_id: missing_id.to_string(),
            base_id,
            set_type,
            assets,
            rationale,
        })
    }
}

/// Picks a set type for a missing asset and delegates planning
pub struct AssetSetPlanner {
    engine: Box<dyn SuggestionEngine>,
}

impl AssetSetPlanner {
    pub fn new(engine: Box<dyn SuggestionEngine>) -> Self {
        Self { engine }
    }

    pub fn detect_set_type(&self, asset_id: &str) -> SetType {
        detect_set_type(asset_id)
    }

    /// Plan the set for `missing_id`, using `set_type` when given
    #[tracing::instrument(skip(self))]
    pub fn plan(&self, missing_id: &str, set_type: Option<SetType>) -> Result<AssetSetPlan> {
        if tokens(missing_id).is_empty() {
            return Err(KilnError::InvalidParams(
                "missing asset id is empty".to_string(),
            ));
        }
        let set_type = set_type.unwrap_or_else(|| detect_set_type(missing_id));
        tracing::debug!(set_type = %set_type, engine = self.engine.name(), "planning asset set");
        self.engine.suggest(missing_id, set_type)
    }
}

impl Default for AssetSetPlanner {
    fn default() -> Self {
        Self::new(Box::new(RuleSuggestionEngine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_beats_animation() {
        assert_eq!(detect_set_type("hero_walk_north"), SetType::Directional);
    }

    #[test]
    fn test_detection_order() {
        assert_eq!(detect_set_type("slime_crimson"), SetType::ColorVariants);
        assert_eq!(detect_set_type("knight_with_sword"), SetType::Equipment);
        assert_eq!(detect_set_type("knight_red_sword"), SetType::ColorVariants);
        assert_eq!(detect_set_type("wolf_run"), SetType::Animation);
        assert_eq!(detect_set_type("mystery_thing"), SetType::Animation);
    }

    #[test]
    fn test_set_type_from_str() {
        assert_eq!("color_variants".parse::<SetType>().unwrap(), SetType::ColorVariants);
        assert_eq!("Directional".parse::<SetType>().unwrap(), SetType::Directional);
        assert!("weather".parse::<SetType>().is_err());
    }

    #[test]
    fn test_plan_directional() {
        let plan = AssetSetPlanner::default().plan("hero_walk_north", None).unwrap();
        assert_eq!(plan.set_type, SetType::Directional);
        assert_eq!(plan.base_id, "hero");
        assert_eq!(plan.assets.len(), 4);
        assert_eq!(plan.assets[0].id, "hero_north");
    }

    #[test]
    fn test_plan_eight_way() {
        let plan = AssetSetPlanner::default().plan("guard_ne", None).unwrap();
        assert_eq!(plan.assets.len(), 8);
        assert!(plan.assets.iter().any(|a| a.id == "guard_north_east"));
    }

    #[test]
    fn test_plan_animation_puts_named_action_first() {
        let plan = AssetSetPlanner::default().plan("wolf_jump", None).unwrap();
        assert_eq!(plan.assets[0].variant, VariantSpec::Animation(AnimationAction::Jump));
        assert_eq!(plan.assets[0].concept, "wolf jump animation");
        assert_eq!(plan.assets.len(), 7);
    }

    #[test]
    fn test_plan_explicit_type() {
        let plan = AssetSetPlanner::default()
            .plan("hero_walk_north", Some(SetType::Equipment))
            .unwrap();
        assert_eq!(plan.set_type, SetType::Equipment);
        assert_eq!(plan.assets[0].id, "hero_with_sword");
    }

    #[test]
    fn test_plan_empty_id() {
        assert!(AssetSetPlanner::default().plan("__", None).is_err());
    }

    struct FixedEngine;

    impl SuggestionEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        fn suggest(&self, missing_id: &str, set_type: SetType) -> Result<AssetSetPlan> {
            Ok(AssetSetPlan {
                missing_id: missing_id.to_string(),
                base_id: "fixed".to_string(),
                set_type,
                assets: Vec::new(),
                rationale: "fixed".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_engine() {
        let planner = AssetSetPlanner::new(Box::new(FixedEngine));
        let plan = planner.plan("hero_azure", None).unwrap();
        assert_eq!(plan.base_id, "fixed");
        assert_eq!(plan.set_type, SetType::ColorVariants);
    }
}
