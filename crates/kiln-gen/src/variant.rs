//! Variant generation
//!
//! Derives new sprites from a base sprite: re-tinted color variants,
//! directional views and equipment variants. Every batch collects all
//! outcomes; one failed item never stops the others.

use crate::params::{GenerationParams, Perspective};
use crate::prompt::{CompiledPrompt, PromptCompiler};
use crate::provider::{generate_guarded, SpriteGenerator};
use crate::style::StyleAnalyzer;
use kiln_core::{slug, ContentHash, GeneratedSprite, KilnError, Result, Rgba};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in tint presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreset {
    Crimson,
    Azure,
    Emerald,
    Golden,
    Shadow,
}

impl ColorPreset {
    pub const ALL: [ColorPreset; 5] = [
        ColorPreset::Crimson,
        ColorPreset::Azure,
        ColorPreset::Emerald,
        ColorPreset::Golden,
        ColorPreset::Shadow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorPreset::Crimson => "crimson",
            ColorPreset::Azure => "azure",
            ColorPreset::Emerald => "emerald",
            ColorPreset::Golden => "golden",
            ColorPreset::Shadow => "shadow",
        }
    }

    /// Target hue (none keeps the original), saturation and value scale
    fn adjustment(&self) -> (Option<f32>, f32, f32) {
        match self {
            ColorPreset::Crimson => (Some(350.0), 1.1, 1.0),
            ColorPreset::Azure => (Some(210.0), 1.0, 1.0),
            ColorPreset::Emerald => (Some(140.0), 1.0, 0.95),
            ColorPreset::Golden => (Some(45.0), 1.15, 1.1),
            ColorPreset::Shadow => (None, 0.4, 0.45),
        }
    }

    /// Re-tint one color, alpha preserved
    pub fn tint(&self, color: Rgba) -> Rgba {
        let (hue, sat_scale, val_scale) = self.adjustment();
        let (h, s, v) = color.to_hsv();
        Rgba::from_hsv(hue.unwrap_or(h), s * sat_scale, v * val_scale, color.a)
    }
}

impl fmt::Display for ColorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorPreset {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        ColorPreset::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| KilnError::InvalidParams(format!("unknown color preset '{}'", s)))
    }
}

/// Compass direction for directional views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const FOUR_WAY: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub const EIGHT_WAY: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::NorthEast => "north-east",
            Direction::East => "east",
            Direction::SouthEast => "south-east",
            Direction::South => "south",
            Direction::SouthWest => "south-west",
            Direction::West => "west",
            Direction::NorthWest => "north-west",
        }
    }

    /// Camera perspective used to render this direction
    pub fn perspective(&self) -> Perspective {
        match self {
            Direction::North | Direction::South => Perspective::Front,
            Direction::East | Direction::West => Perspective::SideView,
            _ => Perspective::Isometric,
        }
    }

    fn facing_phrase(&self) -> String {
        match self {
            Direction::North => "facing away from the viewer".to_string(),
            Direction::South => "facing the viewer".to_string(),
            other => format!("facing {}", other.as_str().replace('-', " ")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        let dir = match key.as_str() {
            "n" | "north" | "up" => Direction::North,
            "ne" | "northeast" => Direction::NorthEast,
            "e" | "east" | "right" => Direction::East,
            "se" | "southeast" => Direction::SouthEast,
            "s" | "south" | "down" => Direction::South,
            "sw" | "southwest" => Direction::SouthWest,
            "w" | "west" | "left" => Direction::West,
            "nw" | "northwest" => Direction::NorthWest,
            _ => {
                return Err(KilnError::InvalidParams(format!("unknown direction '{}'", s)));
            }
        };
        Ok(dir)
    }
}

/// Outcome of one item in a variant batch
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub label: String,
    pub result: std::result::Result<GeneratedSprite, String>,
}

/// Every outcome of a variant batch, in request order
#[derive(Debug, Clone, Default)]
pub struct VariantBatch {
    pub outcomes: Vec<VariantOutcome>,
}

impl VariantBatch {
    fn push(&mut self, label: &str, result: Result<GeneratedSprite>) {
        if let Err(e) = &result {
            tracing::warn!(variant = label, error = %e, "variant failed");
        }
        self.outcomes.push(VariantOutcome {
            label: label.to_string(),
            result: result.map_err(|e| e.to_string()),
        });
    }

    pub fn sprites(&self) -> impl Iterator<Item = &GeneratedSprite> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn into_sprites(self) -> Vec<GeneratedSprite> {
        self.outcomes.into_iter().filter_map(|o| o.result.ok()).collect()
    }

    /// One message per failed item
    pub fn warnings(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Err(reason) => Some(format!("variant '{}' failed: {}", o.label, reason)),
                Ok(_) => None,
            })
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.sprites().count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Derives variants from base sprites
pub struct VariantGenerator {
    generator: Arc<dyn SpriteGenerator>,
    analyzer: StyleAnalyzer,
    compiler: PromptCompiler,
}

impl VariantGenerator {
    pub fn new(generator: Arc<dyn SpriteGenerator>, analyzer: StyleAnalyzer) -> Self {
        Self {
            generator,
            analyzer,
            compiler: PromptCompiler::new(),
        }
    }

    /// Re-tinted copies of `base`, one per preset
    pub fn color_variants(&self, base: &GeneratedSprite, presets: &[ColorPreset]) -> VariantBatch {
        let mut batch = VariantBatch::default();
        for preset in presets {
            batch.push(preset.as_str(), recolor(base, *preset));
        }
        batch
    }

    /// Views of the base subject from each compass direction
    #[tracing::instrument(skip_all, fields(base = %base.id, count = directions.len()))]
    pub fn directional_views(
        &self,
        base: &GeneratedSprite,
        params: &GenerationParams,
        directions: &[Direction],
    ) -> VariantBatch {
        let mut batch = VariantBatch::default();
        for direction in directions {
            let mut view = params.clone();
            view.perspective = direction.perspective();
            view.tags.push(format!("direction:{}", direction));

            let mut prompt = self.prompt_for(base, &view);
            prompt.seed = Some(direction_seed(prompt.effective_seed(), *direction));
            prompt.positive = format!("{}, {}", prompt.positive, direction.facing_phrase());

            let result = generate_guarded(self.generator.as_ref(), &prompt, &view).map(|mut sprite| {
                sprite.id = base.id.derive(direction.as_str());
                sprite
            });
            batch.push(direction.as_str(), result);
        }
        batch
    }

    /// The base subject carrying each item
    #[tracing::instrument(skip_all, fields(base = %base.id, count = items.len()))]
    pub fn equipment_variants(
        &self,
        base: &GeneratedSprite,
        params: &GenerationParams,
        items: &[String],
    ) -> VariantBatch {
        let mut batch = VariantBatch::default();
        for item in items {
            let item = item.trim();
            let mut equipped = params.clone();
            let phrase = format!("equipped with {}", item);
            equipped.theme = Some(match params.theme.as_deref() {
                Some(theme) if !theme.trim().is_empty() => format!("{}, {}", theme.trim(), phrase),
                _ => phrase,
            });
            equipped.tags.push(format!("equipment:{}", slug(item)));

            let prompt = self.prompt_for(base, &equipped);
            let result = generate_guarded(self.generator.as_ref(), &prompt, &equipped).map(|mut sprite| {
                sprite.id = base.id.derive(&format!("with_{}", slug(item)));
                sprite
            });
            batch.push(item, result);
        }
        batch
    }

    /// Compile a prompt that keeps the base sprite's seed
    fn prompt_for(&self, base: &GeneratedSprite, params: &GenerationParams) -> CompiledPrompt {
        let model = self.analyzer.resolve(params).config;
        let mut prompt = self.compiler.compile(params, &model);
        if prompt.seed.is_none() {
            prompt.seed = base.metadata.seed;
        }
        prompt
    }
}

/// Base seed salted with the direction, so opposite views never share one
fn direction_seed(seed: u64, direction: Direction) -> u64 {
    ContentHash::from_parts(&[&seed.to_le_bytes(), direction.as_str().as_bytes()]).to_seed()
}

fn recolor(base: &GeneratedSprite, preset: ColorPreset) -> Result<GeneratedSprite> {
    let mut img = base.decode()?;
    for px in img.pixels_mut() {
        if px.0[3] > 0 {
            px.0 = preset.tint(Rgba::from_array(px.0)).to_array();
        }
    }
    let mut variant = base.derive(preset.as_str(), &img)?;
    variant.metadata.palette = None;
    variant.metadata.tags.push(format!("color:{}", preset));
    Ok(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::ConceptInterpreter;
    use crate::providers::mock::MockProvider;
    use crate::style::StyleTable;

    fn setup(generator: MockProvider) -> (VariantGenerator, GeneratedSprite, GenerationParams) {
        let analyzer = StyleAnalyzer::new(Arc::new(StyleTable::builtin()));
        let params = ConceptInterpreter::new().interpret("pixel art knight").params;
        let model = analyzer.resolve(&params).config;
        let prompt = PromptCompiler::new().compile(&params, &model);
        let base = MockProvider::new().generate(&prompt, &params).unwrap();
        (VariantGenerator::new(Arc::new(generator), analyzer), base, params)
    }

    #[test]
    fn test_direction_perspective_map() {
        assert_eq!(Direction::North.perspective(), Perspective::Front);
        assert_eq!(Direction::South.perspective(), Perspective::Front);
        assert_eq!(Direction::East.perspective(), Perspective::SideView);
        assert_eq!(Direction::West.perspective(), Perspective::SideView);
        assert_eq!(Direction::NorthEast.perspective(), Perspective::Isometric);
        assert_eq!(Direction::SouthWest.perspective(), Perspective::Isometric);
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("NE".parse::<Direction>().unwrap(), Direction::NorthEast);
        assert_eq!("south-west".parse::<Direction>().unwrap(), Direction::SouthWest);
        assert_eq!("north_west".parse::<Direction>().unwrap(), Direction::NorthWest);
        assert!("up-ish".parse::<Direction>().is_err());
    }

    #[test]
    fn test_color_variants() {
        let (variants, base, _) = setup(MockProvider::new());
        let batch = variants.color_variants(&base, &ColorPreset::ALL);
        assert_eq!(batch.succeeded(), 5);
        let ids: Vec<String> = batch.sprites().map(|s| s.id.to_string()).collect();
        assert!(ids.contains(&format!("{}_crimson", base.id)));
        assert!(ids.contains(&format!("{}_shadow", base.id)));
        assert!(batch.sprites().all(|s| s.data != base.data));
    }

    #[test]
    fn test_shadow_darkens() {
        let color = Rgba::opaque(200, 120, 40);
        let shadow = ColorPreset::Shadow.tint(color);
        assert!(shadow.to_hsv().2 < color.to_hsv().2);
        assert_eq!(ColorPreset::Azure.tint(Rgba::TRANSPARENT).a, 0);
    }

    #[test]
    fn test_directional_views() {
        let (variants, base, params) = setup(MockProvider::new());
        let batch = variants.directional_views(&base, &params, &Direction::FOUR_WAY);
        assert_eq!(batch.succeeded(), 4);
        let east = batch
            .sprites()
            .find(|s| s.id.as_str().ends_with("_east"))
            .unwrap();
        assert_eq!(east.metadata.perspective, "side-view");
        let north = batch
            .sprites()
            .find(|s| s.id.as_str().ends_with("_north"))
            .unwrap();
        assert_eq!(north.metadata.perspective, "front");
    }

    #[test]
    fn test_opposite_views_differ() {
        let (variants, base, params) = setup(MockProvider::new());
        let views = [Direction::North, Direction::South];
        let batch = variants.directional_views(&base, &params, &views);
        let again = variants.directional_views(&base, &params, &views);

        let sprites: Vec<_> = batch.sprites().collect();
        assert_eq!(sprites.len(), 2);
        assert_eq!(sprites[0].metadata.perspective, sprites[1].metadata.perspective);
        assert_ne!(sprites[0].metadata.seed, sprites[1].metadata.seed);
        assert_ne!(sprites[0].data, sprites[1].data);

        let repeat: Vec<_> = again.sprites().collect();
        assert_eq!(sprites[0].data, repeat[0].data);
        assert_eq!(sprites[1].metadata.seed, repeat[1].metadata.seed);
    }

    /// Fails any prompt containing `needle`
    struct PickyGenerator {
        needle: &'static str,
        inner: MockProvider,
    }

    impl SpriteGenerator for PickyGenerator {
        fn name(&self) -> &str {
            "picky"
        }

        fn health_check(&self) -> Result<crate::provider::ProviderStatus> {
            self.inner.health_check()
        }

        fn generate(&self, prompt: &CompiledPrompt, params: &GenerationParams) -> Result<GeneratedSprite> {
            if prompt.positive.contains(self.needle) {
                return Err(KilnError::Generation("rejected".to_string()));
            }
            self.inner.generate(prompt, params)
        }
    }

    #[test]
    fn test_partial_failure_keeps_others() {
        let (_, base, params) = setup(MockProvider::new());
        let picky = PickyGenerator {
            needle: "facing east",
            inner: MockProvider::new(),
        };
        let variants = VariantGenerator::new(
            Arc::new(picky),
            StyleAnalyzer::new(Arc::new(StyleTable::builtin())),
        );
        let batch = variants.directional_views(&base, &params, &Direction::FOUR_WAY);
        assert_eq!(batch.outcomes.len(), 4);
        assert_eq!(batch.succeeded(), 3);
        assert_eq!(batch.failed(), 1);
        let warnings = batch.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("east"));
    }

    #[test]
    fn test_equipment_variants() {
        let (variants, base, params) = setup(MockProvider::new());
        let items = vec!["Iron Sword".to_string(), "shield".to_string()];
        let batch = variants.equipment_variants(&base, &params, &items);
        assert_eq!(batch.succeeded(), 2);
        let first = batch.sprites().next().unwrap();
        assert_eq!(first.id, base.id.derive("with_iron_sword"));
        assert!(first.metadata.theme.as_deref().unwrap().contains("equipped with Iron Sword"));
    }

    #[test]
    fn test_failing_generator_reports_every_item() {
        let (variants, base, params) = setup(MockProvider::failing("offline"));
        let items = vec!["bow".to_string(), "staff".to_string()];
        let batch = variants.equipment_variants(&base, &params, &items);
        assert_eq!(batch.failed(), 2);
        assert_eq!(batch.warnings().len(), 2);
        assert!(batch.warnings()[0].contains("bow"));
    }
}
