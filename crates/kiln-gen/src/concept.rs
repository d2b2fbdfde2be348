//! Free-text concept interpretation
//!
//! Maps a creative concept ("pixel art fire dragon idle animation side
//! view") onto `GenerationParams` by keyword and synonym matching against
//! closed vocabularies. Ambiguity is data: unmatched fields fall back to
//! defaults, each default is explained in `reasoning`, and `confidence`
//! drops accordingly. Interpretation never fails and uses no randomness.

use crate::params::{
    default_post_processing, AnimationAction, EntityType, GenerationParams, Perspective,
    VisualStyle,
};
use kiln_core::{Resolution, Rgba};
use serde::{Deserialize, Serialize};

/// Result of interpreting a concept string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptInterpretation {
    pub params: GenerationParams,
    /// Share of the concept mapped onto fields rather than defaulted, in [0, 1]
    pub confidence: f32,
    /// Ordered trace of mapping and defaulting decisions
    pub reasoning: Vec<String>,
}

const STYLE_PHRASES: &[(&str, VisualStyle)] = &[
    ("pixel art", VisualStyle::PixelArt),
    ("pixel", VisualStyle::PixelArt),
    ("pixelated", VisualStyle::PixelArt),
    ("8 bit", VisualStyle::PixelArt),
    ("16 bit", VisualStyle::PixelArt),
    ("hand drawn", VisualStyle::HandDrawn),
    ("sketch", VisualStyle::HandDrawn),
    ("sketchy", VisualStyle::HandDrawn),
    ("anime", VisualStyle::Anime),
    ("manga", VisualStyle::Anime),
    ("cartoon", VisualStyle::Cartoon),
    ("cartoony", VisualStyle::Cartoon),
    ("toon", VisualStyle::Cartoon),
    ("painterly", VisualStyle::Painterly),
    ("painted", VisualStyle::Painterly),
    ("watercolor", VisualStyle::Painterly),
    ("low poly", VisualStyle::LowPoly),
    ("vector", VisualStyle::Vector),
    ("flat", VisualStyle::Vector),
    ("chibi", VisualStyle::Chibi),
];

const PERSPECTIVE_PHRASES: &[(&str, Perspective)] = &[
    ("side view", Perspective::SideView),
    ("side scroller", Perspective::SideView),
    ("side scrolling", Perspective::SideView),
    ("platformer", Perspective::SideView),
    ("profile", Perspective::SideView),
    ("side", Perspective::SideView),
    ("top down", Perspective::TopDown),
    ("overhead", Perspective::TopDown),
    ("birds eye", Perspective::TopDown),
    ("isometric", Perspective::Isometric),
    ("iso", Perspective::Isometric),
    ("front view", Perspective::Front),
    ("front facing", Perspective::Front),
    ("facing camera", Perspective::Front),
    ("front", Perspective::Front),
];

const ENTITY_PHRASES: &[(&str, EntityType)] = &[
    ("character", EntityType::Character),
    ("hero", EntityType::Character),
    ("heroine", EntityType::Character),
    ("knight", EntityType::Character),
    ("warrior", EntityType::Character),
    ("mage", EntityType::Character),
    ("wizard", EntityType::Character),
    ("witch", EntityType::Character),
    ("archer", EntityType::Character),
    ("rogue", EntityType::Character),
    ("ninja", EntityType::Character),
    ("samurai", EntityType::Character),
    ("soldier", EntityType::Character),
    ("player", EntityType::Character),
    ("npc", EntityType::Character),
    ("villager", EntityType::Character),
    ("princess", EntityType::Character),
    ("king", EntityType::Character),
    ("queen", EntityType::Character),
    ("pirate", EntityType::Character),
    ("robot", EntityType::Character),
    ("creature", EntityType::Creature),
    ("monster", EntityType::Creature),
    ("dragon", EntityType::Creature),
    ("slime", EntityType::Creature),
    ("goblin", EntityType::Creature),
    ("orc", EntityType::Creature),
    ("skeleton", EntityType::Creature),
    ("zombie", EntityType::Creature),
    ("wolf", EntityType::Creature),
    ("bat", EntityType::Creature),
    ("spider", EntityType::Creature),
    ("beast", EntityType::Creature),
    ("demon", EntityType::Creature),
    ("ghost", EntityType::Creature),
    ("golem", EntityType::Creature),
    ("cat", EntityType::Creature),
    ("dog", EntityType::Creature),
    ("bird", EntityType::Creature),
    ("fish", EntityType::Creature),
    ("item", EntityType::Item),
    ("potion", EntityType::Item),
    ("coin", EntityType::Item),
    ("gem", EntityType::Item),
    ("key", EntityType::Item),
    ("chest", EntityType::Item),
    ("scroll", EntityType::Item),
    ("ring", EntityType::Item),
    ("amulet", EntityType::Item),
    ("weapon", EntityType::Weapon),
    ("sword", EntityType::Weapon),
    ("axe", EntityType::Weapon),
    ("bow", EntityType::Weapon),
    ("staff", EntityType::Weapon),
    ("spear", EntityType::Weapon),
    ("dagger", EntityType::Weapon),
    ("hammer", EntityType::Weapon),
    ("shield", EntityType::Weapon),
    ("tile", EntityType::Tile),
    ("tileset", EntityType::Tile),
    ("ground", EntityType::Tile),
    ("floor", EntityType::Tile),
    ("wall", EntityType::Tile),
    ("platform", EntityType::Tile),
    ("terrain", EntityType::Tile),
    ("effect", EntityType::Effect),
    ("explosion", EntityType::Effect),
    ("fireball", EntityType::Effect),
    ("spark", EntityType::Effect),
    ("smoke", EntityType::Effect),
    ("particle", EntityType::Effect),
    ("aura", EntityType::Effect),
    ("lightning", EntityType::Effect),
    ("projectile", EntityType::Effect),
    ("health bar", EntityType::Ui),
    ("ui", EntityType::Ui),
    ("hud", EntityType::Ui),
    ("icon", EntityType::Ui),
    ("button", EntityType::Ui),
    ("cursor", EntityType::Ui),
    ("prop", EntityType::Prop),
    ("tree", EntityType::Prop),
    ("rock", EntityType::Prop),
    ("barrel", EntityType::Prop),
    ("crate", EntityType::Prop),
    ("door", EntityType::Prop),
    ("torch", EntityType::Prop),
    ("house", EntityType::Prop),
    ("vehicle", EntityType::Vehicle),
    ("car", EntityType::Vehicle),
    ("ship", EntityType::Vehicle),
    ("spaceship", EntityType::Vehicle),
    ("tank", EntityType::Vehicle),
    ("boat", EntityType::Vehicle),
    ("airship", EntityType::Vehicle),
];

const ACTION_PHRASES: &[(&str, AnimationAction)] = &[
    ("idle", AnimationAction::Idle),
    ("idling", AnimationAction::Idle),
    ("standing", AnimationAction::Idle),
    ("breathing", AnimationAction::Idle),
    ("walk", AnimationAction::Walk),
    ("walking", AnimationAction::Walk),
    ("walk cycle", AnimationAction::Walk),
    ("run", AnimationAction::Run),
    ("running", AnimationAction::Run),
    ("sprint", AnimationAction::Run),
    ("dash", AnimationAction::Run),
    ("attack", AnimationAction::Attack),
    ("attacking", AnimationAction::Attack),
    ("slash", AnimationAction::Attack),
    ("strike", AnimationAction::Attack),
    ("punch", AnimationAction::Attack),
    ("jump", AnimationAction::Jump),
    ("jumping", AnimationAction::Jump),
    ("leap", AnimationAction::Jump),
    ("hurt", AnimationAction::Hurt),
    ("hit", AnimationAction::Hurt),
    ("damaged", AnimationAction::Hurt),
    ("death", AnimationAction::Death),
    ("die", AnimationAction::Death),
    ("dying", AnimationAction::Death),
    ("defeat", AnimationAction::Death),
    ("cast", AnimationAction::Cast),
    ("casting", AnimationAction::Cast),
    ("spellcast", AnimationAction::Cast),
    ("fly", AnimationAction::Fly),
    ("flying", AnimationAction::Fly),
    ("hover", AnimationAction::Fly),
    ("swim", AnimationAction::Swim),
    ("swimming", AnimationAction::Swim),
];

/// Filler words that carry no field information
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "with", "in", "for", "and", "sprite", "sprites", "animation",
    "animated", "anim", "sheet", "spritesheet", "game", "asset", "style", "view", "cycle",
];

const LOOP_WORDS: &[&str] = &["loop", "looping", "looped", "seamless"];
const NO_LOOP_PHRASES: &[&str] = &["no loop", "non looping", "one shot", "once"];

/// A token of the concept, with its display form preserved
#[derive(Debug, Clone)]
struct Token {
    display: String,
    norm: String,
    consumed: bool,
}

/// Interprets concept strings using fixed keyword tables.
///
/// The tables are static, so one interpreter can be shared freely across
/// threads and requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConceptInterpreter;

impl ConceptInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Interpret a concept into parameters, confidence and reasoning
    pub fn interpret(&self, concept: &str) -> ConceptInterpretation {
        let mut tokens = tokenize(concept);
        let mut reasoning = Vec::new();

        if tokens.is_empty() {
            reasoning.push("concept is empty; every field defaulted".to_string());
        }

        let style = match_phrase(&mut tokens, STYLE_PHRASES);
        let perspective = match_phrase(&mut tokens, PERSPECTIVE_PHRASES);
        let action = match_phrase(&mut tokens, ACTION_PHRASES);
        let entity = match_phrase(&mut tokens, ENTITY_PHRASES);

        let looping = match_loop_flag(&mut tokens);
        let resolution = match_resolution(&mut tokens);
        let frame_count = match_frame_count(&mut tokens);
        let palette = match_palette(&mut tokens);

        for token in tokens.iter_mut() {
            if STOPWORDS.contains(&token.norm.as_str()) {
                token.consumed = true;
            }
        }

        let mut mapped = 0u32;

        let (entity, subject) = match entity {
            Some((entity, matched)) => {
                mapped += 1;
                reasoning.push(format!("entity '{}' mapped to {}", matched, entity));
                let subject = (matched != entity.as_str()).then_some(matched);
                (entity, subject)
            }
            None => {
                reasoning.push("no entity keyword found; defaulting to character".to_string());
                (EntityType::Character, None)
            }
        };

        let style = match style {
            Some((style, matched)) => {
                mapped += 1;
                reasoning.push(format!("style '{}' mapped to {}", matched, style));
                style
            }
            None => {
                reasoning.push("no style keyword found; defaulting to pixel-art".to_string());
                VisualStyle::PixelArt
            }
        };

        let perspective = match perspective {
            Some((perspective, matched)) => {
                mapped += 1;
                reasoning.push(format!("perspective '{}' mapped to {}", matched, perspective));
                perspective
            }
            None => {
                reasoning.push("no perspective keyword found; defaulting to side-view".to_string());
                Perspective::SideView
            }
        };

        let action = match action {
            Some((action, matched)) => {
                mapped += 1;
                reasoning.push(format!("action '{}' mapped to {}", matched, action));
                Some(action)
            }
            None => {
                reasoning.push("no action keyword found; producing a static sprite".to_string());
                None
            }
        };

        let mut params = GenerationParams::new(entity, style, perspective);
        params.subject = subject;
        params.action = action;
        params.palette = palette;
        params.post_processing = default_post_processing();

        match resolution {
            Some(res) => {
                reasoning.push(format!("explicit resolution {}", res));
                params.resolution = res;
            }
            None => reasoning.push(format!(
                "no resolution given; using {} for {}",
                params.resolution, entity
            )),
        }

        params.frame_count = match (frame_count, action) {
            (Some(n), _) => {
                reasoning.push(format!("explicit frame count {}", n));
                Some(n)
            }
            (None, Some(action)) => {
                let n = action.default_frame_count();
                reasoning.push(format!("no frame count given; using {} frames for {}", n, action));
                Some(n)
            }
            (None, None) => None,
        };

        params.looping = match (looping, action) {
            (Some(flag), _) => Some(flag),
            (None, Some(action)) => Some(action.loops_by_default()),
            (None, None) => None,
        };

        if let Some(palette) = &params.palette {
            reasoning.push(format!("fixed palette of {} colors", palette.len()));
        }

        let theme: Vec<&str> = tokens
            .iter()
            .filter(|t| !t.consumed)
            .map(|t| t.display.as_str())
            .collect();
        if !theme.is_empty() {
            let theme = theme.join(" ");
            reasoning.push(format!("unmatched text '{}' kept as theme", theme));
            params.theme = Some(theme);
        }

        let mut confidence = mapped as f32 / 4.0;
        if params.theme.is_some() {
            confidence += 0.1;
        }
        let confidence = if tokens.is_empty() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        tracing::debug!(
            concept,
            confidence,
            entity = %params.entity,
            style = %params.style,
            "interpreted concept"
        );

        ConceptInterpretation {
            params,
            confidence,
            reasoning,
        }
    }
}

fn tokenize(concept: &str) -> Vec<Token> {
    concept
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '!' | '?' | '(' | ')' | '"'))
        .flat_map(|word| {
            // Split hyphenated words ("side-view", "8-bit") but keep hex colors and sizes intact
            let keep_whole = word.starts_with('#') || is_resolution(word);
            let pieces: Vec<&str> = if keep_whole {
                vec![word]
            } else {
                word.split(['-', '_', '.', ':', '/']).collect()
            };
            pieces.into_iter().map(|p| p.to_string()).collect::<Vec<_>>()
        })
        .map(|display| display.trim_matches(|c: char| c == '\'' || c == '.').to_string())
        .filter(|display| !display.is_empty())
        .map(|display| Token {
            norm: display.to_lowercase(),
            display,
            consumed: false,
        })
        .collect()
}

/// Find the longest, then leftmost, table phrase among unconsumed tokens
fn match_phrase<T: Clone>(tokens: &mut [Token], table: &[(&str, T)]) -> Option<(T, String)> {
    let mut best: Option<(usize, usize, usize)> = None; // (word count, start, table index)

    for (idx, (phrase, _)) in table.iter().enumerate() {
        let words: Vec<&str> = phrase.split(' ').collect();
        if words.len() > tokens.len() {
            continue;
        }
        for start in 0..=tokens.len() - words.len() {
            let window = &tokens[start..start + words.len()];
            let hit = window
                .iter()
                .zip(&words)
                .all(|(t, w)| !t.consumed && t.norm == *w);
            if !hit {
                continue;
            }
            let better = match best {
                None => true,
                Some((len, best_start, _)) => {
                    words.len() > len || (words.len() == len && start < best_start)
                }
            };
            if better {
                best = Some((words.len(), start, idx));
            }
        }
    }

    let (len, start, idx) = best?;
    let matched: Vec<String> = tokens[start..start + len]
        .iter_mut()
        .map(|t| {
            t.consumed = true;
            t.norm.clone()
        })
        .collect();
    Some((table[idx].1.clone(), matched.join(" ")))
}

fn match_loop_flag(tokens: &mut [Token]) -> Option<bool> {
    for phrase in NO_LOOP_PHRASES {
        let words: Vec<&str> = phrase.split(' ').collect();
        if words.len() > tokens.len() {
            continue;
        }
        for start in 0..=tokens.len() - words.len() {
            let window = &tokens[start..start + words.len()];
            if window.iter().zip(&words).all(|(t, w)| !t.consumed && t.norm == *w) {
                for t in &mut tokens[start..start + words.len()] {
                    t.consumed = true;
                }
                return Some(false);
            }
        }
    }
    for token in tokens.iter_mut() {
        if !token.consumed && LOOP_WORDS.contains(&token.norm.as_str()) {
            token.consumed = true;
            return Some(true);
        }
    }
    None
}

fn is_resolution(word: &str) -> bool {
    parse_resolution(word).is_some()
}

fn parse_resolution(word: &str) -> Option<Resolution> {
    let lower = word.to_lowercase();
    let (w, h) = lower.split_once('x')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    let res = Resolution::new(w, h);
    res.is_valid().then_some(res)
}

fn match_resolution(tokens: &mut [Token]) -> Option<Resolution> {
    for token in tokens.iter_mut() {
        if token.consumed {
            continue;
        }
        if let Some(res) = parse_resolution(&token.norm) {
            token.consumed = true;
            return Some(res);
        }
    }
    None
}

/// `8 frames`, `8-frame`, `8 frame`
fn match_frame_count(tokens: &mut [Token]) -> Option<u32> {
    for i in 0..tokens.len().saturating_sub(1) {
        if tokens[i].consumed || tokens[i + 1].consumed {
            continue;
        }
        if !matches!(tokens[i + 1].norm.as_str(), "frame" | "frames") {
            continue;
        }
        if let Ok(n) = tokens[i].norm.parse::<u32>() {
            if n >= 1 {
                tokens[i].consumed = true;
                tokens[i + 1].consumed = true;
                return Some(n);
            }
        }
    }
    None
}

fn match_palette(tokens: &mut [Token]) -> Option<Vec<String>> {
    let mut colors = Vec::new();
    for token in tokens.iter_mut() {
        if token.consumed || !token.norm.starts_with('#') {
            continue;
        }
        if let Some(color) = Rgba::from_hex(&token.norm) {
            token.consumed = true;
            colors.push(color.to_hex());
        }
    }
    (!colors.is_empty()).then_some(colors)
}
