//! Export: sprite sheet packing and engine code bindings

use image::RgbaImage;
use kiln_core::{slug, GeneratedSprite, KilnError, Result, SpriteId, SpriteSheetMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Widest grid produced by `pack_sheet`
pub const MAX_SHEET_COLUMNS: u32 = 8;

/// Engine the code bindings are rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetEngine {
    Phaser,
    Godot,
    Unity,
    #[default]
    Generic,
}

impl TargetEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetEngine::Phaser => "phaser",
            TargetEngine::Godot => "godot",
            TargetEngine::Unity => "unity",
            TargetEngine::Generic => "generic",
        }
    }

    /// Extension of the bindings file
    pub fn extension(&self) -> &'static str {
        match self {
            TargetEngine::Phaser => "js",
            TargetEngine::Godot => "gd",
            TargetEngine::Unity => "cs",
            TargetEngine::Generic => "json",
        }
    }
}

impl fmt::Display for TargetEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetEngine {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "phaser" | "phaser3" => Ok(TargetEngine::Phaser),
            "godot" => Ok(TargetEngine::Godot),
            "unity" => Ok(TargetEngine::Unity),
            "generic" | "json" => Ok(TargetEngine::Generic),
            other => Err(KilnError::Configuration(format!(
                "unknown target engine '{}'",
                other
            ))),
        }
    }
}

/// Clip settings applied to a packed sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    pub name: String,
    pub frame_rate: f32,
    pub looping: bool,
}

/// A PNG sprite sheet and its layout
#[derive(Debug, Clone)]
pub struct PackedSheet {
    pub data: Vec<u8>,
    pub metadata: SpriteSheetMetadata,
}

/// File name used for a sprite's sheet
pub fn sheet_file_name(id: &SpriteId) -> String {
    format!("{}_sheet.png", id)
}

/// File name used for a sprite's bindings
pub fn bindings_file_name(id: &SpriteId, engine: TargetEngine) -> String {
    format!("{}.{}", id, engine.extension())
}

/// Pack equally sized frames row-major into a grid sheet
pub fn pack_sheet(frames: &[GeneratedSprite], clip: Option<&ClipSpec>) -> Result<PackedSheet> {
    let first = frames
        .first()
        .ok_or_else(|| KilnError::InvalidSheet("no frames to pack".to_string()))?;
    let (fw, fh) = (first.width, first.height);

    let mut metadata = SpriteSheetMetadata::grid(fw, fh, frames.len() as u32, MAX_SHEET_COLUMNS)?;
    let mut sheet = RgbaImage::new(metadata.width, metadata.height);

    for (frame, cell) in frames.iter().zip(&metadata.frames) {
        let pixels = frame.decode()?;
        if pixels.dimensions() != (fw, fh) {
            return Err(KilnError::InvalidSheet(format!(
                "frame {} is {}x{} but the sheet uses {}x{} cells",
                cell.index,
                pixels.width(),
                pixels.height(),
                fw,
                fh
            )));
        }
        image::imageops::replace(&mut sheet, &pixels, cell.bounds.x as i64, cell.bounds.y as i64);
    }

    if let Some(clip) = clip {
        if clip.frame_rate > 0.0 {
            let duration = (1000.0 / clip.frame_rate).round() as u32;
            for frame in &mut metadata.frames {
                frame.duration_ms = Some(duration);
            }
        }
        metadata = metadata.with_clip(&clip.name, clip.frame_rate, clip.looping);
    }
    metadata.validate()?;

    let mut cursor = Cursor::new(Vec::new());
    sheet
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| KilnError::Image(format!("failed to encode sheet: {}", e)))?;

    Ok(PackedSheet {
        data: cursor.into_inner(),
        metadata,
    })
}

fn pascal_case(id: &str) -> String {
    slug(id)
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) if c.is_ascii_digit() => format!("_{}", part),
                Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render loader code for `engine`
pub fn render_bindings(
    engine: TargetEngine,
    sprite: &GeneratedSprite,
    sheet: Option<&SpriteSheetMetadata>,
) -> Result<String> {
    let code = match engine {
        TargetEngine::Phaser => phaser_bindings(sprite, sheet),
        TargetEngine::Godot => godot_bindings(sprite, sheet),
        TargetEngine::Unity => unity_bindings(sprite, sheet),
        TargetEngine::Generic => generic_bindings(sprite, sheet)?,
    };
    Ok(code)
}

fn phaser_bindings(sprite: &GeneratedSprite, sheet: Option<&SpriteSheetMetadata>) -> String {
    let key = sprite.id.as_str();
    let name = pascal_case(key);
    let mut lines = vec![
        "// Generated by kiln".to_string(),
        format!("export function preload{}(scene) {{", name),
    ];
    match sheet {
        Some(sheet) => {
            lines.push(format!(
                "  scene.load.spritesheet('{}', '{}', {{ frameWidth: {}, frameHeight: {} }});",
                key,
                sheet_file_name(&sprite.id),
                sheet.frame_width,
                sheet.frame_height
            ));
            lines.push("}".to_string());
            lines.push(String::new());
            lines.push(format!("export function create{}Animations(scene) {{", name));
            for clip in &sheet.animations {
                let first = clip.frames.first().copied().unwrap_or(0);
                let last = clip.frames.last().copied().unwrap_or(0);
                lines.push(format!(
                    "  scene.anims.create({{ key: '{}_{}', frames: scene.anims.generateFrameNumbers('{}', {{ start: {}, end: {} }}), frameRate: {}, repeat: {} }});",
                    key,
                    clip.name,
                    key,
                    first,
                    last,
                    clip.frame_rate,
                    if clip.looping { -1 } else { 0 }
                ));
            }
        }
        None => {
            lines.push(format!("  scene.load.image('{}', '{}');", key, sprite.file_name()));
        }
    }
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}

fn godot_bindings(sprite: &GeneratedSprite, sheet: Option<&SpriteSheetMetadata>) -> String {
    let mut lines = vec!["# Generated by kiln".to_string()];
    match sheet {
        Some(sheet) => {
            lines.push("extends AnimatedSprite2D".to_string());
            lines.push(String::new());
            lines.push(format!(
                "const SHEET := preload(\"res://{}\")",
                sheet_file_name(&sprite.id)
            ));
            lines.push(format!(
                "const FRAME_SIZE := Vector2({}, {})",
                sheet.frame_width, sheet.frame_height
            ));
            lines.push(format!("const COLUMNS := {}", sheet.columns()));
            lines.push(String::new());
            lines.push("func _ready() -> void:".to_string());
            lines.push("\tvar frames := SpriteFrames.new()".to_string());
            for clip in &sheet.animations {
                lines.push(format!("\tframes.add_animation(\"{}\")", clip.name));
                lines.push(format!(
                    "\tframes.set_animation_speed(\"{}\", {:.1})",
                    clip.name, clip.frame_rate
                ));
                lines.push(format!(
                    "\tframes.set_animation_loop(\"{}\", {})",
                    clip.name, clip.looping
                ));
                let indices: Vec<String> = clip.frames.iter().map(|i| i.to_string()).collect();
                lines.push(format!("\tfor i in [{}]:", indices.join(", ")));
                lines.push("\t\tvar atlas := AtlasTexture.new()".to_string());
                lines.push("\t\tatlas.atlas = SHEET".to_string());
                lines.push(
                    "\t\tatlas.region = Rect2(Vector2(i % COLUMNS, i / COLUMNS) * FRAME_SIZE, FRAME_SIZE)"
                        .to_string(),
                );
                lines.push(format!("\t\tframes.add_frame(\"{}\", atlas)", clip.name));
            }
            lines.push("\tsprite_frames = frames".to_string());
            if let Some(clip) = sheet.animations.first() {
                lines.push(format!("\tplay(\"{}\")", clip.name));
            }
        }
        None => {
            lines.push("extends Sprite2D".to_string());
            lines.push(String::new());
            lines.push("func _ready() -> void:".to_string());
            lines.push(format!("\ttexture = preload(\"res://{}\")", sprite.file_name()));
        }
    }
    lines.join("\n") + "\n"
}

fn unity_bindings(sprite: &GeneratedSprite, sheet: Option<&SpriteSheetMetadata>) -> String {
    let class = format!("{}Sprite", pascal_case(sprite.id.as_str()));
    let mut lines = vec![
        "// Generated by kiln".to_string(),
        "using UnityEngine;".to_string(),
        String::new(),
        format!("public static class {}", class),
        "{".to_string(),
    ];
    match sheet {
        Some(sheet) => {
            lines.push(format!(
                "    public const string Texture = \"{}\";",
                sheet_file_name(&sprite.id)
            ));
            lines.push(format!("    public const int FrameWidth = {};", sheet.frame_width));
            lines.push(format!("    public const int FrameHeight = {};", sheet.frame_height));
            if let Some(clip) = sheet.animations.first() {
                lines.push(format!("    public const string Clip = \"{}\";", clip.name));
                lines.push(format!("    public const float FrameRate = {:.1}f;", clip.frame_rate));
                lines.push(format!("    public const bool Loop = {};", clip.looping));
            }
            // Unity rects start at the bottom-left corner
            lines.push("    public static readonly Rect[] Frames =".to_string());
            lines.push("    {".to_string());
            for frame in &sheet.frames {
                let b = &frame.bounds;
                lines.push(format!(
                    "        new Rect({}, {}, {}, {}),",
                    b.x,
                    sheet.height - b.y - b.h,
                    b.w,
                    b.h
                ));
            }
            lines.push("    };".to_string());
        }
        None => {
            lines.push(format!("    public const string Texture = \"{}\";", sprite.file_name()));
            lines.push(format!("    public const int Width = {};", sprite.width));
            lines.push(format!("    public const int Height = {};", sprite.height));
        }
    }
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}

fn generic_bindings(sprite: &GeneratedSprite, sheet: Option<&SpriteSheetMetadata>) -> Result<String> {
    let doc = serde_json::json!({
        "id": sprite.id,
        "file": sprite.file_name(),
        "width": sprite.width,
        "height": sprite.height,
        "format": sprite.format,
        "content_hash": sprite.content_hash,
        "sheet_file": sheet.map(|_| sheet_file_name(&sprite.id)),
        "sheet": sheet,
    });
    serde_json::to_string_pretty(&doc)
        .map_err(|e| KilnError::Configuration(format!("failed to render bindings: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::SpriteMetadata;

    fn frame(id: &str, w: u32, h: u32, shade: u8) -> GeneratedSprite {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([shade, shade, shade, 255]));
        GeneratedSprite::from_rgba(
            SpriteId::from_raw(id),
            &img,
            SpriteMetadata::new("character", "pixel-art", "side-view"),
        )
        .unwrap()
    }

    fn walk_clip() -> ClipSpec {
        ClipSpec {
            name: "walk".to_string(),
            frame_rate: 10.0,
            looping: true,
        }
    }

    #[test]
    fn test_pack_sheet_layout() {
        let frames: Vec<GeneratedSprite> = (0..10).map(|i| frame("hero", 16, 16, i * 20)).collect();
        let packed = pack_sheet(&frames, Some(&walk_clip())).unwrap();
        assert_eq!(packed.metadata.columns(), MAX_SHEET_COLUMNS);
        assert_eq!((packed.metadata.width, packed.metadata.height), (128, 32));
        assert_eq!(packed.metadata.frames[9].duration_ms, Some(100));
        assert_eq!(packed.metadata.animations[0].frames.len(), 10);

        let sheet = image::load_from_memory(&packed.data).unwrap().to_rgba8();
        assert_eq!(sheet.get_pixel(16, 0).0, [20, 20, 20, 255]);
        assert_eq!(sheet.get_pixel(16, 16).0, [180, 180, 180, 255]);
    }

    #[test]
    fn test_pack_sheet_rejects_mixed_sizes() {
        let frames = vec![frame("a", 16, 16, 0), frame("b", 8, 8, 0)];
        assert!(matches!(
            pack_sheet(&frames, None),
            Err(KilnError::InvalidSheet(_))
        ));
        assert!(pack_sheet(&[], None).is_err());
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!("Phaser".parse::<TargetEngine>().unwrap(), TargetEngine::Phaser);
        assert!("unreal".parse::<TargetEngine>().is_err());
    }

    #[test]
    fn test_phaser_bindings() {
        let frames: Vec<GeneratedSprite> = (0..4).map(|_| frame("fire_dragon", 8, 8, 1)).collect();
        let packed = pack_sheet(&frames, Some(&walk_clip())).unwrap();
        let code = render_bindings(TargetEngine::Phaser, &frames[0], Some(&packed.metadata)).unwrap();
        assert!(code.contains("export function preloadFireDragon(scene)"));
        assert!(code.contains("fire_dragon_sheet.png"));
        assert!(code.contains("end: 3"));
        assert!(code.contains("repeat: -1"));
    }

    #[test]
    fn test_godot_and_unity_bindings() {
        let frames: Vec<GeneratedSprite> = (0..2).map(|_| frame("slime", 8, 8, 1)).collect();
        let packed = pack_sheet(&frames, Some(&walk_clip())).unwrap();
        let gd = render_bindings(TargetEngine::Godot, &frames[0], Some(&packed.metadata)).unwrap();
        assert!(gd.contains("extends AnimatedSprite2D"));
        assert!(gd.contains("play(\"walk\")"));

        let cs = render_bindings(TargetEngine::Unity, &frames[0], Some(&packed.metadata)).unwrap();
        assert!(cs.contains("public static class SlimeSprite"));
        assert!(cs.contains("new Rect(8, 0, 8, 8),"));
    }

    #[test]
    fn test_generic_bindings_single_sprite() {
        let sprite = frame("coin", 8, 8, 1);
        let json = render_bindings(TargetEngine::Generic, &sprite, None).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["file"], "coin.png");
        assert!(doc["sheet"].is_null());
    }
}
