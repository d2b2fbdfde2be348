//! Sprite validation command

use super::load_config;
use anyhow::{Context, Result};
use kiln_core::{GeneratedSprite, SpriteFormat, SpriteId, SpriteMetadata};
use kiln_gen::QualityValidator;
use std::path::Path;

pub fn run(path: &str, format: &str) -> Result<()> {
    let file = Path::new(path);
    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", path))?;
    let (width, height) = image::load_from_memory(&data)
        .map(|img| (img.width(), img.height()))
        .with_context(|| format!("{} is not a readable image", path))?;

    let sprite_format = match file.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("webp") => SpriteFormat::Webp,
        _ => SpriteFormat::Png,
    };
    let id = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sprite")
        .to_string();

    let sprite = GeneratedSprite::new(
        SpriteId::from_raw(id),
        data,
        width,
        height,
        sprite_format,
        SpriteMetadata::new("unknown", "unknown", "unknown"),
    );
    let report = QualityValidator::new(load_config().validation).validate(&sprite);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    if !report.valid {
        anyhow::bail!("{} failed validation", path);
    }
    Ok(())
}
