//! Post-processing operations
//!
//! Each operation turns a sprite into a new sprite with the same id.
//! Operations are looked up by name and applied in the order listed in
//! `GenerationParams::post_processing`. Every operation is idempotent:
//! applying it to its own output changes nothing.

use crate::params::GenerationParams;
use image::RgbaImage;
use kiln_core::{GeneratedSprite, PaletteSummary, Result, Rgba};
use std::collections::{HashMap, VecDeque};

/// Number of colors reported as dominant
const DOMINANT_COLORS: usize = 5;

/// A named sprite transformation
pub trait PostOperation: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, sprite: &GeneratedSprite, params: &GenerationParams) -> Result<GeneratedSprite>;
}

/// Output of a post-processing run
#[derive(Debug, Clone)]
pub struct PostProcessOutcome {
    pub sprite: GeneratedSprite,
    pub applied: Vec<String>,
    pub warnings: Vec<String>,
}

/// Registry of post-processing operations
pub struct PostProcessor {
    operations: Vec<Box<dyn PostOperation>>,
}

impl PostProcessor {
    /// Registry holding every built-in operation
    pub fn new() -> Self {
        Self {
            operations: vec![
                Box::new(BackgroundRemoval::default()),
                Box::new(Normalization),
                Box::new(PaletteExtraction),
                Box::new(PaletteQuantize),
            ],
        }
    }

    /// Add an operation; replaces a built-in with the same name
    pub fn register(&mut self, op: Box<dyn PostOperation>) {
        self.operations.retain(|existing| existing.name() != op.name());
        self.operations.push(op);
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn PostOperation> {
        self.operations
            .iter()
            .find(|op| op.name() == name)
            .map(|op| op.as_ref())
    }

    /// Apply `params.post_processing` in order.
    ///
    /// Unknown names are skipped with a warning. An operation that fails
    /// aborts the run since the sprite can no longer be trusted.
    #[tracing::instrument(skip_all, fields(sprite = %sprite.id))]
    pub fn apply_all(&self, sprite: &GeneratedSprite, params: &GenerationParams) -> Result<PostProcessOutcome> {
        let mut current = sprite.clone();
        let mut applied = Vec::new();
        let mut warnings = Vec::new();

        for name in &params.post_processing {
            match self.get(name) {
                Some(op) => {
                    current = op.apply(&current, params)?;
                    tracing::debug!(op = name.as_str(), "applied post-processing");
                    applied.push(name.clone());
                }
                None => {
                    let message = format!("unknown post-processing operation '{}' skipped", name);
                    tracing::warn!("{}", message);
                    warnings.push(message);
                }
            }
        }

        Ok(PostProcessOutcome {
            sprite: current,
            applied,
            warnings,
        })
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the edge-connected background region
#[derive(Debug, Clone)]
pub struct BackgroundRemoval {
    /// Maximum RGB distance from the background color
    pub tolerance: u32,
}

impl Default for BackgroundRemoval {
    fn default() -> Self {
        Self { tolerance: 24 }
    }
}

impl BackgroundRemoval {
    /// Most common corner color; ties favor transparency
    fn background_color(img: &RgbaImage) -> Rgba {
        let (w, h) = img.dimensions();
        let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
        let mut counts: Vec<(Rgba, usize)> = Vec::new();
        for (x, y) in corners {
            let mut color = Rgba::from_array(img.get_pixel(x, y).0);
            if color.a == 0 {
                color = Rgba::TRANSPARENT;
            }
            match counts.iter_mut().find(|(c, _)| *c == color) {
                Some((_, n)) => *n += 1,
                None => counts.push((color, 1)),
            }
        }
        let best = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        counts
            .iter()
            .filter(|(_, n)| *n == best)
            .map(|(c, _)| *c)
            .find(|c| c.a == 0)
            .unwrap_or(counts[0].0)
    }
}

impl PostOperation for BackgroundRemoval {
    fn name(&self) -> &str {
        "background-removal"
    }

    fn apply(&self, sprite: &GeneratedSprite, _params: &GenerationParams) -> Result<GeneratedSprite> {
        let mut img = sprite.decode()?;
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Ok(sprite.clone());
        }

        let background = Self::background_color(&img);
        if background.a == 0 {
            return Ok(sprite.clone());
        }

        let limit = self.tolerance * self.tolerance;
        let matches = |px: &image::Rgba<u8>| {
            px.0[3] > 0 && Rgba::from_array(px.0).distance_sq(background) <= limit
        };

        let mut visited = vec![false; w as usize * h as usize];
        let mut queue = VecDeque::new();
        for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
            if matches(img.get_pixel(x, y)) && !visited[(y * w + x) as usize] {
                visited[(y * w + x) as usize] = true;
                queue.push_back((x, y));
            }
        }

        let mut cleared = 0usize;
        while let Some((x, y)) = queue.pop_front() {
            img.put_pixel(x, y, image::Rgba(Rgba::TRANSPARENT.to_array()));
            cleared += 1;
            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx >= w || ny >= h {
                    continue;
                }
                let idx = (ny * w + nx) as usize;
                if !visited[idx] && matches(img.get_pixel(nx, ny)) {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        tracing::debug!(cleared, background = %background, "background removed");
        if cleared == 0 {
            return Ok(sprite.clone());
        }
        sprite.with_pixels(&img)
    }
}

/// Binarizes alpha and zeroes the color of transparent pixels
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalization;

impl PostOperation for Normalization {
    fn name(&self) -> &str {
        "normalization"
    }

    fn apply(&self, sprite: &GeneratedSprite, _params: &GenerationParams) -> Result<GeneratedSprite> {
        let mut img = sprite.decode()?;
        let mut changed = false;
        for px in img.pixels_mut() {
            let normalized = if px.0[3] >= 128 {
                [px.0[0], px.0[1], px.0[2], 255]
            } else {
                [0, 0, 0, 0]
            };
            if px.0 != normalized {
                px.0 = normalized;
                changed = true;
            }
        }
        if !changed {
            return Ok(sprite.clone());
        }
        sprite.with_pixels(&img)
    }
}

/// Fills `metadata.palette` from the visible pixels
#[derive(Debug, Clone, Copy, Default)]
pub struct PaletteExtraction;

impl PaletteExtraction {
    /// Distinct visible colors, most frequent first
    pub fn ranked_colors(img: &RgbaImage) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for px in img.pixels() {
            if px.0[3] > 0 {
                *counts.entry(Rgba::from_array(px.0).to_hex()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().map(|(hex, _)| hex).collect()
    }
}

impl PostOperation for PaletteExtraction {
    fn name(&self) -> &str {
        "palette-extraction"
    }

    fn apply(&self, sprite: &GeneratedSprite, _params: &GenerationParams) -> Result<GeneratedSprite> {
        let img = sprite.decode()?;
        let summary = PaletteSummary::from_ranked(Self::ranked_colors(&img), DOMINANT_COLORS);
        let mut out = sprite.clone();
        out.metadata.palette = Some(summary);
        Ok(out)
    }
}

/// Snaps visible pixels to the nearest color of `params.palette`
#[derive(Debug, Clone, Copy, Default)]
pub struct PaletteQuantize;

impl PostOperation for PaletteQuantize {
    fn name(&self) -> &str {
        "palette-quantize"
    }

    fn apply(&self, sprite: &GeneratedSprite, params: &GenerationParams) -> Result<GeneratedSprite> {
        let palette: Vec<Rgba> = params
            .palette
            .iter()
            .flatten()
            .filter_map(|hex| Rgba::from_hex(hex))
            .collect();
        if palette.is_empty() {
            return Ok(sprite.clone());
        }

        let mut img = sprite.decode()?;
        let mut changed = false;
        for px in img.pixels_mut() {
            if px.0[3] == 0 {
                continue;
            }
            let color = Rgba::from_array(px.0);
            let nearest = palette
                .iter()
                .copied()
                .min_by_key(|p| p.distance_sq(color))
                .unwrap_or(color);
            let snapped = [nearest.r, nearest.g, nearest.b, px.0[3]];
            if px.0 != snapped {
                px.0 = snapped;
                changed = true;
            }
        }
        if !changed {
            return Ok(sprite.clone());
        }
        sprite.with_pixels(&img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EntityType, Perspective, VisualStyle};
    use kiln_core::{SpriteId, SpriteMetadata};

    fn params() -> GenerationParams {
        GenerationParams::new(EntityType::Item, VisualStyle::PixelArt, Perspective::Front)
    }

    /// 8x8 white background with a 4x4 red square in the middle
    fn boxed_sprite() -> GeneratedSprite {
        let img = RgbaImage::from_fn(8, 8, |x, y| {
            if (2..6).contains(&x) && (2..6).contains(&y) {
                image::Rgba([200, 20, 20, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        GeneratedSprite::from_rgba(
            SpriteId::from_raw("box"),
            &img,
            SpriteMetadata::new("item", "pixel-art", "front"),
        )
        .unwrap()
    }

    #[test]
    fn test_background_removal() {
        let out = BackgroundRemoval::default().apply(&boxed_sprite(), &params()).unwrap();
        let img = out.decode().unwrap();
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(7, 7).0[3], 0);
        assert_eq!(img.get_pixel(3, 3).0, [200, 20, 20, 255]);
        assert_eq!(out.id, SpriteId::from_raw("box"));
    }

    #[test]
    fn test_background_removal_idempotent() {
        let op = BackgroundRemoval::default();
        let once = op.apply(&boxed_sprite(), &params()).unwrap();
        let twice = op.apply(&once, &params()).unwrap();
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn test_background_removal_keeps_enclosed_pixels() {
        // White pixel inside the red square is not edge-connected
        let img = RgbaImage::from_fn(8, 8, |x, y| {
            if (x, y) == (3, 3) {
                image::Rgba([255, 255, 255, 255])
            } else if (2..6).contains(&x) && (2..6).contains(&y) {
                image::Rgba([200, 20, 20, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let sprite = boxed_sprite().with_pixels(&img).unwrap();
        let out = BackgroundRemoval::default().apply(&sprite, &params()).unwrap();
        assert_eq!(out.decode().unwrap().get_pixel(3, 3).0[3], 255);
    }

    #[test]
    fn test_normalization_idempotent() {
        let img = RgbaImage::from_fn(4, 1, |x, _| match x {
            0 => image::Rgba([10, 20, 30, 0]),
            1 => image::Rgba([10, 20, 30, 100]),
            2 => image::Rgba([10, 20, 30, 200]),
            _ => image::Rgba([10, 20, 30, 255]),
        });
        let sprite = boxed_sprite().with_pixels(&img).unwrap();
        let once = Normalization.apply(&sprite, &params()).unwrap();
        let pixels = once.decode().unwrap();
        assert_eq!(pixels.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(pixels.get_pixel(1, 0).0, [0, 0, 0, 0]);
        assert_eq!(pixels.get_pixel(2, 0).0, [10, 20, 30, 255]);

        let twice = Normalization.apply(&once, &params()).unwrap();
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn test_palette_extraction() {
        let out = PaletteExtraction.apply(&boxed_sprite(), &params()).unwrap();
        let palette = out.metadata.palette.as_ref().unwrap();
        assert!(palette.is_consistent());
        assert_eq!(palette.count, 2);
        assert_eq!(palette.all[0], "#ffffff");
        assert_eq!(palette.style, "limited");
        assert_eq!(out.data, boxed_sprite().data);
    }

    #[test]
    fn test_palette_quantize() {
        let mut p = params();
        p.palette = Some(vec!["#ff0000".to_string(), "#000000".to_string()]);
        let out = PaletteQuantize.apply(&boxed_sprite(), &p).unwrap();
        let img = out.decode().unwrap();
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);

        let again = PaletteQuantize.apply(&out, &p).unwrap();
        assert_eq!(out.data, again.data);
    }

    #[test]
    fn test_palette_quantize_without_palette_is_noop() {
        let sprite = boxed_sprite();
        let out = PaletteQuantize.apply(&sprite, &params()).unwrap();
        assert_eq!(out.data, sprite.data);
    }

    #[test]
    fn test_apply_all_skips_unknown() {
        let mut p = params();
        p.post_processing = vec![
            "background-removal".to_string(),
            "sharpen".to_string(),
            "normalization".to_string(),
        ];
        let outcome = PostProcessor::new().apply_all(&boxed_sprite(), &p).unwrap();
        assert_eq!(outcome.applied, vec!["background-removal", "normalization"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("sharpen"));
    }

    #[test]
    fn test_register_replaces_builtin() {
        let mut processor = PostProcessor::new();
        processor.register(Box::new(BackgroundRemoval { tolerance: 0 }));
        assert_eq!(processor.names().len(), 4);
        assert!(processor.get("background-removal").is_some());
    }
}
