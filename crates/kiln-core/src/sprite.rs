//! Generated sprite artifacts and their metadata

use crate::error::{KilnError, Result};
use crate::hash::ContentHash;
use crate::id::SpriteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// Encoded payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteFormat {
    Png,
    Webp,
}

impl SpriteFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SpriteFormat::Png => "png",
            SpriteFormat::Webp => "webp",
        }
    }

    fn image_format(&self) -> image::ImageFormat {
        match self {
            SpriteFormat::Png => image::ImageFormat::Png,
            SpriteFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for SpriteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Summary of the colors used by a sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteSummary {
    /// Most frequent colors, most frequent first
    pub dominant: Vec<String>,
    /// Every distinct opaque color, most frequent first
    pub all: Vec<String>,
    pub count: usize,
    /// `limited`, `extended` or `full`
    pub style: String,
}

impl PaletteSummary {
    /// Build a summary from colors sorted by frequency
    pub fn from_ranked(all: Vec<String>, dominant_len: usize) -> Self {
        let count = all.len();
        let style = match count {
            0..=16 => "limited",
            17..=64 => "extended",
            _ => "full",
        };
        Self {
            dominant: all.iter().take(dominant_len).cloned().collect(),
            all,
            count,
            style: style.to_string(),
        }
    }

    /// `count == all.len()` and every dominant color appears in `all`
    pub fn is_consistent(&self) -> bool {
        self.count == self.all.len() && self.dominant.iter().all(|d| self.all.contains(d))
    }
}

/// Descriptive metadata carried with every sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteMetadata {
    pub entity: String,
    pub style: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub frame_count: Option<u32>,
    pub perspective: String,
    #[serde(default)]
    pub palette: Option<PaletteSummary>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub path: Option<String>,
    /// Generation provenance
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl SpriteMetadata {
    pub fn new(entity: &str, style: &str, perspective: &str) -> Self {
        Self {
            entity: entity.to_string(),
            style: style.to_string(),
            subject: None,
            theme: None,
            action: None,
            frame_count: None,
            perspective: perspective.to_string(),
            palette: None,
            tags: Vec::new(),
            created_at: Utc::now(),
            path: None,
            provider: None,
            model: None,
            seed: None,
            prompt: None,
        }
    }

    /// Serialize as a TOML sidecar document
    pub fn to_toml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Sidecar<'a> {
            sprite: &'a SpriteMetadata,
        }
        Ok(toml::to_string_pretty(&Sidecar { sprite: self })?)
    }

    /// Parse a TOML sidecar document
    pub fn from_toml(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Sidecar {
            sprite: SpriteMetadata,
        }
        let file: Sidecar = toml::from_str(content)?;
        Ok(file.sprite)
    }
}

/// An encoded sprite image plus metadata.
///
/// Sprites are values: post-processing produces a new sprite with the
/// same id, variant derivation produces one with a derived id.
#[derive(Clone, PartialEq)]
pub struct GeneratedSprite {
    pub id: SpriteId,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: SpriteFormat,
    pub metadata: SpriteMetadata,
    /// `sha256:` prefixed hash of `data`
    pub content_hash: String,
}

impl GeneratedSprite {
    /// Wrap an already-encoded payload
    pub fn new(
        id: SpriteId,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: SpriteFormat,
        metadata: SpriteMetadata,
    ) -> Self {
        let content_hash = ContentHash::from_bytes(&data).to_prefixed_hex();
        Self {
            id,
            data,
            width,
            height,
            format,
            metadata,
            content_hash,
        }
    }

    /// Encode an RGBA buffer as a PNG sprite
    pub fn from_rgba(id: SpriteId, image: &image::RgbaImage, metadata: SpriteMetadata) -> Result<Self> {
        let data = encode_rgba(image, SpriteFormat::Png)?;
        Ok(Self::new(
            id,
            data,
            image.width(),
            image.height(),
            SpriteFormat::Png,
            metadata,
        ))
    }

    /// Decode the payload into an RGBA buffer
    pub fn decode(&self) -> Result<image::RgbaImage> {
        let img = image::load_from_memory(&self.data)
            .map_err(|e| KilnError::Decode(format!("sprite {}: {}", self.id, e)))?;
        Ok(img.to_rgba8())
    }

    /// A copy of this sprite with new pixels and the same id
    pub fn with_pixels(&self, image: &image::RgbaImage) -> Result<Self> {
        let data = encode_rgba(image, self.format)?;
        Ok(Self::new(
            self.id.clone(),
            data,
            image.width(),
            image.height(),
            self.format,
            self.metadata.clone(),
        ))
    }

    /// A new sprite derived from this one, with id `{id}_{suffix}`
    pub fn derive(&self, suffix: &str, image: &image::RgbaImage) -> Result<Self> {
        let mut derived = self.with_pixels(image)?;
        derived.id = self.id.derive(suffix);
        derived.metadata.created_at = Utc::now();
        derived.metadata.path = None;
        Ok(derived)
    }

    /// Deterministic file name (`id.extension`)
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }
}

impl fmt::Debug for GeneratedSprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedSprite")
            .field("id", &self.id)
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("content_hash", &self.content_hash)
            .finish()
    }
}

/// Encode an RGBA buffer into the given format
pub(crate) fn encode_rgba(image: &image::RgbaImage, format: SpriteFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, format.image_format())
        .map_err(|e| KilnError::Image(format!("failed to encode {}: {}", format, e)))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> image::RgbaImage {
        image::RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        })
    }

    fn meta() -> SpriteMetadata {
        SpriteMetadata::new("creature", "pixel-art", "side-view")
    }

    #[test]
    fn test_from_rgba_roundtrip_dimensions() {
        let sprite = GeneratedSprite::from_rgba(SpriteId::from_raw("s"), &checker(12, 7), meta()).unwrap();
        assert_eq!(sprite.format, SpriteFormat::Png);
        let decoded = sprite.decode().unwrap();
        assert_eq!(decoded.dimensions(), (12, 7));
        assert_eq!((sprite.width, sprite.height), (12, 7));
        assert!(sprite.content_hash.starts_with("sha256:"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let sprite = GeneratedSprite::new(
            SpriteId::from_raw("bad"),
            vec![1, 2, 3, 4],
            4,
            4,
            SpriteFormat::Png,
            meta(),
        );
        assert!(sprite.decode().is_err());
    }

    #[test]
    fn test_derive_changes_id_only() {
        let base = GeneratedSprite::from_rgba(SpriteId::from_raw("hero"), &checker(4, 4), meta()).unwrap();
        let derived = base.derive("crimson", &checker(4, 4)).unwrap();
        assert_eq!(derived.id.as_str(), "hero_crimson");
        assert_eq!(derived.data, base.data);
        assert_eq!(derived.file_name(), "hero_crimson.png");
    }

    #[test]
    fn test_palette_summary_invariants() {
        let all = vec!["#ff0000".to_string(), "#00ff00".to_string(), "#0000ff".to_string()];
        let palette = PaletteSummary::from_ranked(all, 2);
        assert_eq!(palette.count, 3);
        assert_eq!(palette.style, "limited");
        assert!(palette.is_consistent());
    }

    #[test]
    fn test_metadata_sidecar_roundtrip() {
        let mut m = meta();
        m.theme = Some("fire".to_string());
        m.seed = Some(42);
        let toml_str = m.to_toml().unwrap();
        assert!(toml_str.contains("[sprite]"));
        let parsed = SpriteMetadata::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.theme.as_deref(), Some("fire"));
        assert_eq!(parsed.seed, Some(42));
    }
}
