//! Sprite sheet layout metadata

use crate::error::{KilnError, Result};
use crate::types::Rect;
use serde::{Deserialize, Serialize};

/// One frame cell within a sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationFrame {
    /// 0-based, dense within a sheet
    pub index: u32,
    pub bounds: Rect,
    /// Display duration in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u32>,
}

/// A named clip referencing a subset of a sheet's frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub frames: Vec<u32>,
    pub frame_rate: f32,
    #[serde(default)]
    pub looping: bool,
}

/// Layout of a packed sprite sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheetMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frames: Vec<AnimationFrame>,
    #[serde(default)]
    pub animations: Vec<AnimationClip>,
}

impl SpriteSheetMetadata {
    /// Lay out `count` frames row-major in a grid of `columns`
    pub fn grid(frame_width: u32, frame_height: u32, count: u32, columns: u32) -> Result<Self> {
        if frame_width == 0 || frame_height == 0 {
            return Err(KilnError::InvalidSheet(format!(
                "frame size must be positive, got {}x{}",
                frame_width, frame_height
            )));
        }
        if count == 0 {
            return Err(KilnError::InvalidSheet("sheet needs at least one frame".to_string()));
        }
        let columns = columns.clamp(1, count);
        let rows = count.div_ceil(columns);

        let frames = (0..count)
            .map(|i| AnimationFrame {
                index: i,
                bounds: Rect::new(
                    (i % columns) * frame_width,
                    (i / columns) * frame_height,
                    frame_width,
                    frame_height,
                ),
                duration_ms: None,
            })
            .collect();

        Ok(Self {
            width: columns * frame_width,
            height: rows * frame_height,
            frame_width,
            frame_height,
            frames,
            animations: Vec::new(),
        })
    }

    /// Number of columns in the grid
    pub fn columns(&self) -> u32 {
        self.width.checked_div(self.frame_width).unwrap_or(0)
    }

    /// Add a clip covering every frame
    pub fn with_clip(mut self, name: &str, frame_rate: f32, looping: bool) -> Self {
        self.animations.push(AnimationClip {
            name: name.to_string(),
            frames: self.frames.iter().map(|f| f.index).collect(),
            frame_rate,
            looping,
        });
        self
    }

    /// Check frame bounds, index density and clip references
    pub fn validate(&self) -> Result<()> {
        for (position, frame) in self.frames.iter().enumerate() {
            if frame.index as usize != position {
                return Err(KilnError::InvalidSheet(format!(
                    "frame at position {} has index {} (indices must be dense from 0)",
                    position, frame.index
                )));
            }
            if !frame.bounds.fits_within(self.width, self.height) {
                return Err(KilnError::InvalidSheet(format!(
                    "frame {} bounds {:?} exceed sheet {}x{}",
                    frame.index, frame.bounds, self.width, self.height
                )));
            }
        }

        let frame_count = self.frames.len() as u32;
        for clip in &self.animations {
            if let Some(missing) = clip.frames.iter().find(|&&i| i >= frame_count) {
                return Err(KilnError::InvalidSheet(format!(
                    "clip '{}' references missing frame {}",
                    clip.name, missing
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        let sheet = SpriteSheetMetadata::grid(32, 16, 10, 4).unwrap();
        assert_eq!((sheet.width, sheet.height), (128, 48));
        assert_eq!(sheet.columns(), 4);
        assert_eq!(sheet.frames[5].bounds, Rect::new(32, 16, 32, 16));
        assert!(sheet.validate().is_ok());
    }

    #[test]
    fn test_grid_clamps_columns() {
        let sheet = SpriteSheetMetadata::grid(8, 8, 3, 8).unwrap();
        assert_eq!((sheet.width, sheet.height), (24, 8));
    }

    #[test]
    fn test_grid_rejects_empty() {
        assert!(SpriteSheetMetadata::grid(8, 8, 0, 4).is_err());
        assert!(SpriteSheetMetadata::grid(0, 8, 1, 4).is_err());
    }

    #[test]
    fn test_validate_catches_bad_clip() {
        let mut sheet = SpriteSheetMetadata::grid(8, 8, 4, 4).unwrap().with_clip("walk", 10.0, true);
        assert!(sheet.validate().is_ok());
        sheet.animations[0].frames.push(9);
        assert!(sheet.validate().is_err());
    }

    #[test]
    fn test_validate_catches_sparse_indices() {
        let mut sheet = SpriteSheetMetadata::grid(8, 8, 2, 2).unwrap();
        sheet.frames[1].index = 5;
        assert!(sheet.validate().is_err());
    }

    #[test]
    fn test_validate_catches_out_of_bounds() {
        let mut sheet = SpriteSheetMetadata::grid(8, 8, 2, 2).unwrap();
        sheet.frames[1].bounds.x = 12;
        assert!(sheet.validate().is_err());
    }

    #[test]
    fn test_json_sidecar_roundtrip() {
        let sheet = SpriteSheetMetadata::grid(16, 16, 6, 3)
            .unwrap()
            .with_clip("walk", 12.0, true);
        let json = serde_json::to_string_pretty(&sheet).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["frame_width"], 16);
        assert_eq!(doc["frames"][4]["bounds"]["x"], 16);
        assert_eq!(doc["animations"][0]["looping"], true);

        let back: SpriteSheetMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sheet);
    }

    #[test]
    fn test_json_without_clips_uses_defaults() {
        let json = r#"{
            "width": 16, "height": 8, "frame_width": 8, "frame_height": 8,
            "frames": [
                {"index": 0, "bounds": {"x": 0, "y": 0, "w": 8, "h": 8}},
                {"index": 1, "bounds": {"x": 8, "y": 0, "w": 8, "h": 8}, "duration_ms": 120}
            ]
        }"#;
        let sheet: SpriteSheetMetadata = serde_json::from_str(json).unwrap();
        assert!(sheet.animations.is_empty());
        assert_eq!(sheet.frames[0].duration_ms, None);
        assert_eq!(sheet.frames[1].duration_ms, Some(120));
        assert!(sheet.validate().is_ok());
    }
}
