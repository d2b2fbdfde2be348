//! CLI command implementations

pub mod generate;
pub mod interpret;
pub mod motion;
pub mod plan;
pub mod validate;

use anyhow::{Context, Result};
use kiln_core::GeneratedSprite;
use kiln_gen::KilnConfig;
use std::path::{Path, PathBuf};

/// Layered config, or defaults when none can be read
pub fn load_config() -> KilnConfig {
    KilnConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config; using defaults");
        KilnConfig::default()
    })
}

/// Write `<id>.<ext>` and its `<id>.sprite.toml` sidecar into `dir`
pub fn write_sprite(dir: &Path, sprite: &GeneratedSprite) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let image_path = dir.join(sprite.file_name());
    std::fs::write(&image_path, &sprite.data)
        .with_context(|| format!("Failed to write {}", image_path.display()))?;

    let mut metadata = sprite.metadata.clone();
    metadata.path = Some(sprite.file_name());
    let sidecar = dir.join(format!("{}.sprite.toml", sprite.id));
    std::fs::write(&sidecar, metadata.to_toml()?)
        .with_context(|| format!("Failed to write {}", sidecar.display()))?;

    Ok(image_path)
}

/// Write raw bytes or text next to the sprites
pub fn write_artifact(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{SpriteId, SpriteMetadata};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("kiln_cli_test_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_write_sprite_with_sidecar() {
        let dir = temp_dir();
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 8, 7, 255]));
        let sprite = GeneratedSprite::from_rgba(
            SpriteId::from_raw("slime_idle"),
            &img,
            SpriteMetadata::new("creature", "pixel-art", "side-view"),
        )
        .unwrap();

        let path = write_sprite(&dir, &sprite).unwrap();
        assert_eq!(path, dir.join("slime_idle.png"));
        assert_eq!(std::fs::read(&path).unwrap(), sprite.data);

        let sidecar = std::fs::read_to_string(dir.join("slime_idle.sprite.toml")).unwrap();
        let meta = SpriteMetadata::from_toml(&sidecar).unwrap();
        assert_eq!(meta.path.as_deref(), Some("slime_idle.png"));
        assert_eq!(meta.entity, "creature");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_artifact() {
        let dir = temp_dir();
        let path = write_artifact(&dir, "slime_idle.json", b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
