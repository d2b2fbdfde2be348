//! Kiln Core - Shared data model for the Kiln sprite pipeline
//!
//! This crate provides the types every other Kiln crate depends on:
//! - `SpriteId` - Unique, derivable artifact identifiers
//! - `ContentHash` - SHA-256 based content hashing and seed derivation
//! - `GeneratedSprite`, `SpriteMetadata` - Generated artifacts
//! - `SpriteSheetMetadata`, `AnimationFrame` - Sheet layout
//! - `PoseDescriptor`, `PoseSequence` - Extracted motion
//! - Error types and Result alias

mod error;
mod hash;
mod id;
mod pose;
mod sheet;
mod sprite;
mod types;

pub use error::{KilnError, Result};
pub use hash::ContentHash;
pub use id::{slug, SpriteId};
pub use pose::{Keypoint, PoseDescriptor, PoseSequence};
pub use sheet::{AnimationClip, AnimationFrame, SpriteSheetMetadata};
pub use sprite::{GeneratedSprite, PaletteSummary, SpriteFormat, SpriteMetadata};
pub use types::{NormRect, Rect, Resolution, Rgba};
