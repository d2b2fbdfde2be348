//! Kiln Motion - motion transfer between sprite sheets
//!
//! `MotionExtractor` slices a reference sheet into per-frame pose
//! descriptors; `MotionRetargeter` regenerates each pose for a new
//! subject and style through the same generator stack as the asset
//! pipeline.

pub mod extract;
pub mod retarget;

pub use extract::MotionExtractor;
pub use retarget::{retarget_seed, MotionRetargeter, MotionTransfer, RetargetOptions, RetargetedFrame};
