//! Pose descriptors extracted from reference animation frames

use crate::types::NormRect;
use serde::{Deserialize, Serialize};

/// A point normalized to its frame cell, (0, 0) top-left
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Silhouette signature of a single frame.
///
/// Keypoints are extremities of the foreground mask and stand in for
/// limb positions: the topmost point is the head, the outermost points
/// in the upper body are the hands, the lowest points either side of the
/// centroid are the feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDescriptor {
    pub frame_index: u32,
    /// Fraction of the cell covered by foreground
    pub coverage: f32,
    pub bounds: NormRect,
    pub centroid: Keypoint,
    /// Principal axis tilt from vertical, radians, positive leans right
    pub lean: f32,
    pub head: Keypoint,
    pub left_hand: Keypoint,
    pub right_hand: Keypoint,
    pub left_foot: Keypoint,
    pub right_foot: Keypoint,
    /// 8x8 occupancy grid, bit `row * 8 + col`
    pub signature: u64,
    /// No foreground pixels were found in the cell
    pub empty: bool,
}

impl PoseDescriptor {
    /// An empty pose for a blank cell
    pub fn blank(frame_index: u32) -> Self {
        let center = Keypoint::new(0.5, 0.5);
        Self {
            frame_index,
            coverage: 0.0,
            bounds: NormRect::default(),
            centroid: center,
            lean: 0.0,
            head: center,
            left_hand: center,
            right_hand: center,
            left_foot: center,
            right_foot: center,
            signature: 0,
            empty: true,
        }
    }

    /// Silhouette similarity in [0, 1] from the occupancy signatures
    pub fn similarity(&self, other: &PoseDescriptor) -> f32 {
        1.0 - (self.signature ^ other.signature).count_ones() as f32 / 64.0
    }

    /// Short prompt phrase describing the posture
    pub fn describe(&self) -> String {
        if self.empty {
            return "neutral pose".to_string();
        }

        let mut parts = Vec::new();
        if self.lean > 0.15 {
            parts.push("leaning right");
        } else if self.lean < -0.15 {
            parts.push("leaning left");
        } else {
            parts.push("upright");
        }

        let hands_high = self.left_hand.y < self.centroid.y - 0.1
            && self.right_hand.y < self.centroid.y - 0.1;
        let hand_spread = self.right_hand.x - self.left_hand.x;
        if hands_high {
            parts.push("arms raised");
        } else if hand_spread > 0.6 {
            parts.push("arms extended");
        }

        if self.right_foot.x - self.left_foot.x > 0.4 {
            parts.push("wide stance");
        }
        if self.bounds.h < 0.55 {
            parts.push("crouched low");
        }
        if self.bounds.y + self.bounds.h < 0.8 {
            parts.push("airborne");
        }

        parts.join(", ")
    }
}

/// An ordered list of poses sliced from one reference sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSequence {
    pub frame_width: u32,
    pub frame_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub poses: Vec<PoseDescriptor>,
    /// Non-fatal slicing issues
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PoseSequence {
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}
