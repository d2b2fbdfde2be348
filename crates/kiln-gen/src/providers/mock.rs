//! Mock provider for testing
//!
//! Draws a deterministic placeholder figure on a solid background without
//! any network calls. Colors and limb placement come from hashing the
//! effective seed, so the same prompt always yields the same pixels. When
//! the prompt carries pose conditioning the figure's head, hands and feet
//! follow the pose keypoints.

use crate::params::GenerationParams;
use crate::prompt::CompiledPrompt;
use crate::provider::{sprite_metadata, ProviderStatus, SpriteGenerator};
use image::{Rgba as Pixel, RgbaImage};
use kiln_core::{
    ContentHash, GeneratedSprite, KilnError, Keypoint, PoseDescriptor, Result, Rgba, SpriteId,
};

/// A provider that draws placeholder sprites locally
#[derive(Debug, Default, Clone)]
pub struct MockProvider {
    fail_seeds: Vec<u64>,
    fail_all: Option<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any request whose effective seed is `seed`
    pub fn fail_on_seed(mut self, seed: u64) -> Self {
        self.fail_seeds.push(seed);
        self
    }

    /// Fail every request with `reason`
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_seeds: Vec::new(),
            fail_all: Some(reason.to_string()),
        }
    }
}

impl SpriteGenerator for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        match &self.fail_all {
            Some(reason) => Ok(ProviderStatus::Unavailable(reason.clone())),
            None => Ok(ProviderStatus::Available),
        }
    }

    fn generate(&self, prompt: &CompiledPrompt, params: &GenerationParams) -> Result<GeneratedSprite> {
        if let Some(reason) = &self.fail_all {
            return Err(KilnError::Generation(reason.clone()));
        }
        let seed = prompt.effective_seed();
        if self.fail_seeds.contains(&seed) {
            return Err(KilnError::Generation(format!("mock failure for seed {}", seed)));
        }
        params.validate()?;

        let image = draw_figure(prompt, params, seed);
        let metadata = sprite_metadata(self.name(), prompt, params);
        GeneratedSprite::from_rgba(SpriteId::new(&params.label()), &image, metadata)
    }
}

/// Byte source derived from the seed and a channel label
struct SeedBytes(ContentHash);

impl SeedBytes {
    fn new(seed: u64, channel: &str) -> Self {
        Self(ContentHash::from_parts(&[&seed.to_le_bytes(), channel.as_bytes()]))
    }

    fn byte(&self, i: usize) -> u8 {
        self.0.as_bytes()[i % 32]
    }

    /// Offset in [-range, range]
    fn jitter(&self, i: usize, range: f32) -> f32 {
        (self.byte(i) as f32 / 255.0 * 2.0 - 1.0) * range
    }
}

fn draw_figure(prompt: &CompiledPrompt, params: &GenerationParams, seed: u64) -> RgbaImage {
    let (w, h) = (params.resolution.width, params.resolution.height);
    let palette = SeedBytes::new(seed, "palette");

    let background = Rgba::opaque(
        200 + palette.byte(0) % 56,
        200 + palette.byte(1) % 56,
        200 + palette.byte(2) % 56,
    );
    let body = Rgba::from_hsv(palette.byte(3) as f32 / 255.0 * 360.0, 0.7, 0.55, 255);
    let (hue, sat, val) = body.to_hsv();
    let outline = Rgba::from_hsv(hue, sat, val * 0.4, 255);
    let accent = Rgba::from_hsv(hue + 40.0, sat * 0.8, (val * 1.4).min(1.0), 255);

    let mut mask = vec![0u8; w as usize * h as usize]; // 0 empty, 1 body, 2 accent
    let scale = w.min(h) as f32;

    if params.entity.is_animated_body() || prompt.pose.is_some() {
        let pose = prompt
            .pose
            .clone()
            .unwrap_or_else(|| default_pose(&SeedBytes::new(seed, "pose")));
        let thickness = (scale * 0.06).max(1.0);
        let center = pose.centroid;
        let neck = Keypoint::new(pose.head.x, pose.head.y + 0.12);

        fill_disc(&mut mask, w, h, pose.head, scale * 0.1, 2);
        draw_limb(&mut mask, w, h, neck, center, thickness * 1.8, 1);
        draw_limb(&mut mask, w, h, neck, pose.left_hand, thickness, 1);
        draw_limb(&mut mask, w, h, neck, pose.right_hand, thickness, 1);
        draw_limb(&mut mask, w, h, center, pose.left_foot, thickness, 1);
        draw_limb(&mut mask, w, h, center, pose.right_foot, thickness, 1);
    } else {
        let shape = SeedBytes::new(seed, "shape");
        let radius = scale * (0.22 + shape.byte(0) as f32 / 255.0 * 0.12);
        let center = Keypoint::new(0.5 + shape.jitter(1, 0.05), 0.5 + shape.jitter(2, 0.05));
        fill_disc(&mut mask, w, h, center, radius, 1);
        fill_disc(&mut mask, w, h, center, radius * 0.4, 2);
    }

    RgbaImage::from_fn(w, h, |x, y| {
        let idx = (y * w + x) as usize;
        let color = match mask[idx] {
            1 => body,
            2 => accent,
            _ if touches_figure(&mask, w, h, x, y) => outline,
            _ => background,
        };
        Pixel(color.to_array())
    })
}

/// Standing pose with seed-dependent limb jitter
fn default_pose(bytes: &SeedBytes) -> PoseDescriptor {
    let mut pose = PoseDescriptor::blank(0);
    pose.empty = false;
    pose.centroid = Keypoint::new(0.5, 0.58);
    pose.head = Keypoint::new(0.5 + bytes.jitter(0, 0.03), 0.2);
    pose.left_hand = Keypoint::new(0.28 + bytes.jitter(1, 0.06), 0.5 + bytes.jitter(2, 0.08));
    pose.right_hand = Keypoint::new(0.72 + bytes.jitter(3, 0.06), 0.5 + bytes.jitter(4, 0.08));
    pose.left_foot = Keypoint::new(0.38 + bytes.jitter(5, 0.06), 0.88);
    pose.right_foot = Keypoint::new(0.62 + bytes.jitter(6, 0.06), 0.88);
    pose
}

/// Keep drawing off the border so the background stays edge-connected
fn clamp_point(p: Keypoint) -> Keypoint {
    Keypoint::new(p.x.clamp(0.1, 0.9), p.y.clamp(0.1, 0.9))
}

fn fill_disc(mask: &mut [u8], w: u32, h: u32, center: Keypoint, radius: f32, value: u8) {
    let c = clamp_point(center);
    let (cx, cy) = (c.x * w as f32, c.y * h as f32);
    let r = radius.max(0.5);
    let x0 = (cx - r).floor().max(1.0) as u32;
    let y0 = (cy - r).floor().max(1.0) as u32;
    let x1 = ((cx + r).ceil() as u32).min(w.saturating_sub(2));
    let y1 = ((cy + r).ceil() as u32).min(h.saturating_sub(2));
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r * r {
                let idx = (y * w + x) as usize;
                if let Some(cell) = mask.get_mut(idx) {
                    *cell = (*cell).max(value);
                }
            }
        }
    }
}

fn draw_limb(mask: &mut [u8], w: u32, h: u32, from: Keypoint, to: Keypoint, thickness: f32, value: u8) {
    let (a, b) = (clamp_point(from), clamp_point(to));
    let length_px = ((b.x - a.x) * w as f32).hypot((b.y - a.y) * h as f32);
    let steps = length_px.ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let p = Keypoint::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
        fill_disc(mask, w, h, p, thickness / 2.0, value);
    }
}

fn touches_figure(mask: &[u8], w: u32, h: u32, x: u32, y: u32) -> bool {
    let neighbors = [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)];
    neighbors.iter().any(|(dx, dy)| {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        nx >= 0
            && ny >= 0
            && (nx as u32) < w
            && (ny as u32) < h
            && mask[(ny as u32 * w + nx as u32) as usize] != 0
    })
}
