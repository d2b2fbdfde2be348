//! Pose extraction from reference sprite sheets
//!
//! A sheet is sliced into a grid of `frame_width x frame_height` cells in
//! row-major order. Each cell is reduced to a foreground mask and then to
//! a `PoseDescriptor`: coverage, bounds, centroid, principal-axis lean,
//! extremity keypoints and an 8x8 occupancy signature.

use image::RgbaImage;
use kiln_core::{Keypoint, KilnError, NormRect, PoseDescriptor, PoseSequence, Result, Rgba};

/// Default per-channel tolerance against the key color of opaque sheets
const DEFAULT_TOLERANCE: u32 = 24;

/// How foreground pixels are told apart from background
#[derive(Debug, Clone, Copy)]
enum Foreground {
    /// Sheet has transparency: any visible pixel is foreground
    Alpha,
    /// Opaque sheet: pixels far enough from the corner color
    KeyColor { background: Rgba, threshold: u32 },
}

impl Foreground {
    fn detect(sheet: &RgbaImage, tolerance: u32) -> Self {
        if sheet.pixels().any(|p| p.0[3] < 255) {
            return Foreground::Alpha;
        }
        Foreground::KeyColor {
            background: Rgba::from_array(sheet.get_pixel(0, 0).0),
            threshold: tolerance * tolerance * 3,
        }
    }

    fn is_set(&self, px: [u8; 4]) -> bool {
        match *self {
            Foreground::Alpha => px[3] > 0,
            Foreground::KeyColor { background, threshold } => {
                Rgba::from_array(px).distance_sq(background) > threshold
            }
        }
    }
}

/// Slices reference sheets into pose sequences
#[derive(Debug, Clone)]
pub struct MotionExtractor {
    tolerance: u32,
}

impl Default for MotionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionExtractor {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Key-color tolerance used for sheets without transparency
    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance as u32;
        self
    }

    /// Extract one pose per full cell, row-major.
    ///
    /// A trailing partial row or column is discarded with a warning. Fails
    /// only on a zero frame size or a sheet smaller than one frame.
    #[tracing::instrument(skip(self, sheet), fields(sheet_w = sheet.width(), sheet_h = sheet.height()))]
    pub fn extract_pose_sequence(
        &self,
        sheet: &RgbaImage,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<PoseSequence> {
        if frame_width == 0 || frame_height == 0 {
            return Err(KilnError::Motion(format!(
                "frame size must be positive, got {}x{}",
                frame_width, frame_height
            )));
        }
        let (sheet_w, sheet_h) = sheet.dimensions();
        if sheet_w < frame_width || sheet_h < frame_height {
            return Err(KilnError::Motion(format!(
                "sheet {}x{} is smaller than one {}x{} frame",
                sheet_w, sheet_h, frame_width, frame_height
            )));
        }

        let columns = sheet_w / frame_width;
        let rows = sheet_h / frame_height;
        let mut warnings = Vec::new();
        if sheet_w % frame_width != 0 {
            warnings.push(format!(
                "sheet width {} is not a multiple of frame width {}; discarded a {} px partial column",
                sheet_w,
                frame_width,
                sheet_w % frame_width
            ));
        }
        if sheet_h % frame_height != 0 {
            warnings.push(format!(
                "sheet height {} is not a multiple of frame height {}; discarded a {} px partial row",
                sheet_h,
                frame_height,
                sheet_h % frame_height
            ));
        }
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let foreground = Foreground::detect(sheet, self.tolerance);
        let poses: Vec<PoseDescriptor> = (0..rows)
            .flat_map(|row| (0..columns).map(move |col| (row, col)))
            .map(|(row, col)| {
                let cell = Cell {
                    x: col * frame_width,
                    y: row * frame_height,
                    w: frame_width,
                    h: frame_height,
                };
                describe_cell(sheet, &foreground, cell, row * columns + col)
            })
            .collect();

        tracing::info!(poses = poses.len(), columns, rows, "extracted pose sequence");

        Ok(PoseSequence {
            frame_width,
            frame_height,
            columns,
            rows,
            poses,
            warnings,
        })
    }

    /// Decode an encoded sheet (PNG, WebP, ...) and extract from it
    pub fn extract_from_bytes(&self, data: &[u8], frame_width: u32, frame_height: u32) -> Result<PoseSequence> {
        let sheet = image::load_from_memory(data)?.to_rgba8();
        self.extract_pose_sequence(&sheet, frame_width, frame_height)
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

fn describe_cell(sheet: &RgbaImage, foreground: &Foreground, cell: Cell, frame_index: u32) -> PoseDescriptor {
    let mut points: Vec<(u32, u32)> = Vec::new();
    let mut hits = [0u32; 64];
    let mut totals = [0u32; 64];

    for y in 0..cell.h {
        for x in 0..cell.w {
            let bucket = ((y * 8 / cell.h) * 8 + x * 8 / cell.w) as usize;
            totals[bucket] += 1;
            if foreground.is_set(sheet.get_pixel(cell.x + x, cell.y + y).0) {
                hits[bucket] += 1;
                points.push((x, y));
            }
        }
    }

    if points.is_empty() {
        return PoseDescriptor::blank(frame_index);
    }

    let (fw, fh) = (cell.w as f32, cell.h as f32);
    let norm = |&(x, y): &(u32, u32)| Keypoint::new((x as f32 + 0.5) / fw, (y as f32 + 0.5) / fh);
    let n = points.len() as f32;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
    for &(x, y) in &points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
        sum_x += x as f32 + 0.5;
        sum_y += y as f32 + 0.5;
    }
    let (cx, cy) = (sum_x / n, sum_y / n);
    let centroid = Keypoint::new(cx / fw, cy / fh);

    // Regress x on y: leaning right means x grows as y shrinks
    let (mut m_xy, mut m_yy) = (0.0f32, 0.0f32);
    for &(x, y) in &points {
        let dx = (x as f32 + 0.5 - cx) / fw;
        let dy = (y as f32 + 0.5 - cy) / fh;
        m_xy += dx * dy;
        m_yy += dy * dy;
    }
    let lean = if m_yy > f32::EPSILON {
        (-m_xy / m_yy).atan()
    } else {
        0.0
    };

    let top: Vec<u32> = points.iter().filter(|p| p.1 == min_y).map(|p| p.0).collect();
    let head_x = top.iter().map(|&x| x as f32).sum::<f32>() / top.len() as f32;
    let head = Keypoint::new((head_x + 0.5) / fw, (min_y as f32 + 0.5) / fh);

    let upper: Vec<&(u32, u32)> = points.iter().filter(|p| p.1 as f32 + 0.5 <= cy).collect();
    let left_hand = upper
        .iter()
        .min_by_key(|p| (p.0, p.1))
        .map(|p| norm(*p))
        .unwrap_or(centroid);
    let right_hand = upper
        .iter()
        .max_by_key(|p| (p.0, std::cmp::Reverse(p.1)))
        .map(|p| norm(*p))
        .unwrap_or(centroid);

    let lowest = points.iter().max_by_key(|p| p.1).map(norm).unwrap_or(centroid);
    let left_foot = points
        .iter()
        .filter(|p| p.0 as f32 + 0.5 <= cx)
        .max_by_key(|p| (p.1, std::cmp::Reverse(p.0)))
        .map(norm)
        .unwrap_or(lowest);
    let right_foot = points
        .iter()
        .filter(|p| p.0 as f32 + 0.5 > cx)
        .max_by_key(|p| (p.1, p.0))
        .map(norm)
        .unwrap_or(lowest);

    let mut signature = 0u64;
    for bucket in 0..64 {
        if hits[bucket] > 0 && hits[bucket] * 8 >= totals[bucket] {
            signature |= 1 << bucket;
        }
    }

    PoseDescriptor {
        frame_index,
        coverage: n / (fw * fh),
        bounds: NormRect {
            x: min_x as f32 / fw,
            y: min_y as f32 / fh,
            w: (max_x - min_x + 1) as f32 / fw,
            h: (max_y - min_y + 1) as f32 / fh,
        },
        centroid,
        lean,
        head,
        left_hand,
        right_hand,
        left_foot,
        right_foot,
        signature,
        empty: false,
    }
}
