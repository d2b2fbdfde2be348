//! Motion retargeting
//!
//! Regenerates every pose of a reference sequence for a new target
//! description. The target is interpreted once; each pose then becomes a
//! pose-conditioned prompt whose seed is derived from
//! `(pose index, target, style)`, so identical inputs reproduce identical
//! frames. A failed pose is dropped with a warning and the rest continue.

use kiln_core::{
    ContentHash, GeneratedSprite, KilnError, PoseSequence, Resolution, Result, SpriteId,
};
use kiln_gen::export::{pack_sheet, ClipSpec, PackedSheet};
use kiln_gen::{
    generate_guarded, AssetPipeline, ConceptInterpreter, PromptCompiler, SpriteGenerator,
    StyleAnalyzer, VisualStyle,
};
use std::sync::Arc;

/// Seed used for the frame regenerated from pose `pose_index`
pub fn retarget_seed(pose_index: u32, target: &str, style: &str) -> u64 {
    ContentHash::from_parts(&[
        &pose_index.to_le_bytes(),
        target.trim().as_bytes(),
        style.trim().as_bytes(),
    ])
    .to_seed()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetargetOptions {
    /// Pack the produced frames into a sheet
    pub pack_sheet: bool,
    pub frame_rate: f32,
    pub looping: bool,
    /// Output frame size; defaults to the reference frame size
    pub resolution: Option<Resolution>,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            pack_sheet: false,
            frame_rate: 10.0,
            looping: true,
            resolution: None,
        }
    }
}

/// One regenerated frame and the pose it came from
#[derive(Debug, Clone)]
pub struct RetargetedFrame {
    pub pose_index: u32,
    pub sprite: GeneratedSprite,
}

#[derive(Debug, Clone)]
pub struct MotionTransfer {
    /// Successful frames in pose order
    pub frames: Vec<RetargetedFrame>,
    pub warnings: Vec<String>,
    pub sheet: Option<PackedSheet>,
}

impl MotionTransfer {
    pub fn sprites(&self) -> Vec<GeneratedSprite> {
        self.frames.iter().map(|f| f.sprite.clone()).collect()
    }
}

/// Maps pose sequences onto new subjects
pub struct MotionRetargeter {
    generator: Arc<dyn SpriteGenerator>,
    interpreter: ConceptInterpreter,
    analyzer: StyleAnalyzer,
    compiler: PromptCompiler,
}

impl MotionRetargeter {
    pub fn new(generator: Arc<dyn SpriteGenerator>, analyzer: StyleAnalyzer) -> Self {
        Self {
            generator,
            interpreter: ConceptInterpreter::new(),
            analyzer,
            compiler: PromptCompiler::new(),
        }
    }

    /// Share the generator and style table of an existing pipeline
    pub fn from_pipeline(pipeline: &AssetPipeline) -> Self {
        Self::new(pipeline.generator(), pipeline.analyzer().clone())
    }

    /// Regenerate every pose in `sequence` as `target` drawn in `style`.
    ///
    /// Fails only on an empty target or an empty sequence. Per-pose
    /// generation failures become warnings naming the pose index.
    #[tracing::instrument(skip(self, sequence, options), fields(poses = sequence.len()))]
    pub fn transfer_motion(
        &self,
        sequence: &PoseSequence,
        target: &str,
        style: &str,
        options: &RetargetOptions,
    ) -> Result<MotionTransfer> {
        if target.trim().is_empty() {
            return Err(KilnError::InvalidParams("target description is empty".to_string()));
        }
        if sequence.is_empty() {
            return Err(KilnError::Motion("pose sequence is empty".to_string()));
        }

        let interpretation = self.interpreter.interpret(target);
        let mut params = interpretation.params;
        if !style.trim().is_empty() {
            params.style = VisualStyle::from(style);
        }
        params.resolution = options
            .resolution
            .unwrap_or_else(|| Resolution::new(sequence.frame_width, sequence.frame_height));
        params.frame_count = None;
        params.tags.push("retargeted".to_string());
        params.validate()?;

        let mut warnings = Vec::new();
        let resolution = self.analyzer.resolve(&params);
        for warning in resolution.warnings {
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }
        let base = self.compiler.compile(&params, &resolution.config);
        let base_id = SpriteId::new(&format!("{} motion", params.label()));

        let mut frames = Vec::with_capacity(sequence.len());
        for (index, pose) in sequence.poses.iter().enumerate() {
            let index = index as u32;
            let mut prompt = base.clone().with_pose(pose.clone());
            prompt.seed = Some(retarget_seed(index, target, style));

            match generate_guarded(self.generator.as_ref(), &prompt, &params) {
                Ok(mut sprite) => {
                    sprite.id = base_id.derive(&format!("pose{}", index));
                    sprite.metadata.tags.push(format!("pose:{}", index));
                    frames.push(RetargetedFrame {
                        pose_index: index,
                        sprite,
                    });
                }
                Err(e) => {
                    let message = format!("pose {} failed: {}", index, e);
                    tracing::warn!("{}", message);
                    warnings.push(message);
                }
            }
        }

        let mut sheet = None;
        if options.pack_sheet && !frames.is_empty() {
            let clip = ClipSpec {
                name: params
                    .action
                    .map(|a| a.as_str().to_string())
                    .unwrap_or_else(|| "motion".to_string()),
                frame_rate: options.frame_rate,
                looping: options.looping,
            };
            let sprites: Vec<GeneratedSprite> = frames.iter().map(|f| f.sprite.clone()).collect();
            match pack_sheet(&sprites, Some(&clip)) {
                Ok(packed) => sheet = Some(packed),
                Err(e) => warnings.push(format!("sheet packing failed: {}", e)),
            }
        }

        tracing::info!(
            frames = frames.len(),
            poses = sequence.len(),
            warnings = warnings.len(),
            "motion transfer finished"
        );

        Ok(MotionTransfer {
            frames,
            warnings,
            sheet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MotionExtractor;
    use kiln_core::{Keypoint, PoseDescriptor};
    use kiln_gen::providers::mock::MockProvider;
    use kiln_gen::{StyleTable, ValidationConfig};

    const TARGET: &str = "armored knight";
    const STYLE: &str = "pixel-art";

    fn analyzer() -> StyleAnalyzer {
        StyleAnalyzer::new(Arc::new(StyleTable::builtin()))
    }

    fn retargeter(mock: MockProvider) -> MotionRetargeter {
        MotionRetargeter::new(Arc::new(mock), analyzer())
    }

    fn swing_sequence(n: u32) -> PoseSequence {
        let poses = (0..n)
            .map(|i| {
                let mut pose = PoseDescriptor::blank(i);
                pose.empty = false;
                pose.coverage = 0.2;
                pose.centroid = Keypoint::new(0.5, 0.55);
                pose.head = Keypoint::new(0.5, 0.2);
                let swing = (i as f32 / n as f32 - 0.5) * 0.3;
                pose.left_hand = Keypoint::new(0.3 + swing, 0.45);
                pose.right_hand = Keypoint::new(0.7 + swing, 0.45);
                pose.left_foot = Keypoint::new(0.4 - swing, 0.85);
                pose.right_foot = Keypoint::new(0.6 + swing, 0.85);
                pose
            })
            .collect();
        PoseSequence {
            frame_width: 32,
            frame_height: 32,
            columns: n,
            rows: 1,
            poses,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_one_frame_per_pose() {
        let seq = swing_sequence(6);
        let transfer = retargeter(MockProvider::new())
            .transfer_motion(&seq, TARGET, STYLE, &RetargetOptions::default())
            .unwrap();
        assert_eq!(transfer.frames.len(), 6);
        assert!(transfer.warnings.is_empty());
        for (i, frame) in transfer.frames.iter().enumerate() {
            assert_eq!(frame.pose_index, i as u32);
            assert_eq!((frame.sprite.width, frame.sprite.height), (32, 32));
            assert!(frame.sprite.metadata.prompt.as_ref().unwrap().contains("pose:"));
        }
        assert!(transfer.sheet.is_none());
    }

    #[test]
    fn test_failed_pose_is_skipped() {
        let seq = swing_sequence(10);
        let mock = MockProvider::new().fail_on_seed(retarget_seed(5, TARGET, STYLE));
        let transfer = retargeter(mock)
            .transfer_motion(&seq, TARGET, STYLE, &RetargetOptions::default())
            .unwrap();

        assert_eq!(transfer.frames.len(), 9);
        assert_eq!(transfer.warnings.len(), 1);
        assert!(transfer.warnings[0].contains("pose 5"));
        assert!(transfer.frames.iter().all(|f| f.pose_index != 5));
    }

    #[test]
    fn test_rerun_is_reproducible() {
        let seq = swing_sequence(4);
        let rt = retargeter(MockProvider::new());
        let a = rt
            .transfer_motion(&seq, TARGET, STYLE, &RetargetOptions::default())
            .unwrap();
        let b = rt
            .transfer_motion(&seq, TARGET, STYLE, &RetargetOptions::default())
            .unwrap();
        for (x, y) in a.frames.iter().zip(&b.frames) {
            assert_eq!(x.sprite.data, y.sprite.data);
            assert_eq!(x.sprite.metadata.seed, y.sprite.metadata.seed);
        }
        assert_ne!(
            retarget_seed(0, TARGET, STYLE),
            retarget_seed(0, "goblin archer", STYLE)
        );
        assert_ne!(retarget_seed(0, TARGET, STYLE), retarget_seed(1, TARGET, STYLE));
    }

    #[test]
    fn test_packs_sheet_when_asked() {
        let seq = swing_sequence(5);
        let options = RetargetOptions {
            pack_sheet: true,
            ..RetargetOptions::default()
        };
        let transfer = retargeter(MockProvider::new())
            .transfer_motion(&seq, "slime walk", STYLE, &options)
            .unwrap();
        let sheet = transfer.sheet.unwrap();
        assert_eq!(sheet.metadata.frames.len(), 5);
        assert_eq!(sheet.metadata.animations[0].name, "walk");
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let rt = retargeter(MockProvider::new());
        let seq = swing_sequence(2);
        assert!(rt.transfer_motion(&seq, "  ", STYLE, &RetargetOptions::default()).is_err());

        let empty = PoseSequence {
            poses: Vec::new(),
            ..swing_sequence(1)
        };
        assert!(rt.transfer_motion(&empty, TARGET, STYLE, &RetargetOptions::default()).is_err());
    }

    #[test]
    fn test_extract_then_retarget() {
        let mut sheet = image::RgbaImage::new(128, 64);
        for (col, height) in [(0u32, 40u32), (1, 30)] {
            for y in 10..10 + height {
                for x in col * 64 + 28..col * 64 + 36 {
                    sheet.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
                }
            }
        }
        let seq = MotionExtractor::new().extract_pose_sequence(&sheet, 64, 64).unwrap();

        let pipeline = AssetPipeline::new(
            Arc::new(MockProvider::new()),
            Arc::new(StyleTable::builtin()),
            ValidationConfig::default(),
        );
        let transfer = MotionRetargeter::from_pipeline(&pipeline)
            .transfer_motion(&seq, "fire dragon", "anime", &RetargetOptions::default())
            .unwrap();
        assert_eq!(transfer.frames.len(), 2);
        assert_eq!(transfer.frames[0].sprite.width, 64);
        assert_eq!(transfer.frames[0].sprite.metadata.style, "anime");
    }
}
