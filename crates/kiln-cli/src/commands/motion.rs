//! Motion transfer command

use super::{load_config, write_artifact, write_sprite};
use anyhow::{Context, Result};
use kiln_core::slug;
use kiln_gen::AssetPipeline;
use kiln_motion::{MotionExtractor, MotionRetargeter, RetargetOptions};
use std::path::Path;

pub struct MotionArgs {
    pub sheet: String,
    pub target: String,
    pub style: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub provider: Option<String>,
    pub output: String,
}

pub fn run(args: MotionArgs) -> Result<()> {
    let data = std::fs::read(&args.sheet)
        .with_context(|| format!("Failed to read reference sheet {}", args.sheet))?;
    let sequence = MotionExtractor::new().extract_from_bytes(&data, args.frame_width, args.frame_height)?;
    println!(
        "Extracted {} poses ({}x{} grid) from {}",
        sequence.len(),
        sequence.columns,
        sequence.rows,
        args.sheet
    );
    for warning in &sequence.warnings {
        println!("  Warning: {}", warning);
    }

    let config = load_config();
    let pipeline = AssetPipeline::from_config(&config, args.provider.as_deref())?;
    let options = RetargetOptions {
        pack_sheet: true,
        ..RetargetOptions::default()
    };
    let transfer = MotionRetargeter::from_pipeline(&pipeline).transfer_motion(
        &sequence,
        &args.target,
        &args.style,
        &options,
    )?;

    let output = Path::new(&args.output);
    for frame in &transfer.frames {
        write_sprite(output, &frame.sprite)?;
    }
    println!(
        "Retargeted {}/{} poses onto '{}'",
        transfer.frames.len(),
        sequence.len(),
        args.target
    );
    for warning in &transfer.warnings {
        println!("  Warning: {}", warning);
    }

    if let Some(sheet) = &transfer.sheet {
        let name = format!("{}_motion_sheet.png", slug(&args.target));
        let path = write_artifact(output, &name, &sheet.data)?;
        println!("  Sheet: {}", path.display());
        let meta_name = format!("{}_motion_sheet.json", slug(&args.target));
        write_artifact(output, &meta_name, serde_json::to_string_pretty(&sheet.metadata)?.as_bytes())?;
    }

    if transfer.frames.is_empty() {
        anyhow::bail!("Every pose failed to generate");
    }
    Ok(())
}
