//! Sprite generation command

use super::{load_config, write_artifact, write_sprite};
use anyhow::Result;
use kiln_gen::export::{bindings_file_name, sheet_file_name};
use kiln_gen::{AssetPipeline, PipelineConfig, PipelineResult, PipelineStage, ProgressObserver};
use std::path::Path;

pub struct GenerateArgs {
    pub concept: String,
    pub engine: String,
    pub provider: Option<String>,
    pub output: String,
    pub no_post: bool,
    pub no_validate: bool,
    pub no_export: bool,
    pub require_valid: bool,
    pub seed: Option<u64>,
    pub all_states: bool,
}

/// Prints stage transitions as they happen
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&self, stage: PipelineStage, progress: u8) {
        if !stage.is_terminal() {
            println!("  [{:>3}%] {}", progress, stage);
        }
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let config = load_config();
    let pipeline = AssetPipeline::from_config(&config, args.provider.as_deref())?;
    let pipeline_config = PipelineConfig {
        enable_post_processing: !args.no_post,
        enable_validation: !args.no_validate,
        enable_export: !args.no_export,
        target_engine: args.engine.clone(),
        require_valid: args.require_valid,
        seed: args.seed,
    };
    let output = Path::new(&args.output);

    if args.all_states {
        let set = pipeline.generate_all_animation_states(&args.concept, &pipeline_config, &[]);
        for (action, result) in &set.results {
            println!("{}:", action);
            write_result(result, output)?;
        }
        println!(
            "\n{}/{} animation states generated",
            set.succeeded(),
            set.results.len()
        );
        if set.succeeded() == 0 {
            anyhow::bail!("No animation state could be generated");
        }
        return Ok(());
    }

    println!("Generating '{}'", args.concept);
    let result = pipeline.execute(&args.concept, &pipeline_config, Some(&ConsoleProgress));
    write_result(&result, output)?;
    if !result.success {
        anyhow::bail!("Generation failed: {}", result.errors.join("; "));
    }
    Ok(())
}

fn write_result(result: &PipelineResult, output: &Path) -> Result<()> {
    for warning in &result.warnings {
        println!("  Warning: {}", warning);
    }
    for error in &result.errors {
        println!("  Error: {}", error);
    }

    let Some(sprite) = &result.sprite else {
        return Ok(());
    };

    if let Some(interpretation) = &result.interpretation {
        println!("  Confidence: {:.2}", interpretation.confidence);
    }
    if let Some(report) = &result.validation {
        println!("  Quality score: {:.2}", report.score);
    }
    if !result.success {
        return Ok(());
    }

    let path = write_sprite(output, sprite)?;
    println!("  Sprite: {}", path.display());
    for frame in result.frames.iter().skip(1) {
        write_sprite(output, frame)?;
    }
    if result.frames.len() > 1 {
        println!("  Frames: {}", result.frames.len());
    }

    if let Some(sheet) = &result.sheet {
        let path = write_artifact(output, &sheet_file_name(&sprite.id), sheet)?;
        println!("  Sheet: {}", path.display());
    }
    if let Some(code) = &result.code_bindings {
        let name = bindings_file_name(&sprite.id, result.target_engine);
        let path = write_artifact(output, &name, code.as_bytes())?;
        println!("  Bindings ({}): {}", result.target_engine.as_str(), path.display());
    }
    Ok(())
}
