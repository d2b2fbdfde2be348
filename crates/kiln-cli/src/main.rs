//! Kiln CLI - Command-line interface for the Kiln sprite pipeline

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, interpret, motion, plan, validate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Concept-to-sprite generation for game assets", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging for kiln crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a concept is interpreted, without generating
    Interpret {
        /// Free-text concept (e.g., "pixel art fire dragon idle animation side view")
        concept: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate a sprite from a concept
    Generate {
        /// Free-text concept
        concept: String,

        /// Target engine for code bindings (phaser, godot, unity, generic)
        #[arg(long, default_value = "generic")]
        engine: String,

        /// Provider to use (mock, flux)
        #[arg(long)]
        provider: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "sprites")]
        output: String,

        /// Skip post-processing
        #[arg(long)]
        no_post: bool,

        /// Skip quality validation
        #[arg(long)]
        no_validate: bool,

        /// Skip sheet packing and code bindings
        #[arg(long)]
        no_export: bool,

        /// Fail on any validation warning
        #[arg(long)]
        require_valid: bool,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Generate every animation state instead of the concept's action
        #[arg(long)]
        all_states: bool,
    },

    /// Transfer the motion of a reference sheet onto a new subject
    Motion {
        /// Reference sprite sheet (PNG)
        sheet: String,

        /// Description of the new subject
        #[arg(long)]
        target: String,

        /// Visual style for the new frames
        #[arg(long, default_value = "pixel-art")]
        style: String,

        /// Width of one reference frame
        #[arg(long)]
        frame_width: u32,

        /// Height of one reference frame
        #[arg(long)]
        frame_height: u32,

        /// Provider to use (mock, flux)
        #[arg(long)]
        provider: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "sprites")]
        output: String,
    },

    /// Validate a sprite image
    Validate {
        /// Path to the image
        path: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Plan the asset set a missing asset id belongs to
    Plan {
        /// Missing asset id (e.g., hero_walk_north)
        asset_id: String,

        /// Force a set type (directional, animation, color-variants, equipment)
        #[arg(long)]
        set_type: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "kiln=debug" } else { "kiln=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Interpret { concept, format } => interpret::run(&concept, &format),
        Commands::Generate {
            concept,
            engine,
            provider,
            output,
            no_post,
            no_validate,
            no_export,
            require_valid,
            seed,
            all_states,
        } => generate::run(generate::GenerateArgs {
            concept,
            engine,
            provider,
            output,
            no_post,
            no_validate,
            no_export,
            require_valid,
            seed,
            all_states,
        }),
        Commands::Motion {
            sheet,
            target,
            style,
            frame_width,
            frame_height,
            provider,
            output,
        } => motion::run(motion::MotionArgs {
            sheet,
            target,
            style,
            frame_width,
            frame_height,
            provider,
            output,
        }),
        Commands::Validate { path, format } => validate::run(&path, &format),
        Commands::Plan {
            asset_id,
            set_type,
            format,
        } => plan::run(&asset_id, set_type.as_deref(), &format),
    }
}
