//! Concept interpretation command

use super::load_config;
use anyhow::Result;
use kiln_gen::{ConceptInterpreter, PromptCompiler, StyleAnalyzer, StyleTable};
use std::sync::Arc;

pub fn run(concept: &str, format: &str) -> Result<()> {
    let interpretation = ConceptInterpreter::new().interpret(concept);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&interpretation)?);
        return Ok(());
    }

    let config = load_config();
    let styles = match config.styles_file() {
        Some(path) => StyleTable::load_with_overrides(path)?,
        None => StyleTable::builtin(),
    };
    let analyzer = StyleAnalyzer::new(Arc::new(styles));

    let p = &interpretation.params;
    println!("Concept: {}", concept);
    println!("  Entity:      {}", p.entity);
    if let Some(subject) = &p.subject {
        println!("  Subject:     {}", subject);
    }
    println!("  Style:       {}", p.style);
    println!("  Perspective: {}", p.perspective);
    println!("  Resolution:  {}", p.resolution);
    if let Some(action) = p.action {
        println!(
            "  Action:      {} ({} frames, {})",
            action,
            p.frames(),
            if p.looping.unwrap_or(false) { "looping" } else { "once" }
        );
    }
    if let Some(theme) = &p.theme {
        println!("  Theme:       {}", theme);
    }
    println!("  Confidence:  {:.2}", interpretation.confidence);

    println!("\nReasoning:");
    for line in &interpretation.reasoning {
        println!("  - {}", line);
    }

    let resolution = analyzer.resolve(p);
    for warning in &resolution.warnings {
        println!("\nWarning: {}", warning);
    }
    let prompt = PromptCompiler::new().compile(p, &resolution.config);
    println!("\nPrompt ({}):", prompt.model);
    println!("  + {}", prompt.positive);
    println!("  - {}", prompt.negative);
    Ok(())
}
