//! Asset set planning command

use anyhow::Result;
use kiln_gen::{AssetSetPlanner, SetType};

pub fn run(asset_id: &str, set_type: Option<&str>, format: &str) -> Result<()> {
    let set_type = set_type.map(|s| s.parse::<SetType>()).transpose()?;
    let plan = AssetSetPlanner::default().plan(asset_id, set_type)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Missing: {}", plan.missing_id);
    println!("  Base:     {}", plan.base_id);
    println!("  Set type: {}", plan.set_type);
    println!("  Why:      {}", plan.rationale);
    println!("\nPlanned assets ({}):", plan.assets.len());
    for asset in &plan.assets {
        println!("  {:<32} \"{}\"", asset.id, asset.concept);
    }
    Ok(())
}
