use clap::Args;
use serde_json::{json, Value};

use proforma_core::Registry;

/// Arguments for describing one archetype
#[derive(Args)]
pub struct DescribeArgs {
    /// Archetype id (see `proforma archetypes`)
    pub archetype: String,

    /// Print only the example payload, ready to edit and feed back to `project`
    #[arg(long)]
    pub example: bool,
}

pub fn run_archetypes() -> Result<Value, Box<dyn std::error::Error>> {
    let summaries: Vec<Value> = Registry::builtin()
        .descriptors()
        .into_iter()
        .map(|d| {
            json!({
                "id": d.id,
                "name": d.name,
                "fields": d.fields.len(),
                "description": d.description,
            })
        })
        .collect();
    Ok(json!({ "result": { "descriptors": summaries } }))
}

pub fn run_describe(args: DescribeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let descriptor = Registry::builtin().describe(&args.archetype)?;
    if args.example {
        return Ok(descriptor.example_inputs);
    }
    Ok(json!({ "result": serde_json::to_value(descriptor)? }))
}
