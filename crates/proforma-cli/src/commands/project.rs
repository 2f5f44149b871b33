use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use proforma_core::{Engine, Registry};

use crate::input;

/// Arguments for running a projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Archetype id: saas, solar, consulting
    pub archetype: String,

    /// Path to a JSON or YAML assumption file (otherwise read from stdin)
    #[arg(long)]
    pub input: Option<String>,

    /// Project the archetype's built-in example assumptions
    #[arg(long, conflicts_with = "input")]
    pub example: bool,

    /// Path to a JSON or YAML engine options file
    #[arg(long)]
    pub config: Option<String>,

    /// Deduct only interest for tax and pay full debt service from equity cash
    #[arg(long)]
    pub strict_tax: bool,

    /// NPV rate for archetypes without their own hurdle rate
    #[arg(long, allow_hyphen_values = true)]
    pub discount_rate: Option<Decimal>,
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut options = input::file::read_options(args.config.as_deref())?;
    if args.strict_tax {
        options.strict_tax_model = true;
    }
    if let Some(rate) = args.discount_rate {
        options.discount_rate = Some(rate);
    }

    let registry = Registry::builtin();
    let raw: Value = if args.example {
        registry.describe(&args.archetype)?.example_inputs
    } else if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("--input <file>, --example or stdin required for projection".into());
    };

    let engine = Engine::new(registry, options)?;
    let result = engine.project(&args.archetype, &raw)?;
    Ok(serde_json::to_value(result)?)
}
