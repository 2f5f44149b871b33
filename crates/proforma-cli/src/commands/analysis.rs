use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use proforma_core::scenarios::{
    run_scenarios, run_sensitivity, OutputMetric, ScenarioInput, SensitivityInput,
    SensitivityVariable,
};
use proforma_core::{Engine, Registry};

use crate::input;

/// Arguments for two-way sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a complete sensitivity definition (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Archetype id, when building the definition from flags
    #[arg(long)]
    pub archetype: Option<String>,

    /// First variable as path:min:max:step (e.g. "ppa_price:25:35:2.5")
    #[arg(long)]
    pub var1: Option<String>,

    /// Second variable as path:min:max:step
    #[arg(long)]
    pub var2: Option<String>,

    /// Base assumption file; defaults to the archetype's example
    #[arg(long)]
    pub base: Option<String>,

    /// Metric to tabulate: irr, npv, equity_multiple
    #[arg(long, default_value = "irr")]
    pub metric: String,

    /// Engine options file
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for probability-weighted scenario analysis
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to a scenario definition (JSON or YAML); otherwise read from stdin
    #[arg(long)]
    pub input: Option<String>,

    /// Engine options file
    #[arg(long)]
    pub config: Option<String>,
}

fn parse_sweep(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!("Sensitivity variable must be path:min:max:step, got '{spec}'").into());
    }
    let number = |s: &str| -> Result<Decimal, Box<dyn std::error::Error>> {
        s.trim()
            .parse::<Decimal>()
            .map_err(|e| format!("Invalid number '{s}' in '{spec}': {e}").into())
    };
    Ok(SensitivityVariable {
        name: parts[0].trim().to_string(),
        min: number(parts[1])?,
        max: number(parts[2])?,
        step: number(parts[3])?,
    })
}

fn parse_metric(name: &str) -> Result<OutputMetric, Box<dyn std::error::Error>> {
    serde_json::from_value(json!(name))
        .map_err(|_| format!("Unknown metric '{name}' (expected irr, npv or equity_multiple)").into())
}

fn engine(config: Option<&str>) -> Result<Engine, Box<dyn std::error::Error>> {
    let options = input::file::read_options(config)?;
    Ok(Engine::new(Registry::builtin(), options)?)
}

pub fn run_sensitivity_cmd(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = engine(args.config.as_deref())?;

    let sensitivity_input: SensitivityInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else {
        let archetype = args
            .archetype
            .ok_or("--archetype is required (or provide --input)")?;
        let var1 = args.var1.as_deref().ok_or("--var1 is required (or provide --input)")?;
        let var2 = args.var2.as_deref().ok_or("--var2 is required (or provide --input)")?;
        let base_inputs = match args.base {
            Some(ref path) => input::file::read_document(path)?,
            None => engine.registry().describe(&archetype)?.example_inputs,
        };
        SensitivityInput {
            archetype,
            base_inputs,
            variable_1: parse_sweep(var1)?,
            variable_2: parse_sweep(var2)?,
            output_metric: parse_metric(&args.metric)?,
        }
    };

    let result = run_sensitivity(&engine, &sensitivity_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_scenarios_cmd(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let engine = engine(args.config.as_deref())?;
    let scenario_input: ScenarioInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for scenario analysis".into());
    };

    let result = run_scenarios(&engine, &scenario_input)?;
    Ok(serde_json::to_value(result)?)
}
