use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

use proforma_core::debt_schedule::{self, AmortizationInput};
use proforma_core::time_value;
use proforma_core::{with_metadata, Money, Rate};

use crate::input;

/// Cash flows supplied through a file or stdin
#[derive(Debug, Serialize, Deserialize)]
struct CashFlowInput {
    cash_flows: Vec<Money>,
    #[serde(default)]
    rate: Option<Rate>,
}

/// Arguments for IRR
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON input file with `cash_flows`
    #[arg(long)]
    pub input: Option<String>,

    /// Cash flows, period 0 first (comma-separated, e.g. "-100,30,30,60")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Engine options file; its `solver` section tunes the root finder
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for NPV
#[derive(Args)]
pub struct NpvArgs {
    /// Path to JSON input file with `cash_flows` and `rate`
    #[arg(long)]
    pub input: Option<String>,

    /// Discount rate as a decimal (0.08 = 8%)
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// Cash flows, period 0 first (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,
}

/// Arguments for a level-payment amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Annual interest rate as a decimal
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Tenor in years
    #[arg(long)]
    pub tenor: Option<u32>,

    /// Years to schedule (defaults to the tenor)
    #[arg(long)]
    pub horizon: Option<u32>,
}

fn read_cash_flows(
    path: Option<&str>,
    flags: Option<Vec<Decimal>>,
    rate: Option<Decimal>,
) -> Result<CashFlowInput, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return input::file::read_document(path);
    }
    if let Some(cash_flows) = flags {
        return Ok(CashFlowInput { cash_flows, rate });
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }
    Err("--cash-flows or --input <file.json> required".into())
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let options = input::file::read_options(args.config.as_deref())?;
    options.validate()?;
    let data = read_cash_flows(args.input.as_deref(), args.cash_flows, None)?;

    let mut warnings = Vec::new();
    let irr = match time_value::irr_detailed(&data.cash_flows, &options.solver) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warnings.push(format!("IRR could not be determined: {e}"));
            None
        }
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Internal Rate of Return (Newton-Raphson with bracketed bisection)",
        &json!({ "cash_flows": data.cash_flows, "solver": options.solver }),
        warnings,
        elapsed,
        json!({ "irr": irr, "periods": data.cash_flows.len() }),
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_npv(args: NpvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let data = read_cash_flows(args.input.as_deref(), args.cash_flows, args.rate)?;
    let rate = args
        .rate
        .or(data.rate)
        .ok_or("--rate is required (or provide `rate` in the input)")?;

    let npv = time_value::npv(rate, &data.cash_flows)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Net Present Value",
        &json!({ "rate": rate, "cash_flows": data.cash_flows }),
        Vec::new(),
        elapsed,
        json!({ "npv": npv, "rate": rate }),
    );
    Ok(serde_json::to_value(output)?)
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let amortization_input: AmortizationInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AmortizationInput {
            amount: args.amount.ok_or("--amount is required (or provide --input)")?,
            interest_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            tenor_years: args.tenor.ok_or("--tenor is required (or provide --input)")?,
            horizon_years: args.horizon,
        }
    };

    let result = debt_schedule::build_amortization_schedule(&amortization_input)?;
    Ok(serde_json::to_value(result)?)
}
