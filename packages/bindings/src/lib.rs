use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use proforma_core::debt_schedule::{build_amortization_schedule, AmortizationInput};
use proforma_core::scenarios::{self, ScenarioInput, SensitivityInput};
use proforma_core::time_value;
use proforma_core::{Engine, IrrSolverConfig, ProjectionOptions, Registry};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn engine(options_json: Option<String>) -> NapiResult<Engine> {
    let options: ProjectionOptions = match options_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => ProjectionOptions::default(),
    };
    Engine::new(Registry::builtin(), options).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[napi]
pub fn list_archetypes() -> NapiResult<String> {
    serde_json::to_string(&proforma_core::list_archetypes()).map_err(to_napi_error)
}

#[napi]
pub fn describe_archetype(archetype: String) -> NapiResult<String> {
    let descriptor = Registry::builtin()
        .describe(&archetype)
        .map_err(to_napi_error)?;
    serde_json::to_string(&descriptor).map_err(to_napi_error)
}

#[napi]
pub fn project(
    archetype: String,
    input_json: String,
    options_json: Option<String>,
) -> NapiResult<String> {
    let raw: serde_json::Value = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = engine(options_json)?
        .project(&archetype, &raw)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct NpvInput {
    cash_flows: Vec<Decimal>,
    rate: Decimal,
}

/// IRR of a JSON array of cash flows, period 0 first. `null` when no rate
/// can be solved for.
#[napi]
pub fn irr(cash_flows_json: String, solver_json: Option<String>) -> NapiResult<String> {
    let cash_flows: Vec<Decimal> = serde_json::from_str(&cash_flows_json).map_err(to_napi_error)?;
    let solver: IrrSolverConfig = match solver_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => IrrSolverConfig::default(),
    };
    let rate = time_value::irr(&cash_flows, &solver);
    serde_json::to_string(&serde_json::json!({ "irr": rate })).map_err(to_napi_error)
}

#[napi]
pub fn npv(input_json: String) -> NapiResult<String> {
    let input: NpvInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rate = input.rate;
    let value = time_value::npv(rate, &input.cash_flows).map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "rate": rate, "npv": value }))
        .map_err(to_napi_error)
}

#[napi]
pub fn amortize(input_json: String) -> NapiResult<String> {
    let input: AmortizationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = build_amortization_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn run_sensitivity(input_json: String, options_json: Option<String>) -> NapiResult<String> {
    let input: SensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::run_sensitivity(&engine(options_json)?, &input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_scenarios(input_json: String, options_json: Option<String>) -> NapiResult<String> {
    let input: ScenarioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scenarios::run_scenarios(&engine(options_json)?, &input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
