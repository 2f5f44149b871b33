use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{apply_overrides, evaluate, OutputMetric};
use crate::engine::Engine;
use crate::error::ProFormaError;
use crate::types::*;
use crate::ProFormaResult;

const PROBABILITY_TOLERANCE: Decimal = dec!(0.001);

/// A named set of assumption overrides with its probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub probability: Rate,
    /// Merged over the base inputs; dotted keys address nested fields
    pub overrides: serde_json::Value,
}

/// Input for scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub archetype: String,
    pub base_inputs: serde_json::Value,
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub output_metric: OutputMetric,
}

/// Result for a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub probability: Rate,
    pub output_value: Option<Decimal>,
    pub deviation_from_base: Option<Decimal>,
    pub deviation_pct: Option<Rate>,
}

/// Output of scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub output_metric: OutputMetric,
    pub base_case_value: Option<Decimal>,
    pub results: Vec<ScenarioResult>,
    /// Weighted over scenarios with a defined metric, probabilities
    /// rescaled to those scenarios
    pub probability_weighted_value: Option<Decimal>,
    /// Probability mass behind `probability_weighted_value`
    pub covered_probability: Rate,
}

fn validate_probabilities(scenarios: &[Scenario], warnings: &mut Vec<String>) -> ProFormaResult<()> {
    if scenarios.is_empty() {
        return Err(ProFormaError::InsufficientData(
            "At least one scenario required".into(),
        ));
    }

    for s in scenarios {
        if s.probability < Decimal::ZERO || s.probability > Decimal::ONE {
            return Err(ProFormaError::InvalidInput {
                field: format!("scenario:{} probability", s.name),
                reason: "Probability must be between 0 and 1".into(),
            });
        }
    }

    let total: Decimal = scenarios.iter().map(|s| s.probability).sum();
    let gap = (total - Decimal::ONE).abs();
    if gap > PROBABILITY_TOLERANCE {
        return Err(ProFormaError::InvalidInput {
            field: "probabilities".into(),
            reason: format!("Probabilities must sum to 1.0 (got {total})"),
        });
    }
    if !gap.is_zero() {
        warnings.push(format!(
            "Probabilities sum to {total}; treated as approximately 1.0"
        ));
    }
    Ok(())
}

/// Project the base case and every scenario, comparing the chosen metric.
pub fn run_scenarios(
    engine: &Engine,
    input: &ScenarioInput,
) -> ProFormaResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_probabilities(&input.scenarios, &mut warnings)?;

    let metric = input.output_metric;
    let base_case_value = evaluate(engine, &input.archetype, &input.base_inputs, metric)?;
    if base_case_value.is_none() {
        warnings.push(format!("Base case has no defined {metric}"));
    }

    let mut results = Vec::with_capacity(input.scenarios.len());
    let mut weighted = Decimal::ZERO;
    let mut covered = Decimal::ZERO;

    for scenario in &input.scenarios {
        let mut inputs = input.base_inputs.clone();
        apply_overrides(&mut inputs, &scenario.overrides)?;

        let output_value = match evaluate(engine, &input.archetype, &inputs, metric) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(format!("Scenario '{}' failed: {e}", scenario.name));
                None
            }
        };
        if output_value.is_none() {
            warnings.push(format!(
                "Scenario '{}' has no defined {metric}; excluded from the weighted value",
                scenario.name
            ));
        }

        let deviation_from_base = output_value.zip(base_case_value).map(|(v, b)| v - b);
        let deviation_pct = match (deviation_from_base, base_case_value) {
            (Some(d), Some(b)) if !b.is_zero() => Some(d / b),
            (Some(d), Some(_)) if d.is_zero() => Some(Decimal::ZERO),
            _ => None,
        };

        if let Some(v) = output_value {
            weighted += scenario.probability * v;
            covered += scenario.probability;
        }

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            probability: scenario.probability,
            output_value,
            deviation_from_base,
            deviation_pct,
        });
    }

    let probability_weighted_value = if covered.is_zero() {
        None
    } else {
        Some(weighted / covered)
    };

    let output = ScenarioOutput {
        output_metric: metric,
        base_case_value,
        results,
        probability_weighted_value,
        covered_probability: covered,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Probability-Weighted Scenario Analysis",
        &serde_json::json!({
            "archetype": input.archetype,
            "num_scenarios": input.scenarios.len(),
            "output_metric": metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    fn solar_input(scenarios: Vec<Scenario>) -> ScenarioInput {
        ScenarioInput {
            archetype: "solar".into(),
            base_inputs: Registry::builtin().describe("solar").unwrap().example_inputs,
            scenarios,
            output_metric: OutputMetric::Npv,
        }
    }

    fn scenario(name: &str, probability: Decimal, overrides: serde_json::Value) -> Scenario {
        Scenario {
            name: name.into(),
            probability,
            overrides,
        }
    }

    #[test]
    fn test_bear_base_bull() {
        let input = solar_input(vec![
            scenario("Bear", dec!(0.25), json!({"ppa_price": 25})),
            scenario("Base", dec!(0.50), json!({})),
            scenario("Bull", dec!(0.25), json!({"ppa_price": 35})),
        ]);
        let out = run_scenarios(&Engine::default(), &input).unwrap().result;

        assert_eq!(out.results.len(), 3);
        assert_eq!(out.results[1].deviation_from_base, Some(Decimal::ZERO));
        let bear = out.results[0].output_value.unwrap();
        let base = out.base_case_value.unwrap();
        let bull = out.results[2].output_value.unwrap();
        assert!(bear < base && base < bull);
        assert_eq!(out.covered_probability, Decimal::ONE);
        let expected = dec!(0.25) * bear + dec!(0.5) * base + dec!(0.25) * bull;
        let weighted = out.probability_weighted_value.unwrap();
        assert!((weighted - expected).abs() < dec!(0.000001));
    }

    #[test]
    fn test_probabilities_must_sum_to_one() {
        let input = solar_input(vec![
            scenario("A", dec!(0.30), json!({})),
            scenario("B", dec!(0.30), json!({})),
        ]);
        assert!(run_scenarios(&Engine::default(), &input).is_err());
    }

    #[test]
    fn test_negative_probability_error() {
        let input = solar_input(vec![
            scenario("Bad", dec!(-0.5), json!({})),
            scenario("Good", dec!(1.5), json!({})),
        ]);
        assert!(run_scenarios(&Engine::default(), &input).is_err());
    }

    #[test]
    fn test_empty_scenarios() {
        assert!(run_scenarios(&Engine::default(), &solar_input(vec![])).is_err());
    }

    #[test]
    fn test_invalid_scenario_is_excluded() {
        let input = solar_input(vec![
            scenario("Broken", dec!(0.4), json!({"merchant_percentage": 2})),
            scenario("Base", dec!(0.6), json!({})),
        ]);
        let out = run_scenarios(&Engine::default(), &input).unwrap();
        let result = &out.result;
        assert_eq!(result.results[0].output_value, None);
        assert_eq!(result.covered_probability, dec!(0.6));
        let weighted = result.probability_weighted_value.unwrap();
        let base = result.base_case_value.unwrap();
        assert!(
            (weighted - base).abs() < dec!(0.000001),
            "rescaled weight should reproduce the base case: {weighted} vs {base}"
        );
        assert!(out.warnings.iter().any(|w| w.contains("Broken")));
    }
}
