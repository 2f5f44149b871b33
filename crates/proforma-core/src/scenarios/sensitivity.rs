use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{evaluate, get_path, set_path, OutputMetric};
use crate::engine::Engine;
use crate::error::ProFormaError;
use crate::types::*;
use crate::ProFormaResult;

/// Most values one sweep axis may produce.
const MAX_AXIS_POINTS: usize = 101;

/// A field swept across `[min, max]` in `step` increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityVariable {
    /// Dotted assumption path, e.g. `partners.billing_rate`
    pub name: String,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Input for 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub archetype: String,
    /// Assumption payload every grid cell starts from
    pub base_inputs: serde_json::Value,
    pub variable_1: SensitivityVariable,
    pub variable_2: SensitivityVariable,
    #[serde(default)]
    pub output_metric: OutputMetric,
}

/// Output of 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    pub variable_2_name: String,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: OutputMetric,
    /// matrix[i][j] = metric at variable_1_values[i], variable_2_values[j];
    /// `None` where the metric is undefined or the case is invalid
    pub matrix: Vec<Vec<Option<Decimal>>>,
    /// Metric for the unmodified base inputs
    pub base_case_value: Option<Decimal>,
    /// Cell closest to the base inputs (row, col)
    pub base_case_position: (usize, usize),
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> ProFormaResult<Vec<Decimal>> {
    let field = format!("variable:{}", var.name);
    if var.step <= Decimal::ZERO {
        return Err(ProFormaError::InvalidInput {
            field,
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(ProFormaError::InvalidInput {
            field,
            reason: "Min must be <= max".into(),
        });
    }

    let too_many = || ProFormaError::InvalidInput {
        field: field.clone(),
        reason: format!("Sweep produces more than {MAX_AXIS_POINTS} values"),
    };

    let mut values = Vec::new();
    let mut current = Some(var.min);
    while let Some(value) = current.filter(|v| *v <= var.max) {
        if values.len() == MAX_AXIS_POINTS {
            return Err(too_many());
        }
        values.push(value);
        // Stepping past Decimal::MAX ends the sweep
        current = value.checked_add(var.step);
    }
    // Include max when the step does not land on it
    if values.last().is_some_and(|last| *last < var.max) {
        if values.len() == MAX_AXIS_POINTS {
            return Err(too_many());
        }
        values.push(var.max);
    }

    Ok(values)
}

fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| v.checked_sub(target).map_or(Decimal::MAX, |d| d.abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Where the base inputs sit on an axis; the midpoint when the base payload
/// carries no number at that path.
fn base_index(input: &SensitivityInput, var: &SensitivityVariable, values: &[Decimal]) -> usize {
    let anchor = get_path(&input.base_inputs, &var.name).unwrap_or(var.min / dec!(2) + var.max / dec!(2));
    closest_index(values, anchor)
}

/// Project every combination of the two variables and report the chosen
/// metric for each.
pub fn run_sensitivity(
    engine: &Engine,
    input: &SensitivityInput,
) -> ProFormaResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.variable_1.name == input.variable_2.name {
        return Err(ProFormaError::InvalidInput {
            field: "variable_2".into(),
            reason: "The two sweep variables must differ".into(),
        });
    }

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = generate_sweep_values(&input.variable_2)?;

    let base_case_value = evaluate(engine, &input.archetype, &input.base_inputs, input.output_metric)?;
    if base_case_value.is_none() {
        warnings.push(format!("Base case has no defined {}", input.output_metric));
    }

    let mut matrix = Vec::with_capacity(v1_values.len());
    for v1 in &v1_values {
        let mut row = Vec::with_capacity(v2_values.len());
        for v2 in &v2_values {
            let mut case = input.base_inputs.clone();
            set_path(&mut case, &input.variable_1.name, serde_json::json!(v1))?;
            set_path(&mut case, &input.variable_2.name, serde_json::json!(v2))?;

            match evaluate(engine, &input.archetype, &case, input.output_metric) {
                Ok(value) => row.push(value),
                Err(e) => {
                    warnings.push(format!("Evaluation failed at ({v1}, {v2}): {e}"));
                    row.push(None);
                }
            }
        }
        matrix.push(row);
    }

    let undefined = matrix.iter().flatten().filter(|v| v.is_none()).count();
    if undefined > 0 {
        log::debug!("sensitivity grid has {undefined} undefined cell(s)");
    }

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.name.clone(),
        variable_2_name: input.variable_2.name.clone(),
        base_case_position: (
            base_index(input, &input.variable_1, &v1_values),
            base_index(input, &input.variable_2, &v2_values),
        ),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        output_metric: input.output_metric,
        matrix,
        base_case_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Analysis",
        &serde_json::json!({
            "archetype": input.archetype,
            "variable_1": input.variable_1.name,
            "variable_2": input.variable_2.name,
            "output_metric": input.output_metric,
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
    use rust_decimal_macros::dec;

    fn consulting_input() -> SensitivityInput {
        SensitivityInput {
            archetype: "consulting".into(),
            base_inputs: Registry::builtin()
                .describe("consulting")
                .unwrap()
                .example_inputs,
            variable_1: SensitivityVariable {
                name: "partners.billing_rate".into(),
                min: dec!(300),
                max: dec!(400),
                step: dec!(50),
            },
            variable_2: SensitivityVariable {
                name: "tax_rate".into(),
                min: dec!(0.2),
                max: dec!(0.3),
                step: dec!(0.05),
            },
            output_metric: OutputMetric::EquityMultiple,
        }
    }

    #[test]
    fn test_sweep_values() {
        let var = SensitivityVariable {
            name: "test".into(),
            min: dec!(1),
            max: dec!(5),
            step: dec!(1),
        };
        let vals = generate_sweep_values(&var).unwrap();
        assert_eq!(vals, vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);
    }

    #[test]
    fn test_sweep_with_non_exact_step() {
        let var = SensitivityVariable {
            name: "test".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.3),
        };
        let vals = generate_sweep_values(&var).unwrap();
        // 0, 0.3, 0.6, 0.9, then max
        assert_eq!(vals.len(), 5);
        assert_eq!(*vals.last().unwrap(), dec!(1));
    }

    #[test]
    fn test_sweep_too_fine() {
        let var = SensitivityVariable {
            name: "test".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.001),
        };
        assert!(generate_sweep_values(&var).is_err());
    }

    #[test]
    fn test_sweep_cap_counts_appended_max() {
        // 0..=100 in unit steps is exactly the cap; landing short of max would add one more
        let var = SensitivityVariable {
            name: "test".into(),
            min: dec!(0),
            max: dec!(100),
            step: dec!(1),
        };
        assert_eq!(generate_sweep_values(&var).unwrap().len(), MAX_AXIS_POINTS);

        let var = SensitivityVariable {
            max: dec!(100.5),
            ..var
        };
        assert!(generate_sweep_values(&var).is_err());
    }

    #[test]
    fn test_sweep_near_decimal_max() {
        let var = SensitivityVariable {
            name: "test".into(),
            min: Decimal::MAX - dec!(1),
            max: Decimal::MAX,
            step: dec!(1),
        };
        let vals = generate_sweep_values(&var).unwrap();
        assert_eq!(vals, vec![Decimal::MAX - dec!(1), Decimal::MAX]);
    }

    #[test]
    fn test_invalid_step() {
        let mut input = consulting_input();
        input.variable_1.step = Decimal::ZERO;
        assert!(run_sensitivity(&Engine::default(), &input).is_err());
    }

    #[test]
    fn test_grid_is_monotonic() {
        let out = run_sensitivity(&Engine::default(), &consulting_input()).unwrap();
        let grid = &out.result;
        assert_eq!(grid.matrix.len(), 3);
        assert_eq!(grid.matrix[0].len(), 3);

        // Higher partner rates raise the multiple; higher tax lowers it
        let cell = |i: usize, j: usize| grid.matrix[i][j].unwrap();
        assert!(cell(0, 0) < cell(1, 0) && cell(1, 0) < cell(2, 0));
        assert!(cell(0, 0) > cell(0, 1) && cell(0, 1) > cell(0, 2));
    }

    #[test]
    fn test_base_case_position_follows_base_inputs() {
        let out = run_sensitivity(&Engine::default(), &consulting_input()).unwrap();
        // Example billing rate 350 sits in the middle; tax 0.26 is nearest 0.25
        assert_eq!(out.result.base_case_position, (1, 1));
        assert!(out.result.base_case_value.is_some());
    }

    #[test]
    fn test_invalid_cells_are_none() {
        let mut input = consulting_input();
        input.variable_2 = SensitivityVariable {
            name: "tax_rate".into(),
            min: dec!(0.5),
            max: dec!(1.5),
            step: dec!(0.5),
        };
        let out = run_sensitivity(&Engine::default(), &input).unwrap();
        assert!(out.result.matrix.iter().all(|row| row[2].is_none()));
        assert!(!out.warnings.is_empty());
    }
}
