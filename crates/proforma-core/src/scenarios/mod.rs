//! What-if analysis over assumption payloads: named scenarios with
//! probabilities, and two-way sensitivity grids.

pub mod scenario;
pub mod sensitivity;

pub use scenario::{run_scenarios, Scenario, ScenarioInput, ScenarioOutput, ScenarioResult};
pub use sensitivity::{run_sensitivity, SensitivityInput, SensitivityOutput, SensitivityVariable};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::engine::Engine;
use crate::error::ProFormaError;
use crate::types::ProjectionResult;
use crate::ProFormaResult;

/// Projection output a scenario or sensitivity run reports on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMetric {
    #[default]
    Irr,
    Npv,
    EquityMultiple,
}

impl OutputMetric {
    pub fn extract(&self, result: &ProjectionResult) -> Option<Decimal> {
        match self {
            OutputMetric::Irr => result.irr,
            OutputMetric::Npv => result.npv,
            OutputMetric::EquityMultiple => result.equity_multiple,
        }
    }
}

impl fmt::Display for OutputMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputMetric::Irr => "irr",
            OutputMetric::Npv => "npv",
            OutputMetric::EquityMultiple => "equity_multiple",
        };
        f.write_str(s)
    }
}

/// Set `value` at a dotted `path` (`partners.billing_rate`), creating
/// intermediate objects as needed.
pub fn set_path(target: &mut Value, path: &str, value: Value) -> ProFormaResult<()> {
    let mut node = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(ProFormaError::InvalidInput {
                field: path.to_string(),
                reason: "empty segment in field path".into(),
            });
        }
        let Value::Object(map) = node else {
            return Err(ProFormaError::InvalidInput {
                field: path.to_string(),
                reason: format!("'{segment}' is not inside an object"),
            });
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

/// Read the number at a dotted `path`, if there is one.
pub fn get_path(source: &Value, path: &str) -> Option<Decimal> {
    let node = path
        .split('.')
        .try_fold(source, |node, segment| node.get(segment))?;
    crate::schema::parse_decimal(node)
}

/// Apply `overrides` on top of `base`. Nested objects merge key by key; keys
/// containing dots are treated as paths.
pub fn apply_overrides(base: &mut Value, overrides: &Value) -> ProFormaResult<()> {
    let Value::Object(entries) = overrides else {
        return Err(ProFormaError::InvalidInput {
            field: "overrides".into(),
            reason: format!("overrides must be an object, got {overrides}"),
        });
    };
    for (key, value) in entries {
        if key.contains('.') {
            set_path(base, key, value.clone())?;
            continue;
        }
        let nested = matches!(
            (base.get(key.as_str()), value),
            (Some(Value::Object(_)), Value::Object(_))
        );
        if !nested {
            set_path(base, key, value.clone())?;
        } else if let Some(existing) = base.get_mut(key.as_str()) {
            apply_overrides(existing, value)?;
        }
    }
    Ok(())
}

/// Project `inputs` and pull out `metric`. A projection that fails (invalid
/// case) is an error; an undefined metric is `Ok(None)`.
pub(crate) fn evaluate(
    engine: &Engine,
    archetype: &str,
    inputs: &Value,
    metric: OutputMetric,
) -> ProFormaResult<Option<Decimal>> {
    let out = engine.project(archetype, inputs)?;
    Ok(metric.extract(&out.result))
}
