use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Instant;

use crate::config::ProjectionOptions;
use crate::registry::{ArchetypeDescriptor, Registry, ValidatedBuild};
use crate::time_value;
use crate::types::*;
use crate::ProFormaResult;

/// Runs projections against a registry with a fixed set of options.
///
/// Holds no mutable state; one engine can serve any number of callers.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Registry,
    options: ProjectionOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            registry: Registry::builtin(),
            options: ProjectionOptions::default(),
        }
    }
}

impl Engine {
    pub fn new(registry: Registry, options: ProjectionOptions) -> ProFormaResult<Self> {
        options.validate()?;
        Ok(Self { registry, options })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    pub fn list_archetypes(&self) -> Vec<ArchetypeDescriptor> {
        self.registry.descriptors()
    }

    /// Validate `raw` against archetype `id`, build its cash flows and
    /// derive IRR, NPV, equity multiple and payback.
    pub fn project(
        &self,
        id: &str,
        raw: &Value,
    ) -> ProFormaResult<ComputationOutput<ProjectionResult>> {
        let start = Instant::now();
        log::debug!("projecting archetype '{id}'");

        let descriptor = self.registry.describe(id)?;
        let ValidatedBuild { assumptions, build } = self.registry.run(id, raw, &self.options)?;
        let mut warnings = build.warnings;

        let cash_flows = build.cash_flows.unwrap_or_default();
        let mut irr = None;
        let mut npv = None;
        let mut discount_rate = None;
        let mut equity_multiple = None;
        let mut payback_period_years = None;

        if cash_flows.is_empty() {
            warnings.push(format!(
                "Archetype '{id}' is descriptive: no equity cash flows, IRR not computed"
            ));
        } else {
            let flows = cash_flows.as_slice();
            let outlay = -cash_flows.initial().unwrap_or(Decimal::ZERO);

            irr = match time_value::irr_detailed(flows, &self.options.solver) {
                Ok(rate) => Some(rate),
                Err(e) => {
                    log::debug!("IRR undefined for '{id}': {e}");
                    warnings.push(format!("IRR could not be determined: {e}"));
                    None
                }
            };

            discount_rate = build.hurdle_rate.or(self.options.discount_rate);
            if let Some(rate) = discount_rate {
                npv = match time_value::npv(rate, flows) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warnings.push(format!("NPV could not be computed: {e}"));
                        None
                    }
                };
            }

            if let (Some(r), Some(target)) = (irr, build.hurdle_rate) {
                if r < target {
                    warnings.push(format!(
                        "Equity IRR of {} is below the {} return target",
                        r.round_dp(4),
                        target
                    ));
                }
            }

            equity_multiple = time_value::equity_multiple(outlay, cash_flows.distributions());
            payback_period_years = time_value::payback_period(outlay, cash_flows.distributions());
        }

        let result = ProjectionResult {
            archetype: id.to_string(),
            periods: build.periods,
            cash_flows,
            irr,
            npv,
            discount_rate,
            equity_multiple,
            payback_period_years,
            capex: build.capex,
            debt_amount: build.debt_amount,
            equity_amount: build.equity_amount,
            breakdown: build.breakdown,
        };

        let elapsed = start.elapsed().as_micros() as u64;
        log::debug!("projected '{id}' in {elapsed}us with {} warning(s)", warnings.len());
        Ok(with_metadata(
            descriptor.methodology,
            &assumptions,
            warnings,
            elapsed,
            result,
        ))
    }
}

/// Project with the builtin archetypes and default options.
pub fn project(id: &str, raw: &Value) -> ProFormaResult<ComputationOutput<ProjectionResult>> {
    Engine::default().project(id, raw)
}

/// Describe every builtin archetype.
pub fn list_archetypes() -> Vec<ArchetypeDescriptor> {
    Registry::builtin().descriptors()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProFormaError;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_every_example_projects() {
        let engine = Engine::default();
        for d in engine.list_archetypes() {
            let out = engine.project(d.id, &d.example_inputs);
            assert!(out.is_ok(), "{} example failed: {:?}", d.id, out.err());
        }
    }

    #[test]
    fn test_saas_has_no_irr() {
        let out = project("saas", &json!({"monthly_revenue": 1000})).unwrap();
        assert!(out.result.irr.is_none());
        assert!(out.result.cash_flows.is_empty());
        assert!(out.warnings.iter().any(|w| w.contains("descriptive")));
    }

    #[test]
    fn test_rejects_invalid_options() {
        let options = ProjectionOptions {
            discount_rate: Some(dec!(-1.5)),
            ..ProjectionOptions::default()
        };
        assert!(Engine::new(Registry::builtin(), options).is_err());
    }

    #[test]
    fn test_unknown_archetype_is_configuration_error() {
        let err = project("brewery", &json!({})).unwrap_err();
        assert!(matches!(err, ProFormaError::UnknownArchetype(_)));
    }

    #[test]
    fn test_consulting_npv_uses_engine_rate() {
        let options = ProjectionOptions {
            discount_rate: Some(dec!(0.10)),
            ..ProjectionOptions::default()
        };
        let engine = Engine::new(Registry::builtin(), options).unwrap();
        let example = Registry::builtin().describe("consulting").unwrap().example_inputs;
        let out = engine.project("consulting", &example).unwrap();
        assert_eq!(out.result.discount_rate, Some(dec!(0.10)));
        assert!(out.result.npv.is_some());
    }

    #[test]
    fn test_assumptions_are_echoed() {
        let out = project("saas", &json!({"monthly_revenue": "1200"})).unwrap();
        assert_eq!(out.assumptions["gross_margin"], json!("0.75"));
        assert_eq!(out.methodology, "Monthly Revenue Growth Projection");
    }
}
