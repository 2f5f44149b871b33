use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Net cash flows to equity. Index 0 is the upfront outlay, indices 1..N the
/// projection periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CashFlowSeries(Vec<Money>);

impl CashFlowSeries {
    pub fn new(flows: Vec<Money>) -> Self {
        Self(flows)
    }

    /// Build a series from an outlay and the per-period flows that follow it.
    pub fn from_outlay(outlay: Money, periods: impl IntoIterator<Item = Money>) -> Self {
        let mut flows = vec![-outlay];
        flows.extend(periods);
        Self(flows)
    }

    pub fn as_slice(&self) -> &[Money] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The period-0 flow, if any.
    pub fn initial(&self) -> Option<Money> {
        self.0.first().copied()
    }

    /// Flows after period 0.
    pub fn distributions(&self) -> &[Money] {
        self.0.get(1..).unwrap_or(&[])
    }
}

/// One row of a projection. `period` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPeriod {
    pub period: u32,
    pub revenue: Money,
    pub operating_cost: Money,
    pub ebitda: Money,
    pub depreciation: Money,
    pub interest: Money,
    pub principal: Money,
    pub tax: Money,
    pub net_cash_flow: Money,
    /// Archetype-specific columns (energy, PPA revenue, gross profit, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, Decimal>,
}

impl ProjectionPeriod {
    /// An all-zero row for `period`, to be filled in by a builder.
    pub fn empty(period: u32) -> Self {
        Self {
            period,
            revenue: Decimal::ZERO,
            operating_cost: Decimal::ZERO,
            ebitda: Decimal::ZERO,
            depreciation: Decimal::ZERO,
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            tax: Decimal::ZERO,
            net_cash_flow: Decimal::ZERO,
            detail: BTreeMap::new(),
        }
    }
}

/// Complete output of a single projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub archetype: String,
    pub periods: Vec<ProjectionPeriod>,
    pub cash_flows: CashFlowSeries,
    /// Equity IRR; `None` when the series has no well-defined IRR
    pub irr: Option<Rate>,
    pub npv: Option<Money>,
    /// Rate the NPV was discounted at
    pub discount_rate: Option<Rate>,
    pub equity_multiple: Option<Decimal>,
    pub payback_period_years: Option<Years>,
    /// Net capex (after incentives)
    pub capex: Money,
    pub debt_amount: Money,
    pub equity_amount: Money,
    pub breakdown: BTreeMap<String, Money>,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_else(|e| {
            log::warn!("{methodology}: assumptions could not be serialized: {e}");
            serde_json::Value::Null
        }),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_outlay_negates_initial() {
        let series = CashFlowSeries::from_outlay(dec!(100), vec![dec!(60), dec!(60)]);
        assert_eq!(series.as_slice(), &[dec!(-100), dec!(60), dec!(60)]);
        assert_eq!(series.initial(), Some(dec!(-100)));
        assert_eq!(series.distributions(), &[dec!(60), dec!(60)]);
    }

    #[test]
    fn test_empty_series_has_no_distributions() {
        let series = CashFlowSeries::default();
        assert!(series.is_empty());
        assert_eq!(series.initial(), None);
        assert!(series.distributions().is_empty());
    }

    #[test]
    fn test_unserializable_assumptions_echo_null() {
        // Tuple keys cannot become JSON object keys
        let mut assumptions = BTreeMap::new();
        assumptions.insert((1u8, 2u8), dec!(3));
        let out = with_metadata("m", &assumptions, Vec::new(), 0, 7u8);
        assert_eq!(out.assumptions, serde_json::Value::Null);
        assert_eq!(out.result, 7);
    }

    #[test]
    fn test_series_serializes_as_plain_array() {
        let series = CashFlowSeries::new(vec![dec!(-1), dec!(2)]);
        let json = serde_json::to_value(&series).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 2);
    }
}
