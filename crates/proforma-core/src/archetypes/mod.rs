//! Business archetypes. Each one owns its assumption schema and its cash flow
//! builder; the engine only sees them through [`CashFlowModel`].

#[cfg(feature = "saas")]
pub mod saas;

#[cfg(feature = "solar")]
pub mod solar;

#[cfg(feature = "consulting")]
pub mod consulting;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ProjectionOptions;
use crate::error::ValidationErrors;
use crate::schema::FieldSpec;
use crate::types::{CashFlowSeries, Money, ProjectionPeriod, Rate};
use crate::ProFormaResult;

/// What an archetype builder hands back to the engine.
#[derive(Debug, Clone)]
pub struct CashFlowBuild {
    pub periods: Vec<ProjectionPeriod>,
    /// `None` for descriptive archetypes that produce no equity cash flows
    pub cash_flows: Option<CashFlowSeries>,
    pub capex: Money,
    pub debt_amount: Money,
    pub equity_amount: Money,
    /// Archetype-supplied NPV rate (e.g. an equity return target)
    pub hurdle_rate: Option<Rate>,
    pub breakdown: BTreeMap<String, Money>,
    pub warnings: Vec<String>,
}

/// A business archetype: schema, example inputs and cash flow builder.
pub trait CashFlowModel {
    /// Validated, immutable assumption set
    type Assumptions: Serialize;

    const ID: &'static str;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const METHODOLOGY: &'static str;

    fn fields() -> &'static [FieldSpec];

    /// A payload that validates and projects cleanly.
    fn example_inputs() -> Value;

    fn validate(raw: &Value) -> Result<Self::Assumptions, ValidationErrors>;

    fn build(
        assumptions: &Self::Assumptions,
        options: &ProjectionOptions,
    ) -> ProFormaResult<CashFlowBuild>;
}

/// Validate `raw` against archetype `M`, returning its typed assumption set.
pub fn validate<M: CashFlowModel>(raw: &Value) -> Result<M::Assumptions, ValidationErrors> {
    M::validate(raw)
}

pub(crate) fn insert(map: &mut BTreeMap<String, Money>, key: &str, value: Money) {
    map.insert(key.to_string(), value);
}
