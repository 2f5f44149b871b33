use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{insert, CashFlowBuild, CashFlowModel};
use crate::config::ProjectionOptions;
use crate::error::ValidationErrors;
use crate::schema::{as_object, AssumptionReader, FieldKind, FieldSpec};
use crate::time_series::SeriesSpec;
use crate::types::{Money, ProjectionPeriod, Rate};
use crate::ProFormaResult;

/// The SaaS model always projects one year of monthly periods.
pub const MONTHS: u32 = 12;

const MONTHLY_REVENUE: FieldSpec =
    FieldSpec::required("monthly_revenue", FieldKind::NonNegative, "Month-1 recurring revenue");
const GROWTH_RATE: FieldSpec = FieldSpec::optional(
    "growth_rate",
    FieldKind::Range { min: dec!(-0.99), max: dec!(10) },
    dec!(0.05),
    "Month-over-month revenue growth",
);
const CAC: FieldSpec = FieldSpec::optional("cac", FieldKind::NonNegative, dec!(100), "Customer acquisition cost per month");
const GROSS_MARGIN: FieldSpec = FieldSpec::optional("gross_margin", FieldKind::Fraction, dec!(0.75), "Gross margin");

static FIELDS: [FieldSpec; 4] = [MONTHLY_REVENUE, GROWTH_RATE, CAC, GROSS_MARGIN];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaasAssumptions {
    pub monthly_revenue: Money,
    pub growth_rate: Rate,
    pub cac: Money,
    pub gross_margin: Rate,
}

impl SaasAssumptions {
    pub fn revenue_curve(&self) -> SeriesSpec {
        SeriesSpec::growing(self.monthly_revenue, self.growth_rate)
    }
}

/// Minimal descriptive archetype: compounding revenue and gross profit, no
/// capital structure and therefore no equity cash flows.
pub struct Saas;

impl CashFlowModel for Saas {
    type Assumptions = SaasAssumptions;

    const ID: &'static str = "saas";
    const NAME: &'static str = "Generic SaaS";
    const DESCRIPTION: &'static str =
        "Twelve months of compounding recurring revenue with gross margin and a flat CAC column";
    const METHODOLOGY: &'static str = "Monthly Revenue Growth Projection";

    fn fields() -> &'static [FieldSpec] {
        &FIELDS
    }

    fn example_inputs() -> Value {
        json!({
            "monthly_revenue": 10_000,
            "growth_rate": 0.05,
            "cac": 100,
            "gross_margin": 0.75
        })
    }

    fn validate(raw: &Value) -> Result<SaasAssumptions, ValidationErrors> {
        let payload = as_object(Self::ID, raw)?;
        let mut r = AssumptionReader::new(payload);
        let assumptions = SaasAssumptions {
            monthly_revenue: r.decimal(&MONTHLY_REVENUE),
            growth_rate: r.decimal(&GROWTH_RATE),
            cac: r.decimal(&CAC),
            gross_margin: r.decimal(&GROSS_MARGIN),
        };
        r.reject_unknown(&FIELDS);
        r.finish(Self::ID, assumptions)
    }

    fn build(a: &SaasAssumptions, _options: &ProjectionOptions) -> ProFormaResult<CashFlowBuild> {
        let mut periods = Vec::with_capacity(MONTHS as usize);
        let mut total_revenue = Decimal::ZERO;
        let mut total_gross_profit = Decimal::ZERO;

        for (t, revenue) in a.revenue_curve().iter(MONTHS).enumerate() {
            let gross_profit = revenue * a.gross_margin;
            total_revenue += revenue;
            total_gross_profit += gross_profit;

            let mut row = ProjectionPeriod::empty(t as u32 + 1);
            row.revenue = revenue;
            row.operating_cost = revenue - gross_profit;
            row.ebitda = gross_profit;
            row.net_cash_flow = gross_profit;
            row.detail.insert("gross_profit".to_string(), gross_profit);
            row.detail.insert("cac".to_string(), a.cac);
            periods.push(row);
        }

        let mut breakdown = BTreeMap::new();
        insert(&mut breakdown, "total_revenue", total_revenue);
        insert(&mut breakdown, "total_gross_profit", total_gross_profit);
        insert(&mut breakdown, "total_cac", a.cac * Decimal::from(MONTHS));
        if let Some(last) = periods.last() {
            insert(&mut breakdown, "exit_arr", last.revenue * Decimal::from(MONTHS));
        }

        Ok(CashFlowBuild {
            periods,
            cash_flows: None,
            capex: Decimal::ZERO,
            debt_amount: Decimal::ZERO,
            equity_amount: Decimal::ZERO,
            hurdle_rate: None,
            breakdown,
            warnings: Vec::new(),
        })
    }
}
