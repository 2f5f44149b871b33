use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{insert, CashFlowBuild, CashFlowModel};
use crate::config::ProjectionOptions;
use crate::debt_schedule::LevelPaymentLoan;
use crate::error::ValidationErrors;
use crate::schema::{as_object, AssumptionReader, FieldKind, FieldSpec};
use crate::time_series::SeriesSpec;
use crate::types::{CashFlowSeries, Money, ProjectionPeriod, Rate};
use crate::ProFormaResult;

const HOURS_PER_YEAR: Decimal = dec!(8760);
const KW_PER_MW: Decimal = dec!(1000);
const DSCR_WARNING_THRESHOLD: Decimal = dec!(1.2);
/// 1 TW; keeps energy times escalated price inside `Decimal` range
pub const MAX_CAPACITY_MW: Decimal = dec!(1_000_000);
/// $/MWh
pub const MAX_ENERGY_PRICE: Decimal = dec!(1_000_000);
/// Same ceiling as the operating horizon
const MAX_TENOR_YEARS: u32 = 50;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const CAPACITY: FieldKind = FieldKind::Range { min: dec!(0), max: MAX_CAPACITY_MW };
const PRICE: FieldKind = FieldKind::Range { min: dec!(0), max: MAX_ENERGY_PRICE };

const AC_MW: FieldSpec = FieldSpec::required("ac_mw", CAPACITY, "Inverter (AC) nameplate capacity, MW");
const DC_MW: FieldSpec = FieldSpec::required("dc_mw", CAPACITY, "Module (DC) nameplate capacity, MW");
const CAPACITY_FACTOR: FieldSpec = FieldSpec::required("capacity_factor", FieldKind::Fraction, "Year-1 net AC capacity factor");
const DEGRADATION: FieldSpec = FieldSpec::required("degradation", FieldKind::Fraction, "Annual production degradation");
const FIXED_OM: FieldSpec = FieldSpec::required("fixed_om_per_kw", FieldKind::NonNegative, "Fixed O&M, $/kW-AC/year");
const INSURANCE: FieldSpec = FieldSpec::required("insurance_per_kw", FieldKind::NonNegative, "Insurance, $/kW-AC/year");
const PPA_PRICE: FieldSpec = FieldSpec::required("ppa_price", PRICE, "Year-1 PPA price, $/MWh");
const PPA_ESCALATOR: FieldSpec = FieldSpec::required(
    "ppa_escalator",
    FieldKind::Range { min: dec!(0), max: dec!(0.5) },
    "Annual PPA price escalator",
);
const MERCHANT_PCT: FieldSpec = FieldSpec::required("merchant_percentage", FieldKind::Fraction, "Share of energy sold merchant");
const MERCHANT_PRICE: FieldSpec = FieldSpec::required("merchant_price", PRICE, "Flat merchant price, $/MWh");
const DEBT_FRACTION: FieldSpec = FieldSpec::required("debt_fraction", FieldKind::Fraction, "Debt share of net capex");
const DEBT_RATE: FieldSpec = FieldSpec::required("debt_interest_rate", FieldKind::Fraction, "Annual interest rate on term debt");
const DEBT_TENOR: FieldSpec = FieldSpec::required(
    "debt_tenor_years",
    FieldKind::Years { min: 0, max: MAX_TENOR_YEARS },
    "Amortization tenor, years",
);
const EQUITY_TARGET: FieldSpec = FieldSpec::required("equity_return_target", FieldKind::Fraction, "Equity hurdle rate used for NPV");
const TAX_RATE: FieldSpec = FieldSpec::required("tax_rate", FieldKind::Fraction, "Combined income tax rate");
const ITC: FieldSpec = FieldSpec::required("itc_percent", FieldKind::Fraction, "Investment tax credit share of capex");
const MODULE_COST: FieldSpec = FieldSpec::required("module_cost_per_kw", FieldKind::NonNegative, "Module cost, $/kW-DC");
const INVERTER_COST: FieldSpec = FieldSpec::required("inverter_cost_per_kw", FieldKind::NonNegative, "Inverter cost, $/kW-DC");
const BOS_COST: FieldSpec = FieldSpec::required("bos_cost_per_kw", FieldKind::NonNegative, "Balance of system cost, $/kW-DC");
const INTERCONNECT: FieldSpec = FieldSpec::required("interconnect_cost", FieldKind::NonNegative, "Interconnection cost, $");
const LAND: FieldSpec = FieldSpec::required("land_cost", FieldKind::NonNegative, "Land cost, $");
const DEVELOPMENT: FieldSpec = FieldSpec::required("development_cost", FieldKind::NonNegative, "Development cost, $");
const CONTINGENCY: FieldSpec = FieldSpec::required("contingency_percent", FieldKind::Fraction, "Contingency applied to total capex");
const DEPRECIATION_YEARS: FieldSpec = FieldSpec::optional(
    "depreciation_years",
    FieldKind::Years { min: 1, max: 50 },
    dec!(5),
    "Straight-line depreciation life for net capex",
);
const YEARS: FieldSpec = FieldSpec::optional(
    "years",
    FieldKind::Years { min: 1, max: 50 },
    dec!(30),
    "Operating life modeled",
);

static FIELDS: [FieldSpec; 25] = [
    AC_MW,
    DC_MW,
    CAPACITY_FACTOR,
    DEGRADATION,
    FIXED_OM,
    INSURANCE,
    PPA_PRICE,
    PPA_ESCALATOR,
    MERCHANT_PCT,
    MERCHANT_PRICE,
    DEBT_FRACTION,
    DEBT_RATE,
    DEBT_TENOR,
    EQUITY_TARGET,
    TAX_RATE,
    ITC,
    MODULE_COST,
    INVERTER_COST,
    BOS_COST,
    INTERCONNECT,
    LAND,
    DEVELOPMENT,
    CONTINGENCY,
    DEPRECIATION_YEARS,
    YEARS,
];

// ---------------------------------------------------------------------------
// Assumptions
// ---------------------------------------------------------------------------

/// Validated assumptions for a utility-scale solar project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarAssumptions {
    pub ac_mw: Decimal,
    pub dc_mw: Decimal,
    pub capacity_factor: Rate,
    pub degradation: Rate,
    pub fixed_om_per_kw: Money,
    pub insurance_per_kw: Money,
    pub ppa_price: Money,
    pub ppa_escalator: Rate,
    pub merchant_percentage: Rate,
    pub merchant_price: Money,
    pub debt_fraction: Rate,
    pub debt_interest_rate: Rate,
    pub debt_tenor_years: u32,
    pub equity_return_target: Rate,
    pub tax_rate: Rate,
    pub itc_percent: Rate,
    pub module_cost_per_kw: Money,
    pub inverter_cost_per_kw: Money,
    pub bos_cost_per_kw: Money,
    pub interconnect_cost: Money,
    pub land_cost: Money,
    pub development_cost: Money,
    pub contingency_percent: Rate,
    pub depreciation_years: u32,
    pub years: u32,
}

impl SolarAssumptions {
    pub fn ac_kw(&self) -> Decimal {
        self.ac_mw * KW_PER_MW
    }

    pub fn dc_kw(&self) -> Decimal {
        self.dc_mw * KW_PER_MW
    }

    /// Equipment, interconnection, land and development, grossed up by
    /// contingency.
    pub fn gross_capex(&self) -> Money {
        let per_kw = self.module_cost_per_kw + self.inverter_cost_per_kw + self.bos_cost_per_kw;
        let base = self.dc_kw() * per_kw
            + self.interconnect_cost
            + self.land_cost
            + self.development_cost;
        base * (Decimal::ONE + self.contingency_percent)
    }

    pub fn itc_value(&self) -> Money {
        self.gross_capex() * self.itc_percent
    }

    pub fn net_capex(&self) -> Money {
        self.gross_capex() - self.itc_value()
    }

    pub fn debt_amount(&self) -> Money {
        self.net_capex() * self.debt_fraction
    }

    pub fn equity_amount(&self) -> Money {
        self.net_capex() - self.debt_amount()
    }

    /// Flat annual O&M plus insurance.
    pub fn annual_om(&self) -> Money {
        self.ac_kw() * (self.fixed_om_per_kw + self.insurance_per_kw)
    }

    /// Annual energy in MWh, degrading from year 0.
    pub fn energy_curve(&self) -> SeriesSpec {
        let year_one = self.ac_kw() * self.capacity_factor * HOURS_PER_YEAR / KW_PER_MW;
        SeriesSpec::decaying(year_one, self.degradation)
    }

    pub fn ppa_price_curve(&self) -> SeriesSpec {
        SeriesSpec::escalating(self.ppa_price, self.ppa_escalator)
    }

    pub fn loan(&self) -> LevelPaymentLoan {
        LevelPaymentLoan::new(self.debt_amount(), self.debt_interest_rate, self.debt_tenor_years)
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

pub struct Solar;

impl CashFlowModel for Solar {
    type Assumptions = SolarAssumptions;

    const ID: &'static str = "solar";
    const NAME: &'static str = "Utility-Scale Solar";
    const DESCRIPTION: &'static str = "Degrading PV production sold under an escalating PPA with a merchant tail, \
         ITC-reduced capex, level-payment term debt and 5-year straight-line depreciation";
    const METHODOLOGY: &'static str = "Utility-Scale Solar Levered Cash Flow Model";

    fn fields() -> &'static [FieldSpec] {
        &FIELDS
    }

    fn example_inputs() -> Value {
        json!({
            "ac_mw": 100,
            "dc_mw": 130,
            "capacity_factor": 0.25,
            "degradation": 0.005,
            "fixed_om_per_kw": 23.0,
            "insurance_per_kw": 2.0,
            "ppa_price": 30.0,
            "ppa_escalator": 0.02,
            "merchant_percentage": 0.1,
            "merchant_price": 40.0,
            "debt_fraction": 0.6,
            "debt_interest_rate": 0.05,
            "debt_tenor_years": 18,
            "equity_return_target": 0.12,
            "tax_rate": 0.26,
            "itc_percent": 0.30,
            "module_cost_per_kw": 350.0,
            "inverter_cost_per_kw": 60.0,
            "bos_cost_per_kw": 200.0,
            "interconnect_cost": 5_000_000,
            "land_cost": 1_500_000,
            "development_cost": 3_000_000,
            "contingency_percent": 0.08
        })
    }

    fn validate(raw: &Value) -> Result<SolarAssumptions, ValidationErrors> {
        let payload = as_object(Self::ID, raw)?;
        let mut r = AssumptionReader::new(payload);

        let assumptions = SolarAssumptions {
            ac_mw: r.decimal(&AC_MW),
            dc_mw: r.decimal(&DC_MW),
            capacity_factor: r.decimal(&CAPACITY_FACTOR),
            degradation: r.decimal(&DEGRADATION),
            fixed_om_per_kw: r.decimal(&FIXED_OM),
            insurance_per_kw: r.decimal(&INSURANCE),
            ppa_price: r.decimal(&PPA_PRICE),
            ppa_escalator: r.decimal(&PPA_ESCALATOR),
            merchant_percentage: r.decimal(&MERCHANT_PCT),
            merchant_price: r.decimal(&MERCHANT_PRICE),
            debt_fraction: r.decimal(&DEBT_FRACTION),
            debt_interest_rate: r.decimal(&DEBT_RATE),
            debt_tenor_years: r.count(&DEBT_TENOR),
            equity_return_target: r.decimal(&EQUITY_TARGET),
            tax_rate: r.decimal(&TAX_RATE),
            itc_percent: r.decimal(&ITC),
            module_cost_per_kw: r.decimal(&MODULE_COST),
            inverter_cost_per_kw: r.decimal(&INVERTER_COST),
            bos_cost_per_kw: r.decimal(&BOS_COST),
            interconnect_cost: r.decimal(&INTERCONNECT),
            land_cost: r.decimal(&LAND),
            development_cost: r.decimal(&DEVELOPMENT),
            contingency_percent: r.decimal(&CONTINGENCY),
            depreciation_years: r.count(&DEPRECIATION_YEARS),
            years: r.count(&YEARS),
        };
        r.reject_unknown(&FIELDS);

        if r.is_valid(DEBT_FRACTION.name) && r.is_valid(DEBT_TENOR.name) {
            r.check(
                assumptions.debt_fraction.is_zero() || assumptions.debt_tenor_years > 0,
                DEBT_TENOR.name,
                "must be at least 1 when debt_fraction is positive",
            );
        }

        r.finish(Self::ID, assumptions)
    }

    fn build(a: &SolarAssumptions, options: &ProjectionOptions) -> ProFormaResult<CashFlowBuild> {
        let mut warnings: Vec<String> = Vec::new();

        let gross_capex = a.gross_capex();
        let itc_value = a.itc_value();
        let net_capex = a.net_capex();
        let debt_amount = a.debt_amount();
        let equity_amount = a.equity_amount();

        let schedule = a.loan().schedule(a.years)?;
        if debt_amount > Decimal::ZERO && a.years < a.debt_tenor_years {
            warnings.push(format!(
                "Debt tenor of {} years exceeds the {}-year horizon; balance of {} is still outstanding",
                a.debt_tenor_years,
                a.years,
                schedule
                    .periods
                    .last()
                    .map(|p| p.closing_balance)
                    .unwrap_or(Decimal::ZERO)
                    .round_dp(2)
            ));
        }

        let energy = a.energy_curve();
        let ppa_price = a.ppa_price_curve();
        let annual_om = a.annual_om();
        let annual_depreciation = net_capex / Decimal::from(a.depreciation_years);
        let merchant_share = a.merchant_percentage;
        let contracted_share = Decimal::ONE - merchant_share;

        let mut periods = Vec::with_capacity(a.years as usize);
        let mut flows = Vec::with_capacity(a.years as usize);
        let mut total_energy = Decimal::ZERO;
        let mut total_ppa = Decimal::ZERO;
        let mut total_merchant = Decimal::ZERO;
        let mut total_tax = Decimal::ZERO;
        let mut dscrs: Vec<Decimal> = Vec::new();

        for t in 0..a.years {
            let energy_mwh = energy.value_at(t);
            let price = ppa_price.value_at(t);
            let ppa_revenue = energy_mwh * contracted_share * price;
            let merchant_revenue = energy_mwh * merchant_share * a.merchant_price;
            let revenue = ppa_revenue + merchant_revenue;
            let ebitda = revenue - annual_om;

            let depreciation = if t < a.depreciation_years {
                annual_depreciation
            } else {
                Decimal::ZERO
            };

            let debt = schedule.period(t as usize);
            let (taxable_income, debt_paid_from_cash) = if options.strict_tax_model {
                (ebitda - depreciation - debt.interest, debt.debt_service)
            } else {
                // Principal (debt service less interest) is deducted and
                // interest is neither deducted nor paid from equity cash.
                (ebitda - depreciation - debt.principal, debt.principal)
            };
            let tax = taxable_income.max(Decimal::ZERO) * a.tax_rate;
            let net_cash_flow = ebitda - tax - debt_paid_from_cash;

            if debt.debt_service > Decimal::ZERO {
                match (ebitda - tax).checked_div(debt.debt_service) {
                    Some(dscr) => dscrs.push(dscr),
                    None => log::debug!("year {}: DSCR not representable", t + 1),
                }
            }
            if ebitda < Decimal::ZERO {
                warnings.push(format!(
                    "Year {}: negative EBITDA of {}",
                    t + 1,
                    ebitda.round_dp(2)
                ));
            }

            total_energy += energy_mwh;
            total_ppa += ppa_revenue;
            total_merchant += merchant_revenue;
            total_tax += tax;
            flows.push(net_cash_flow);

            let mut detail = BTreeMap::new();
            detail.insert("energy_mwh".to_string(), energy_mwh);
            detail.insert("ppa_price".to_string(), price);
            detail.insert("ppa_revenue".to_string(), ppa_revenue);
            detail.insert("merchant_revenue".to_string(), merchant_revenue);
            detail.insert("debt_service".to_string(), debt.debt_service);
            detail.insert("closing_debt_balance".to_string(), debt.closing_balance);

            periods.push(ProjectionPeriod {
                period: t + 1,
                revenue,
                operating_cost: annual_om,
                ebitda,
                depreciation,
                interest: debt.interest,
                principal: debt.principal,
                tax,
                net_cash_flow,
                detail,
            });
        }

        let mut breakdown = BTreeMap::new();
        insert(&mut breakdown, "gross_capex", gross_capex);
        insert(&mut breakdown, "itc_value", itc_value);
        insert(&mut breakdown, "net_capex", net_capex);
        insert(&mut breakdown, "annual_om", annual_om);
        insert(&mut breakdown, "total_energy_mwh", total_energy);
        insert(&mut breakdown, "ppa_revenue", total_ppa);
        insert(&mut breakdown, "merchant_revenue", total_merchant);
        insert(&mut breakdown, "annual_debt_service", schedule.annual_payment);
        insert(&mut breakdown, "total_interest", schedule.total_interest);
        insert(&mut breakdown, "total_tax", total_tax);

        if let Some(min_dscr) = dscrs.iter().copied().min() {
            insert(&mut breakdown, "min_dscr", min_dscr);
            let avg_dscr = dscrs
                .iter()
                .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(*d))
                .map(|total| total / Decimal::from(dscrs.len() as u64));
            if let Some(avg_dscr) = avg_dscr {
                insert(&mut breakdown, "avg_dscr", avg_dscr);
            }
            if min_dscr < DSCR_WARNING_THRESHOLD {
                warnings.push(format!(
                    "Minimum DSCR of {} is below {DSCR_WARNING_THRESHOLD}x: lender covenant risk",
                    min_dscr.round_dp(2)
                ));
            }
        }

        Ok(CashFlowBuild {
            periods,
            cash_flows: Some(CashFlowSeries::from_outlay(equity_amount, flows)),
            capex: net_capex,
            debt_amount,
            equity_amount,
            hurdle_rate: Some(a.equity_return_target),
            breakdown,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn example() -> SolarAssumptions {
        Solar::validate(&Solar::example_inputs()).unwrap()
    }

    #[test]
    fn test_example_validates_with_defaults() {
        let a = example();
        assert_eq!(a.years, 30);
        assert_eq!(a.depreciation_years, 5);
        assert_eq!(a.ac_kw(), dec!(100_000));
    }

    #[test]
    fn test_year_zero_energy() {
        assert_eq!(example().energy_curve().value_at(0), dec!(219_000));
    }

    #[test]
    fn test_capex_stack() {
        let a = example();
        // 130,000 kW * 610 $/kW + 9.5M = 88.8M, * 1.08 = 95.904M
        assert_eq!(a.gross_capex(), dec!(95_904_000));
        assert_eq!(a.itc_value(), dec!(28_771_200));
        assert_eq!(a.net_capex(), dec!(67_132_800));
        assert_eq!(a.debt_amount() + a.equity_amount(), a.net_capex());
    }

    #[test]
    fn test_annual_om_per_kw() {
        // 100,000 kW * (23 + 2)
        assert_eq!(example().annual_om(), dec!(2_500_000));
    }

    #[test]
    fn test_build_shapes() {
        let a = example();
        let build = Solar::build(&a, &ProjectionOptions::default()).unwrap();
        assert_eq!(build.periods.len(), 30);
        let flows = build.cash_flows.unwrap();
        assert_eq!(flows.len(), 31);
        assert_eq!(flows.initial(), Some(-a.equity_amount()));
        assert_eq!(build.hurdle_rate, Some(dec!(0.12)));
    }

    #[test]
    fn test_depreciation_first_five_years_only() {
        let a = example();
        let build = Solar::build(&a, &ProjectionOptions::default()).unwrap();
        let dep = a.net_capex() / dec!(5);
        for p in &build.periods[..5] {
            assert_eq!(p.depreciation, dep);
        }
        for p in &build.periods[5..] {
            assert_eq!(p.depreciation, Decimal::ZERO);
        }
    }

    #[test]
    fn test_debt_stops_after_tenor() {
        let build = Solar::build(&example(), &ProjectionOptions::default()).unwrap();
        let retired = &build.periods[17];
        assert_eq!(retired.detail["closing_debt_balance"], Decimal::ZERO);
        for p in &build.periods[18..] {
            assert_eq!(p.interest, Decimal::ZERO);
            assert_eq!(p.principal, Decimal::ZERO);
        }
    }

    #[test]
    fn test_parity_tax_formula() {
        let a = example();
        let build = Solar::build(&a, &ProjectionOptions::default()).unwrap();
        let p = &build.periods[0];
        let expected_tax =
            (p.ebitda - p.depreciation - p.principal).max(Decimal::ZERO) * a.tax_rate;
        assert_eq!(p.tax, expected_tax);
        assert_eq!(p.net_cash_flow, p.ebitda - p.tax - p.principal);
    }

    #[test]
    fn test_strict_tax_formula() {
        let a = example();
        let options = ProjectionOptions {
            strict_tax_model: true,
            ..ProjectionOptions::default()
        };
        let build = Solar::build(&a, &options).unwrap();
        let p = &build.periods[6];
        let expected_tax =
            (p.ebitda - p.depreciation - p.interest).max(Decimal::ZERO) * a.tax_rate;
        assert_eq!(p.tax, expected_tax);
        assert_eq!(p.net_cash_flow, p.ebitda - p.tax - p.interest - p.principal);
    }

    #[test]
    fn test_all_equity_project_has_no_debt_rows() {
        let mut raw = Solar::example_inputs();
        raw["debt_fraction"] = json!(0);
        raw["debt_tenor_years"] = json!(0);
        let a = Solar::validate(&raw).unwrap();
        let build = Solar::build(&a, &ProjectionOptions::default()).unwrap();
        assert_eq!(build.debt_amount, Decimal::ZERO);
        assert_eq!(build.equity_amount, a.net_capex());
        assert!(build.periods.iter().all(|p| p.interest.is_zero() && p.principal.is_zero()));
        assert!(!build.breakdown.contains_key("min_dscr"));
    }

    #[test]
    fn test_rejects_merchant_percentage_out_of_range() {
        let mut raw = Solar::example_inputs();
        raw["merchant_percentage"] = json!(1.2);
        let err = Solar::validate(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["merchant_percentage"]);
    }

    #[test]
    fn test_rejects_debt_without_tenor() {
        let mut raw = Solar::example_inputs();
        raw["debt_tenor_years"] = json!(0);
        let err = Solar::validate(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["debt_tenor_years"]);
    }

    #[test]
    fn test_short_horizon_warns_about_outstanding_debt() {
        let mut raw = Solar::example_inputs();
        raw["years"] = json!(10);
        let a = Solar::validate(&raw).unwrap();
        let build = Solar::build(&a, &ProjectionOptions::default()).unwrap();
        assert!(build.warnings.iter().any(|w| w.contains("still outstanding")));
    }
}
