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
use crate::types::{CashFlowSeries, Money, ProjectionPeriod, Rate};
use crate::ProFormaResult;

/// Standard full-time hours per staff member per year.
pub const HOURS_PER_YEAR: Decimal = dec!(2080);
const DAYS_PER_YEAR: Decimal = dec!(365);

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const HEADCOUNT: FieldSpec = FieldSpec::required("headcount", FieldKind::Count, "Number of staff at this level");
const BILLING_RATE: FieldSpec = FieldSpec::required("billing_rate", FieldKind::NonNegative, "Hourly billing rate");
const SALARY: FieldSpec = FieldSpec::required("salary", FieldKind::NonNegative, "Annual salary per head");
const UTILIZATION: FieldSpec = FieldSpec::required("utilization", FieldKind::Fraction, "Share of available hours billed");
const REALIZATION: FieldSpec = FieldSpec::required("realization", FieldKind::Fraction, "Share of billed revenue collected");
const STAFF_FIELDS: [FieldSpec; 5] = [HEADCOUNT, BILLING_RATE, SALARY, UTILIZATION, REALIZATION];

const RENT: FieldSpec = FieldSpec::required("rent", FieldKind::NonNegative, "Annual rent");
const SOFTWARE: FieldSpec = FieldSpec::required("software", FieldKind::NonNegative, "Annual software spend");
const MARKETING: FieldSpec = FieldSpec::required("marketing", FieldKind::NonNegative, "Annual marketing spend");
const TRAVEL: FieldSpec = FieldSpec::required("travel", FieldKind::NonNegative, "Annual non-billable travel");
const ADMIN: FieldSpec = FieldSpec::required("admin_salaries", FieldKind::NonNegative, "Annual administrative payroll");
const OVERHEAD_FIELDS: [FieldSpec; 5] = [RENT, SOFTWARE, MARKETING, TRAVEL, ADMIN];

const DAYS: FieldKind = FieldKind::Integer { min: 0, max: 365 };
const WIP_DAYS: FieldSpec = FieldSpec::required("wip_days", DAYS, "Days of unbilled work in progress");
const AR_DAYS: FieldSpec = FieldSpec::required("ar_days", DAYS, "Days sales outstanding");
const AP_DAYS: FieldSpec = FieldSpec::required("ap_days", DAYS, "Days payables outstanding");
const WORKING_CAPITAL_FIELDS: [FieldSpec; 3] = [WIP_DAYS, AR_DAYS, AP_DAYS];

const EQUITY_INVESTMENT: FieldSpec = FieldSpec::required("equity_investment", FieldKind::NonNegative, "Upfront owner equity");
const DEBT_AMOUNT: FieldSpec = FieldSpec::required("debt_amount", FieldKind::NonNegative, "Term loan principal");
const DEBT_RATE: FieldSpec = FieldSpec::required("debt_interest_rate", FieldKind::Fraction, "Term loan interest rate");
const DEBT_TERM: FieldSpec = FieldSpec::required(
    "debt_term",
    FieldKind::Years { min: 0, max: 50 },
    "Term loan tenor, years",
);
const FINANCING_FIELDS: [FieldSpec; 4] = [EQUITY_INVESTMENT, DEBT_AMOUNT, DEBT_RATE, DEBT_TERM];

const PARTNERS: FieldSpec = FieldSpec::group("partners", &STAFF_FIELDS, "Partner tier");
const MANAGERS: FieldSpec = FieldSpec::group("managers", &STAFF_FIELDS, "Manager tier");
const ANALYSTS: FieldSpec = FieldSpec::group("analysts", &STAFF_FIELDS, "Analyst tier");
const OVERHEAD: FieldSpec = FieldSpec::group("overhead", &OVERHEAD_FIELDS, "Annual overhead line items");
const WORKING_CAPITAL: FieldSpec = FieldSpec::group("working_capital", &WORKING_CAPITAL_FIELDS, "Working capital cycle");
const FINANCING: FieldSpec = FieldSpec::group("financing", &FINANCING_FIELDS, "Capitalization");
const RETAINER_FRACTION: FieldSpec = FieldSpec::required("retainer_fraction", FieldKind::Fraction, "Share of revenue on retainer");
const PROJECT_FRACTION: FieldSpec = FieldSpec::required("project_fraction", FieldKind::Fraction, "Share of revenue from projects");
const TAX_RATE: FieldSpec = FieldSpec::required("tax_rate", FieldKind::Fraction, "Income tax rate");
const DISCOUNT_RATE: FieldSpec = FieldSpec {
    name: "discount_rate",
    kind: FieldKind::Fraction,
    required: false,
    default: None,
    description: "NPV rate; falls back to the engine discount rate",
};
const YEARS: FieldSpec = FieldSpec::optional(
    "years",
    FieldKind::Years { min: 1, max: 50 },
    dec!(5),
    "Projection horizon",
);

static FIELDS: [FieldSpec; 11] = [
    PARTNERS,
    MANAGERS,
    ANALYSTS,
    RETAINER_FRACTION,
    PROJECT_FRACTION,
    OVERHEAD,
    WORKING_CAPITAL,
    FINANCING,
    TAX_RATE,
    DISCOUNT_RATE,
    YEARS,
];

// ---------------------------------------------------------------------------
// Assumptions
// ---------------------------------------------------------------------------

/// One staff tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffLevel {
    pub headcount: u32,
    pub billing_rate: Money,
    pub salary: Money,
    pub utilization: Rate,
    pub realization: Rate,
}

impl StaffLevel {
    fn read(r: &mut AssumptionReader<'_>) -> Self {
        Self {
            headcount: r.count(&HEADCOUNT),
            billing_rate: r.decimal(&BILLING_RATE),
            salary: r.decimal(&SALARY),
            utilization: r.decimal(&UTILIZATION),
            realization: r.decimal(&REALIZATION),
        }
    }

    pub fn billable_hours(&self) -> Decimal {
        Decimal::from(self.headcount) * HOURS_PER_YEAR * self.utilization
    }

    /// Billed hours at the billing rate, net of realization.
    pub fn collected_revenue(&self) -> Money {
        self.billable_hours() * self.billing_rate * self.realization
    }

    pub fn payroll(&self) -> Money {
        Decimal::from(self.headcount) * self.salary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overhead {
    pub rent: Money,
    pub software: Money,
    pub marketing: Money,
    pub travel: Money,
    pub admin_salaries: Money,
}

impl Overhead {
    pub fn total(&self) -> Money {
        self.rent + self.software + self.marketing + self.travel + self.admin_salaries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingCapital {
    pub wip_days: u32,
    pub ar_days: u32,
    pub ap_days: u32,
}

impl WorkingCapital {
    /// Cash tied up in unbilled work and receivables, less supplier credit.
    pub fn requirement(&self, revenue: Money, opex: Money) -> Money {
        let receivable_days = Decimal::from(self.wip_days) + Decimal::from(self.ar_days);
        revenue * receivable_days / DAYS_PER_YEAR
            - opex * Decimal::from(self.ap_days) / DAYS_PER_YEAR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financing {
    pub equity_investment: Money,
    pub debt_amount: Money,
    pub debt_interest_rate: Rate,
    pub debt_term: u32,
}

/// Validated assumptions for a professional-services firm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultingAssumptions {
    pub partners: StaffLevel,
    pub managers: StaffLevel,
    pub analysts: StaffLevel,
    pub retainer_fraction: Rate,
    pub project_fraction: Rate,
    pub overhead: Overhead,
    pub working_capital: WorkingCapital,
    pub financing: Financing,
    pub tax_rate: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
    pub years: u32,
}

impl ConsultingAssumptions {
    pub fn tiers(&self) -> [(&'static str, &StaffLevel); 3] {
        [
            ("partners", &self.partners),
            ("managers", &self.managers),
            ("analysts", &self.analysts),
        ]
    }

    pub fn annual_revenue(&self) -> Money {
        self.tiers().iter().map(|(_, s)| s.collected_revenue()).sum()
    }

    pub fn total_payroll(&self) -> Money {
        self.tiers().iter().map(|(_, s)| s.payroll()).sum()
    }

    pub fn annual_opex(&self) -> Money {
        self.total_payroll() + self.overhead.total()
    }

    pub fn loan(&self) -> LevelPaymentLoan {
        LevelPaymentLoan::new(
            self.financing.debt_amount,
            self.financing.debt_interest_rate,
            self.financing.debt_term,
        )
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

pub struct Consulting;

impl CashFlowModel for Consulting {
    type Assumptions = ConsultingAssumptions;

    const ID: &'static str = "consulting";
    const NAME: &'static str = "Consulting Firm";
    const DESCRIPTION: &'static str =
        "Three-tier professional services firm: utilization-driven billings, payroll and overhead, optional term debt";
    const METHODOLOGY: &'static str = "Professional Services Steady-State Cash Flow Model";

    fn fields() -> &'static [FieldSpec] {
        &FIELDS
    }

    fn example_inputs() -> Value {
        json!({
            "partners": {
                "headcount": 3,
                "billing_rate": 350,
                "salary": 250_000,
                "utilization": 0.6,
                "realization": 0.9
            },
            "managers": {
                "headcount": 6,
                "billing_rate": 250,
                "salary": 150_000,
                "utilization": 0.7,
                "realization": 0.9
            },
            "analysts": {
                "headcount": 12,
                "billing_rate": 150,
                "salary": 90_000,
                "utilization": 0.8,
                "realization": 0.85
            },
            "retainer_fraction": 0.6,
            "project_fraction": 0.4,
            "overhead": {
                "rent": 300_000,
                "software": 100_000,
                "marketing": 200_000,
                "travel": 150_000,
                "admin_salaries": 400_000
            },
            "working_capital": {
                "wip_days": 30,
                "ar_days": 45,
                "ap_days": 15
            },
            "financing": {
                "equity_investment": 1_000_000,
                "debt_amount": 0,
                "debt_interest_rate": 0.0,
                "debt_term": 0
            },
            "tax_rate": 0.26
        })
    }

    fn validate(raw: &Value) -> Result<ConsultingAssumptions, ValidationErrors> {
        let payload = as_object(Self::ID, raw)?;
        let mut r = AssumptionReader::new(payload);

        let partners = r.group(&PARTNERS, StaffLevel::read);
        let managers = r.group(&MANAGERS, StaffLevel::read);
        let analysts = r.group(&ANALYSTS, StaffLevel::read);
        let retainer_fraction = r.decimal(&RETAINER_FRACTION);
        let project_fraction = r.decimal(&PROJECT_FRACTION);
        let overhead = r.group(&OVERHEAD, |g| Overhead {
            rent: g.decimal(&RENT),
            software: g.decimal(&SOFTWARE),
            marketing: g.decimal(&MARKETING),
            travel: g.decimal(&TRAVEL),
            admin_salaries: g.decimal(&ADMIN),
        });
        let working_capital = r.group(&WORKING_CAPITAL, |g| WorkingCapital {
            wip_days: g.count(&WIP_DAYS),
            ar_days: g.count(&AR_DAYS),
            ap_days: g.count(&AP_DAYS),
        });
        let financing = r.group(&FINANCING, |g| {
            let financing = Financing {
                equity_investment: g.decimal(&EQUITY_INVESTMENT),
                debt_amount: g.decimal(&DEBT_AMOUNT),
                debt_interest_rate: g.decimal(&DEBT_RATE),
                debt_term: g.count(&DEBT_TERM),
            };
            if g.is_valid(DEBT_AMOUNT.name) && g.is_valid(DEBT_TERM.name) {
                g.check(
                    financing.debt_amount.is_zero() || financing.debt_term > 0,
                    DEBT_TERM.name,
                    "must be at least 1 when debt_amount is positive",
                );
            }
            financing
        });
        let tax_rate = r.decimal(&TAX_RATE);
        let discount_rate = match payload.get(DISCOUNT_RATE.name) {
            None | Some(Value::Null) => None,
            Some(_) => Some(r.decimal(&DISCOUNT_RATE)),
        };
        let years = r.count(&YEARS);
        r.reject_unknown(&FIELDS);

        if r.is_valid(RETAINER_FRACTION.name) && r.is_valid(PROJECT_FRACTION.name) {
            let sum = retainer_fraction + project_fraction;
            r.check(
                sum <= Decimal::ONE,
                PROJECT_FRACTION.name,
                format!("retainer_fraction + project_fraction must not exceed 1, got {sum}"),
            );
        }

        r.finish(
            Self::ID,
            ConsultingAssumptions {
                partners,
                managers,
                analysts,
                retainer_fraction,
                project_fraction,
                overhead,
                working_capital,
                financing,
                tax_rate,
                discount_rate,
                years,
            },
        )
    }

    fn build(
        a: &ConsultingAssumptions,
        options: &ProjectionOptions,
    ) -> ProFormaResult<CashFlowBuild> {
        let mut warnings: Vec<String> = Vec::new();

        let revenue = a.annual_revenue();
        let payroll = a.total_payroll();
        let overhead = a.overhead.total();
        let opex = payroll + overhead;
        let ebitda = revenue - opex;

        let fraction_sum = a.retainer_fraction + a.project_fraction;
        if fraction_sum < Decimal::ONE {
            warnings.push(format!(
                "Retainer and project fractions sum to {fraction_sum}; {} of revenue is unclassified",
                Decimal::ONE - fraction_sum
            ));
        }
        if ebitda < Decimal::ZERO {
            warnings.push(format!(
                "Payroll and overhead exceed revenue: EBITDA of {} per year",
                ebitda.round_dp(2)
            ));
        }

        let debt = a.loan().schedule(a.years)?;
        if a.financing.debt_amount > Decimal::ZERO && a.years < a.financing.debt_term {
            warnings.push(format!(
                "Debt term of {} years exceeds the {}-year horizon",
                a.financing.debt_term, a.years
            ));
        }

        let mut periods = Vec::with_capacity(a.years as usize);
        let mut flows = Vec::with_capacity(a.years as usize);
        let mut total_tax = Decimal::ZERO;

        for t in 0..a.years {
            let d = debt.period(t as usize);
            let taxable_income = ebitda - d.interest;
            let tax = taxable_income.max(Decimal::ZERO) * a.tax_rate;
            let net_cash_flow = ebitda - tax - d.debt_service;

            total_tax += tax;
            flows.push(net_cash_flow);

            let mut detail = BTreeMap::new();
            detail.insert("payroll".to_string(), payroll);
            detail.insert("overhead".to_string(), overhead);
            detail.insert("retainer_revenue".to_string(), revenue * a.retainer_fraction);
            detail.insert("project_revenue".to_string(), revenue * a.project_fraction);
            detail.insert("net_income".to_string(), ebitda - d.interest - tax);
            if !d.debt_service.is_zero() || !d.closing_balance.is_zero() {
                detail.insert("closing_debt_balance".to_string(), d.closing_balance);
            }

            periods.push(ProjectionPeriod {
                period: t + 1,
                revenue,
                operating_cost: opex,
                ebitda,
                depreciation: Decimal::ZERO,
                interest: d.interest,
                principal: d.principal,
                tax,
                net_cash_flow,
                detail,
            });
        }

        let mut breakdown = BTreeMap::new();
        for (name, tier) in a.tiers() {
            insert(&mut breakdown, &format!("{name}_revenue"), tier.collected_revenue());
            insert(&mut breakdown, &format!("{name}_billable_hours"), tier.billable_hours());
        }
        insert(&mut breakdown, "annual_revenue", revenue);
        insert(&mut breakdown, "retainer_revenue", revenue * a.retainer_fraction);
        insert(&mut breakdown, "project_revenue", revenue * a.project_fraction);
        insert(&mut breakdown, "total_payroll", payroll);
        insert(&mut breakdown, "total_overhead", overhead);
        insert(&mut breakdown, "annual_ebitda", ebitda);
        insert(
            &mut breakdown,
            "working_capital_requirement",
            a.working_capital.requirement(revenue, opex),
        );
        insert(&mut breakdown, "total_interest", debt.total_interest);
        insert(&mut breakdown, "total_tax", total_tax);

        Ok(CashFlowBuild {
            periods,
            cash_flows: Some(CashFlowSeries::from_outlay(a.financing.equity_investment, flows)),
            capex: a.financing.equity_investment + a.financing.debt_amount,
            debt_amount: a.financing.debt_amount,
            equity_amount: a.financing.equity_investment,
            hurdle_rate: a.discount_rate.or(options.discount_rate),
            breakdown,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn example() -> ConsultingAssumptions {
        Consulting::validate(&Consulting::example_inputs()).unwrap()
    }

    #[test]
    fn test_example_defaults() {
        let a = example();
        assert_eq!(a.years, 5);
        assert_eq!(a.discount_rate, None);
        assert_eq!(a.partners.headcount, 3);
    }

    #[test]
    fn test_tier_revenue() {
        let a = example();
        // 3 * 2080 * 0.6 * 350 * 0.9
        assert_eq!(a.partners.collected_revenue(), dec!(1_179_360));
        // 6 * 2080 * 0.7 * 250 * 0.9
        assert_eq!(a.managers.collected_revenue(), dec!(1_965_600));
        // 12 * 2080 * 0.8 * 150 * 0.85
        assert_eq!(a.analysts.collected_revenue(), dec!(2_545_920));
        assert_eq!(a.annual_revenue(), dec!(5_690_880));
    }

    #[test]
    fn test_opex() {
        let a = example();
        // 750k + 900k + 1.08M payroll
        assert_eq!(a.total_payroll(), dec!(2_730_000));
        assert_eq!(a.overhead.total(), dec!(1_150_000));
        assert_eq!(a.annual_opex(), dec!(3_880_000));
    }

    #[test]
    fn test_unlevered_periods_are_identical() {
        let a = example();
        let build = Consulting::build(&a, &ProjectionOptions::default()).unwrap();
        let flows = build.cash_flows.unwrap();
        assert_eq!(flows.len(), 6);
        assert_eq!(flows.initial(), Some(dec!(-1_000_000)));

        let ebitda = dec!(5_690_880) - dec!(3_880_000);
        let expected = ebitda - ebitda * dec!(0.26);
        assert!(flows.distributions().iter().all(|cf| *cf == expected));
    }

    #[test]
    fn test_levered_flows_pay_debt_service() {
        let mut raw = Consulting::example_inputs();
        raw["financing"]["debt_amount"] = json!(500_000);
        raw["financing"]["debt_interest_rate"] = json!(0.08);
        raw["financing"]["debt_term"] = json!(5);
        let a = Consulting::validate(&raw).unwrap();
        let build = Consulting::build(&a, &ProjectionOptions::default()).unwrap();

        assert_eq!(build.capex, dec!(1_500_000));
        let first = &build.periods[0];
        assert_eq!(first.interest, dec!(40_000));
        let expected_tax = (first.ebitda - first.interest) * a.tax_rate;
        assert_eq!(first.tax, expected_tax);
        assert_eq!(
            first.net_cash_flow,
            first.ebitda - first.tax - first.interest - first.principal
        );
        let repaid: Decimal = build.periods.iter().map(|p| p.principal).sum();
        assert!(
            (repaid - dec!(500_000)).abs() < dec!(0.000001),
            "principal repaid {repaid} should equal the loan"
        );
    }

    #[test]
    fn test_working_capital_requirement() {
        let a = example();
        let build = Consulting::build(&a, &ProjectionOptions::default()).unwrap();
        let expected =
            dec!(5_690_880) * dec!(75) / dec!(365) - dec!(3_880_000) * dec!(15) / dec!(365);
        let actual = build.breakdown["working_capital_requirement"];
        assert!(
            (actual - expected).abs() < dec!(0.000001),
            "working capital {actual} vs {expected}"
        );
    }

    #[test]
    fn test_rejects_negative_tier_values() {
        let mut raw = Consulting::example_inputs();
        raw["partners"]["headcount"] = json!(-1);
        raw["managers"]["billing_rate"] = json!(-250);
        raw["analysts"]["salary"] = json!(-90_000);
        let err = Consulting::validate(&raw).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["partners.headcount", "managers.billing_rate", "analysts.salary"]
        );
    }

    #[test]
    fn test_rejects_fractions_over_one() {
        let mut raw = Consulting::example_inputs();
        raw["retainer_fraction"] = json!(0.7);
        let err = Consulting::validate(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["project_fraction"]);
    }

    #[test]
    fn test_fractions_under_one_warn() {
        let mut raw = Consulting::example_inputs();
        raw["project_fraction"] = json!(0.2);
        let a = Consulting::validate(&raw).unwrap();
        let build = Consulting::build(&a, &ProjectionOptions::default()).unwrap();
        assert!(build.warnings.iter().any(|w| w.contains("unclassified")));
    }

    #[test]
    fn test_rejects_typo_in_overhead() {
        let mut raw = Consulting::example_inputs();
        raw["overhead"]["rnet"] = json!(1);
        let err = Consulting::validate(&raw).unwrap_err();
        assert_eq!(err.fields(), vec!["overhead.rnet"]);
    }

    #[test]
    fn test_discount_rate_override() {
        let mut raw = Consulting::example_inputs();
        raw["discount_rate"] = json!(0.15);
        let a = Consulting::validate(&raw).unwrap();
        let options = ProjectionOptions {
            discount_rate: Some(dec!(0.08)),
            ..ProjectionOptions::default()
        };
        let build = Consulting::build(&a, &options).unwrap();
        assert_eq!(build.hurdle_rate, Some(dec!(0.15)));
    }
}
