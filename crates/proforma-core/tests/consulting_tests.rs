use proforma_core::archetypes::consulting::{Consulting, HOURS_PER_YEAR};
use proforma_core::archetypes::CashFlowModel;
use proforma_core::{project, Engine, ProFormaError, ProjectionOptions, Registry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn example() -> serde_json::Value {
    Consulting::example_inputs()
}

fn tier_revenue(headcount: u32, rate: Decimal, utilization: Decimal, realization: Decimal) -> Decimal {
    Decimal::from(headcount) * HOURS_PER_YEAR * utilization * rate * realization
}

// ===========================================================================
// Revenue and costs
// ===========================================================================

#[test]
fn test_revenue_is_sum_of_tiers() {
    let out = project("consulting", &example()).unwrap();
    let r = &out.result;

    let partners = tier_revenue(3, dec!(350), dec!(0.6), dec!(0.9));
    let managers = tier_revenue(6, dec!(250), dec!(0.7), dec!(0.9));
    let analysts = tier_revenue(12, dec!(150), dec!(0.8), dec!(0.85));

    assert_eq!(r.breakdown["partners_revenue"], partners);
    assert_eq!(r.breakdown["managers_revenue"], managers);
    assert_eq!(r.breakdown["analysts_revenue"], analysts);
    assert_eq!(r.periods[0].revenue, partners + managers + analysts);
}

#[test]
fn test_retainer_and_project_split() {
    let out = project("consulting", &example()).unwrap();
    let b = &out.result.breakdown;
    assert_eq!(b["retainer_revenue"] + b["project_revenue"], b["annual_revenue"]);
}

#[test]
fn test_opex_is_payroll_plus_overhead() {
    let out = project("consulting", &example()).unwrap();
    let first = &out.result.periods[0];
    assert_eq!(first.operating_cost, dec!(2_730_000) + dec!(1_150_000));
    assert_eq!(first.ebitda, first.revenue - first.operating_cost);
}

// ===========================================================================
// Cash flows
// ===========================================================================

#[test]
fn test_series_length_and_constant_periods() {
    let out = project("consulting", &example()).unwrap();
    let flows = &out.result.cash_flows;
    assert_eq!(flows.len(), 6);
    assert_eq!(flows.initial(), Some(dec!(-1_000_000)));

    let first = flows.distributions()[0];
    assert!(flows.distributions().iter().all(|cf| *cf == first));
    assert_eq!(first, out.result.periods[0].net_cash_flow);
}

#[test]
fn test_tax_on_positive_ebitda_only() {
    let mut raw = example();
    raw["overhead"]["rent"] = json!(5_000_000);
    let out = project("consulting", &raw).unwrap();
    let first = &out.result.periods[0];
    assert!(first.ebitda < Decimal::ZERO);
    assert_eq!(first.tax, Decimal::ZERO);
    assert!(out.warnings.iter().any(|w| w.contains("exceed revenue")));
}

#[test]
fn test_irr_for_example() {
    let out = project("consulting", &example()).unwrap();
    // Large constant inflows against a 1M outlay: IRR well above 100%
    let irr = out.result.irr.expect("example should have an IRR");
    assert!(irr > Decimal::ONE);
    assert!(out.result.npv.is_none(), "no discount rate configured");
}

#[test]
fn test_payback_and_multiple() {
    let out = project("consulting", &example()).unwrap();
    let r = &out.result;
    let annual = r.cash_flows.distributions()[0];
    let expected_multiple = annual * dec!(5) / dec!(1_000_000);
    assert_eq!(r.equity_multiple, Some(expected_multiple));
    assert!(r.payback_period_years.unwrap() < Decimal::ONE);
}

#[test]
fn test_financing_reduces_equity_cash() {
    let unlevered = project("consulting", &example()).unwrap();

    let mut raw = example();
    raw["financing"] = json!({
        "equity_investment": 1_000_000,
        "debt_amount": 600_000,
        "debt_interest_rate": 0.07,
        "debt_term": 3
    });
    let levered = project("consulting", &raw).unwrap();

    let u = &unlevered.result.periods;
    let l = &levered.result.periods;
    assert!(l[0].net_cash_flow < u[0].net_cash_flow);
    assert!(l[0].tax < u[0].tax, "interest is deductible");
    // Loan is retired after three years
    assert_eq!(l[4].net_cash_flow, u[4].net_cash_flow);
    assert_eq!(levered.result.capex, dec!(1_600_000));
    assert_eq!(levered.result.debt_amount, dec!(600_000));
}

#[test]
fn test_discount_rate_from_options() {
    let options = ProjectionOptions {
        discount_rate: Some(dec!(0.12)),
        ..ProjectionOptions::default()
    };
    let out = Engine::new(Registry::builtin(), options)
        .unwrap()
        .project("consulting", &example())
        .unwrap();
    assert_eq!(out.result.discount_rate, Some(dec!(0.12)));
    assert!(out.result.npv.unwrap() > Decimal::ZERO);
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_missing_tier_reported_once() {
    let mut raw = example();
    raw.as_object_mut().unwrap().remove("analysts");
    match project("consulting", &raw).unwrap_err() {
        ProFormaError::Validation(e) => assert_eq!(e.fields(), vec!["analysts"]),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_debt_without_term_rejected() {
    let mut raw = example();
    raw["financing"]["debt_amount"] = json!(100_000);
    match project("consulting", &raw).unwrap_err() {
        ProFormaError::Validation(e) => assert_eq!(e.fields(), vec!["financing.debt_term"]),
        other => panic!("expected validation error, got {other}"),
    }
}
