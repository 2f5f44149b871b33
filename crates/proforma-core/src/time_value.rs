use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::IrrSolverConfig;
use crate::error::ProFormaError;
use crate::types::{Money, Rate, Years};
use crate::ProFormaResult;

/// Interior points probed when Newton-Raphson fails and a bracket is needed.
const BRACKET_GRID: [Decimal; 20] = [
    dec!(-0.95),
    dec!(-0.9),
    dec!(-0.8),
    dec!(-0.6),
    dec!(-0.4),
    dec!(-0.2),
    dec!(0),
    dec!(0.05),
    dec!(0.1),
    dec!(0.15),
    dec!(0.2),
    dec!(0.3),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(1.5),
    dec!(2),
    dec!(3),
    dec!(5),
    dec!(7.5),
];

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ProFormaResult<Money> {
    if rate <= dec!(-1) {
        return Err(ProFormaError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount
                .checked_mul(one_plus_r)
                .ok_or_else(|| ProFormaError::DivisionByZero {
                    context: format!("NPV discount factor overflow at period {t}"),
                })?;
        }
        if discount.is_zero() {
            return Err(ProFormaError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result = cf
            .checked_div(discount)
            .and_then(|term| result.checked_add(term))
            .ok_or_else(|| ProFormaError::InvalidInput {
                field: "rate".into(),
                reason: format!("NPV is not representable at rate {rate} (period {t})"),
            })?;
    }

    Ok(result)
}

/// NPV and its derivative with respect to the rate, or `None` when either is
/// not representable at `rate`.
fn npv_with_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        let term = cf.checked_div(discount)?;
        value = value.checked_add(term)?;
        if t > 0 {
            let dterm = term
                .checked_div(one_plus_r)?
                .checked_mul(Decimal::from(t as u64))?;
            slope = slope.checked_sub(dterm)?;
        }
    }

    Some((value, slope))
}

fn npv_at(rate: Rate, cash_flows: &[Money]) -> Option<Decimal> {
    npv_with_derivative(rate, cash_flows).map(|(v, _)| v)
}

fn has_sign_change(cash_flows: &[Money]) -> bool {
    let any_pos = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let any_neg = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    any_pos && any_neg
}

/// Internal Rate of Return, or `None` when the series has no solvable IRR
/// inside the solver's bounds.
pub fn irr(cash_flows: &[Money], config: &IrrSolverConfig) -> Option<Rate> {
    irr_detailed(cash_flows, config).ok()
}

/// Internal Rate of Return with the reason for failure.
///
/// Newton-Raphson from `config.guess` first. If it leaves the bounds, hits a
/// flat derivative or an unrepresentable rate, the solver scans a fixed grid
/// for the lowest sign change of NPV and bisects that bracket. Both phases
/// are capped at `config.max_iterations`.
pub fn irr_detailed(cash_flows: &[Money], config: &IrrSolverConfig) -> ProFormaResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(ProFormaError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }
    if !has_sign_change(cash_flows) {
        return Err(ProFormaError::InvalidInput {
            field: "cash_flows".into(),
            reason: "IRR requires at least one positive and one negative cash flow".into(),
        });
    }

    if let Some(rate) = newton(cash_flows, config) {
        return Ok(rate);
    }
    log::debug!("IRR Newton phase failed; falling back to bracketed bisection");
    bisect(cash_flows, config)
}

fn newton(cash_flows: &[Money], config: &IrrSolverConfig) -> Option<Rate> {
    let mut rate = config.guess;

    for _ in 0..config.max_iterations {
        let (value, slope) = npv_with_derivative(rate, cash_flows)?;
        if value.abs() < config.npv_tolerance {
            return Some(rate);
        }
        if slope.is_zero() {
            return None;
        }

        let next = rate.checked_sub(value.checked_div(slope)?)?;
        if next < config.lower_bound || next > config.upper_bound {
            return None;
        }
        if (next - rate).abs() < config.rate_tolerance {
            return Some(next);
        }
        rate = next;
    }

    None
}

fn bisect(cash_flows: &[Money], config: &IrrSolverConfig) -> ProFormaResult<Rate> {
    let mut grid: Vec<Decimal> = Vec::with_capacity(BRACKET_GRID.len() + 2);
    grid.push(config.lower_bound);
    grid.extend(
        BRACKET_GRID
            .iter()
            .copied()
            .filter(|r| *r > config.lower_bound && *r < config.upper_bound),
    );
    grid.push(config.upper_bound);

    let points: Vec<(Decimal, Decimal)> = grid
        .into_iter()
        .filter_map(|r| npv_at(r, cash_flows).map(|v| (r, v)))
        .collect();

    if let Some((r, _)) = points.iter().find(|(_, v)| v.is_zero()) {
        return Ok(*r);
    }

    let bracket = points
        .windows(2)
        .find(|w| w[0].1.is_sign_negative() != w[1].1.is_sign_negative());

    let Some(pair) = bracket else {
        return Err(ProFormaError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            last_delta: points.first().map(|(_, v)| *v).unwrap_or(Decimal::ZERO),
        });
    };

    let (mut lo, mut f_lo) = pair[0];
    let mut hi = pair[1].0;
    let mut last_delta = f_lo;

    for _ in 0..config.max_iterations {
        let mid = (lo + hi) / dec!(2);
        let Some(f_mid) = npv_at(mid, cash_flows) else {
            break;
        };
        last_delta = f_mid;

        if f_mid.abs() < config.npv_tolerance || (hi - lo) / dec!(2) < config.rate_tolerance {
            return Ok(mid);
        }

        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(ProFormaError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: config.max_iterations,
        last_delta,
    })
}

/// Level annuity payment that retires `principal` over `nper` periods.
/// Returned as a positive amount.
pub fn level_payment(rate: Rate, nper: u32, principal: Money) -> ProFormaResult<Money> {
    if nper == 0 {
        return Err(ProFormaError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }
    if rate <= dec!(-1) {
        return Err(ProFormaError::InvalidInput {
            field: "rate".into(),
            reason: "Rate must be greater than -100%".into(),
        });
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    let mut factor = Decimal::ONE;
    for _ in 0..nper {
        factor = factor
            .checked_mul(Decimal::ONE + rate)
            .ok_or_else(|| ProFormaError::DivisionByZero {
                context: "annuity factor overflow".into(),
            })?;
    }

    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return Err(ProFormaError::DivisionByZero {
            context: "annuity factor".into(),
        });
    }

    // factor / (factor - 1) first: it stays near 1 while factor itself can be huge
    factor
        .checked_div(denominator)
        .and_then(|ratio| principal.checked_mul(rate)?.checked_mul(ratio))
        .ok_or_else(|| ProFormaError::InvalidInput {
            field: "principal".into(),
            reason: "Level payment is not representable".into(),
        })
}

/// Years until cumulative distributions recover `outlay`, interpolated within
/// the recovery year. `None` if the outlay is never recovered.
pub fn payback_period(outlay: Money, distributions: &[Money]) -> Option<Years> {
    if outlay <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }

    let mut cumulative = Decimal::ZERO;
    for (i, dist) in distributions.iter().enumerate() {
        let prev = cumulative;
        cumulative = cumulative.checked_add(*dist)?;
        if cumulative >= outlay {
            let fraction = if *dist > Decimal::ZERO {
                (outlay - prev) / dist
            } else {
                Decimal::ZERO
            };
            return Some(Decimal::from(i as u64) + fraction);
        }
    }

    None
}

/// Total distributions divided by the initial outlay. `None` when the outlay
/// is not positive or the multiple is not representable.
pub fn equity_multiple(outlay: Money, distributions: &[Money]) -> Option<Decimal> {
    if outlay <= Decimal::ZERO {
        return None;
    }
    distributions
        .iter()
        .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(*d))?
        .checked_div(outlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg() -> IrrSolverConfig {
        IrrSolverConfig::default()
    }

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(dec!(-1), &[dec!(-1), dec!(2)]).is_err());
    }

    #[test]
    fn test_npv_near_minus_one_is_an_error() {
        let cfs = vec![dec!(1_000_000); 21];
        assert!(npv(dec!(-0.99), &cfs).is_err());
    }

    #[test]
    fn test_irr_single_period() {
        let rate = irr(&[dec!(-100), dec!(110)], &cfg()).unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_irr_even_annuity() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let rate = irr(&cfs, &cfg()).unwrap();
        // ~9.70%
        assert!((rate - dec!(0.0970)).abs() < dec!(0.0001), "got {rate}");
        assert!(npv(rate, &cfs).unwrap().abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_negative_rate() {
        // Lose half the money over one year
        let rate = irr(&[dec!(-100), dec!(50)], &cfg()).unwrap();
        assert!((rate - dec!(-0.5)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_irr_all_positive_is_none() {
        assert_eq!(irr(&[dec!(100), dec!(10), dec!(10)], &cfg()), None);
    }

    #[test]
    fn test_irr_all_negative_is_none() {
        assert_eq!(irr(&[dec!(-100), dec!(-10), dec!(-10)], &cfg()), None);
    }

    #[test]
    fn test_irr_too_short() {
        assert!(matches!(
            irr_detailed(&[dec!(-100)], &cfg()),
            Err(ProFormaError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_irr_falls_back_to_bisection() {
        // A guess far outside the basin forces the Newton phase out of bounds
        let config = IrrSolverConfig {
            guess: dec!(9.9),
            ..cfg()
        };
        let cfs = vec![dec!(-1000), dec!(100), dec!(100), dec!(1100)];
        let rate = irr(&cfs, &config).unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.000001), "got {rate}");
    }

    #[test]
    fn test_irr_high_return() {
        let rate = irr(&[dec!(-100), dec!(0), dec!(0), dec!(300)], &cfg()).unwrap();
        // 3^(1/3) - 1 ≈ 0.44225
        assert!((rate - dec!(0.44225)).abs() < dec!(0.0001), "got {rate}");
    }

    #[test]
    fn test_irr_no_root_in_bounds() {
        // 10x in one period is a 900% IRR; cap the search below it
        let config = IrrSolverConfig {
            upper_bound: dec!(5),
            ..cfg()
        };
        assert_eq!(irr(&[dec!(-1), dec!(10)], &config), None);
    }

    #[test]
    fn test_level_payment_matches_annuity() {
        // 1000 at 5% over 10 years ≈ 129.50
        let payment = level_payment(dec!(0.05), 10, dec!(1000)).unwrap();
        assert!((payment - dec!(129.50)).abs() < dec!(0.01), "got {payment}");
    }

    #[test]
    fn test_level_payment_zero_rate() {
        assert_eq!(level_payment(Decimal::ZERO, 4, dec!(1000)).unwrap(), dec!(250));
    }

    #[test]
    fn test_level_payment_zero_periods() {
        assert!(level_payment(dec!(0.05), 0, dec!(1000)).is_err());
    }

    #[test]
    fn test_level_payment_long_tenor_at_high_rate() {
        // (1 + r)^n is 2^50 here; the payment itself is barely above interest
        let payment = level_payment(dec!(1), 50, dec!(1_000_000)).unwrap();
        assert!(payment > dec!(1_000_000) && payment < dec!(1_000_000.01), "got {payment}");
    }

    #[test]
    fn test_level_payment_overflow_is_an_error() {
        assert!(matches!(
            level_payment(dec!(1), 1, Decimal::MAX),
            Err(ProFormaError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_payback_interpolates() {
        let payback = payback_period(dec!(100), &[dec!(40), dec!(40), dec!(40)]).unwrap();
        assert_eq!(payback, dec!(2.5));
    }

    #[test]
    fn test_payback_never_recovered() {
        assert_eq!(payback_period(dec!(100), &[dec!(10), dec!(10)]), None);
    }

    #[test]
    fn test_equity_multiple() {
        assert_eq!(
            equity_multiple(dec!(100), &[dec!(50), dec!(50), dec!(200)]),
            Some(dec!(3))
        );
        assert_eq!(equity_multiple(Decimal::ZERO, &[dec!(1)]), None);
    }

    #[test]
    fn test_equity_multiple_not_representable() {
        assert_eq!(equity_multiple(dec!(0.0001), &[Decimal::MAX]), None);
        assert_eq!(equity_multiple(dec!(1), &[Decimal::MAX, Decimal::MAX]), None);
    }
}
