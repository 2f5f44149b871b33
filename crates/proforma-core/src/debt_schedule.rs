use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ProFormaError;
use crate::time_value::level_payment;
use crate::types::*;
use crate::ProFormaResult;

/// A fully-amortizing loan repaid in level annual payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPaymentLoan {
    pub principal: Money,
    pub rate: Rate,
    pub tenor_years: u32,
}

/// A single year of the debt schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPeriod {
    /// 1-based
    pub year: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    /// interest + principal
    pub debt_service: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub annual_payment: Money,
    pub periods: Vec<DebtPeriod>,
    pub total_interest: Money,
    pub total_principal: Money,
}

impl AmortizationSchedule {
    /// Row for 0-based period `index`, or a zero row past the horizon.
    pub fn period(&self, index: usize) -> DebtPeriod {
        self.periods.get(index).cloned().unwrap_or(DebtPeriod {
            year: index as u32 + 1,
            opening_balance: Decimal::ZERO,
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            debt_service: Decimal::ZERO,
            closing_balance: Decimal::ZERO,
        })
    }
}

impl LevelPaymentLoan {
    pub fn new(principal: Money, rate: Rate, tenor_years: u32) -> Self {
        Self {
            principal,
            rate,
            tenor_years,
        }
    }

    fn validate(&self) -> ProFormaResult<()> {
        if self.principal < Decimal::ZERO {
            return Err(ProFormaError::InvalidInput {
                field: "principal".into(),
                reason: "Loan principal cannot be negative".into(),
            });
        }
        if self.rate < Decimal::ZERO {
            return Err(ProFormaError::InvalidInput {
                field: "rate".into(),
                reason: "Interest rate cannot be negative".into(),
            });
        }
        if self.principal > Decimal::ZERO && self.tenor_years == 0 {
            return Err(ProFormaError::InvalidInput {
                field: "tenor_years".into(),
                reason: "Tenor must be at least 1 year when principal is outstanding".into(),
            });
        }
        Ok(())
    }

    /// Level annual debt service. Zero when nothing is borrowed.
    pub fn annual_payment(&self) -> ProFormaResult<Money> {
        self.validate()?;
        if self.principal.is_zero() {
            return Ok(Decimal::ZERO);
        }
        level_payment(self.rate, self.tenor_years, self.principal)
    }

    /// Year-by-year schedule over `horizon_years`.
    ///
    /// Interest accrues on the opening balance; principal is the level
    /// payment less interest. The last tenor year retires whatever balance is
    /// left so the loan closes at exactly zero. Years after the tenor carry
    /// no debt service.
    pub fn schedule(&self, horizon_years: u32) -> ProFormaResult<AmortizationSchedule> {
        let payment = self.annual_payment()?;

        let mut periods = Vec::with_capacity(horizon_years as usize);
        let mut balance = self.principal;
        let mut total_interest = Decimal::ZERO;
        let mut total_principal = Decimal::ZERO;

        for year in 1..=horizon_years {
            let opening = balance;
            let (interest, principal) = if year <= self.tenor_years && opening > Decimal::ZERO {
                let interest = opening * self.rate;
                let principal = if year == self.tenor_years {
                    opening
                } else {
                    (payment - interest).min(opening)
                };
                (interest, principal)
            } else {
                (Decimal::ZERO, Decimal::ZERO)
            };

            balance = opening - principal;
            total_interest = total_interest
                .checked_add(interest)
                .ok_or_else(|| ProFormaError::InvalidInput {
                    field: "principal".into(),
                    reason: "Total interest is not representable".into(),
                })?;
            total_principal += principal;

            periods.push(DebtPeriod {
                year,
                opening_balance: opening,
                interest,
                principal,
                debt_service: interest + principal,
                closing_balance: balance,
            });
        }

        Ok(AmortizationSchedule {
            annual_payment: payment,
            periods,
            total_interest,
            total_principal,
        })
    }
}

/// Input for a standalone amortization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub amount: Money,
    pub interest_rate: Rate,
    pub tenor_years: u32,
    /// Defaults to the tenor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon_years: Option<u32>,
}

/// Build a level-payment amortization schedule.
pub fn build_amortization_schedule(
    input: &AmortizationInput,
) -> ProFormaResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let horizon = input.horizon_years.unwrap_or(input.tenor_years);
    if horizon < input.tenor_years {
        warnings.push(format!(
            "Horizon of {horizon} years is shorter than the {}-year tenor; balance remains outstanding",
            input.tenor_years
        ));
    }

    let loan = LevelPaymentLoan::new(input.amount, input.interest_rate, input.tenor_years);
    let schedule = loan.schedule(horizon)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-Payment Amortization Schedule",
        input,
        warnings,
        elapsed,
        schedule,
    ))
}
