use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ProFormaError;
use crate::types::Rate;
use crate::ProFormaResult;

/// Root-finding parameters for IRR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrSolverConfig {
    /// Newton-Raphson starting point
    pub guess: Rate,
    /// Lowest rate the bracket scan will consider (must be > -1)
    pub lower_bound: Rate,
    pub upper_bound: Rate,
    /// Iteration cap shared by the Newton and bisection phases
    pub max_iterations: u32,
    /// Stop when successive rate estimates differ by less than this
    pub rate_tolerance: Decimal,
    /// Stop when |NPV| falls below this
    pub npv_tolerance: Decimal,
}

impl Default for IrrSolverConfig {
    fn default() -> Self {
        Self {
            guess: dec!(0.10),
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10),
            max_iterations: 200,
            rate_tolerance: dec!(0.0000000001),
            npv_tolerance: dec!(0.0000001),
        }
    }
}

impl IrrSolverConfig {
    pub fn validate(&self) -> ProFormaResult<()> {
        if self.lower_bound <= dec!(-1) {
            return Err(ProFormaError::InvalidInput {
                field: "solver.lower_bound".into(),
                reason: "Lower bound must be greater than -100%".into(),
            });
        }
        if self.upper_bound <= self.lower_bound {
            return Err(ProFormaError::InvalidInput {
                field: "solver.upper_bound".into(),
                reason: "Upper bound must exceed lower bound".into(),
            });
        }
        if self.guess < self.lower_bound || self.guess > self.upper_bound {
            return Err(ProFormaError::InvalidInput {
                field: "solver.guess".into(),
                reason: "Guess must lie within [lower_bound, upper_bound]".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(ProFormaError::InvalidInput {
                field: "solver.max_iterations".into(),
                reason: "At least one iteration is required".into(),
            });
        }
        if self.rate_tolerance <= Decimal::ZERO || self.npv_tolerance <= Decimal::ZERO {
            return Err(ProFormaError::InvalidInput {
                field: "solver.tolerance".into(),
                reason: "Tolerances must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Engine-wide knobs that are not part of any assumption set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Deduct only interest from taxable income and pay the full debt
    /// service out of equity cash flow. Off by default, which keeps the
    /// principal-deduction formula of the solar model.
    pub strict_tax_model: bool,
    /// NPV rate for archetypes that carry no hurdle rate of their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
    pub solver: IrrSolverConfig,
}

impl ProjectionOptions {
    pub fn validate(&self) -> ProFormaResult<()> {
        if let Some(rate) = self.discount_rate {
            if rate <= dec!(-1) {
                return Err(ProFormaError::InvalidInput {
                    field: "discount_rate".into(),
                    reason: "Discount rate must be greater than -100%".into(),
                });
            }
        }
        self.solver.validate()
    }
}
