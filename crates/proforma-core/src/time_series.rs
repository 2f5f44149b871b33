//! Period-by-period projection of a single quantity.
//!
//! A [`SeriesSpec`] is a base value plus a stack of [`Adjustment`]s. Value at
//! period `t` (0-based) is `base * Π factor_i(t) + Σ step_i * t`, evaluated
//! directly from `t` so any period can be computed without walking the ones
//! before it.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

/// One rule applied to the base value of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    /// No change over time
    Constant,
    /// `(1 + g)^t`
    Growth(Rate),
    /// `(1 - d)^t`
    Decay(Rate),
    /// Price escalator, `(1 + e)^t` applied cumulatively from period 0
    Escalation(Rate),
    /// Linear `+ amount * t`
    Step(Money),
}

impl Adjustment {
    fn factor(&self, t: u32) -> Decimal {
        let exp = i64::from(t);
        match self {
            Adjustment::Constant | Adjustment::Step(_) => Decimal::ONE,
            Adjustment::Growth(g) | Adjustment::Escalation(g) => (Decimal::ONE + g).powi(exp),
            Adjustment::Decay(d) => (Decimal::ONE - d).powi(exp),
        }
    }

    fn offset(&self, t: u32) -> Decimal {
        match self {
            Adjustment::Step(amount) => amount * Decimal::from(t),
            _ => Decimal::ZERO,
        }
    }
}

/// A base value and the adjustments that move it through time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub base: Decimal,
    pub adjustments: Vec<Adjustment>,
}

impl SeriesSpec {
    pub fn constant(base: Decimal) -> Self {
        Self {
            base,
            adjustments: vec![Adjustment::Constant],
        }
    }

    pub fn growing(base: Decimal, rate: Rate) -> Self {
        Self::constant(base).with(Adjustment::Growth(rate))
    }

    pub fn decaying(base: Decimal, rate: Rate) -> Self {
        Self::constant(base).with(Adjustment::Decay(rate))
    }

    pub fn escalating(base: Decimal, rate: Rate) -> Self {
        Self::constant(base).with(Adjustment::Escalation(rate))
    }

    /// Stack another adjustment on top of the existing ones.
    pub fn with(mut self, adjustment: Adjustment) -> Self {
        self.adjustments.retain(|a| *a != Adjustment::Constant);
        self.adjustments.push(adjustment);
        self
    }

    pub fn value_at(&self, t: u32) -> Decimal {
        let factor = self
            .adjustments
            .iter()
            .fold(Decimal::ONE, |acc, a| acc * a.factor(t));
        let offset = self
            .adjustments
            .iter()
            .fold(Decimal::ZERO, |acc, a| acc + a.offset(t));
        self.base * factor + offset
    }

    /// Lazy iterator over periods `0..periods`.
    pub fn iter(&self, periods: u32) -> SeriesIter<'_> {
        SeriesIter {
            spec: self,
            next: 0,
            end: periods,
        }
    }

    pub fn project(&self, periods: u32) -> Vec<Decimal> {
        self.iter(periods).collect()
    }
}

pub struct SeriesIter<'a> {
    spec: &'a SeriesSpec,
    next: u32,
    end: u32,
}

impl Iterator for SeriesIter<'_> {
    type Item = Decimal;

    fn next(&mut self) -> Option<Decimal> {
        if self.next >= self.end {
            return None;
        }
        let value = self.spec.value_at(self.next);
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SeriesIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_growth_is_flat() {
        let values = SeriesSpec::growing(dec!(250), Decimal::ZERO).project(12);
        assert_eq!(values.len(), 12);
        assert!(values.iter().all(|v| *v == dec!(250)));
    }

    #[test]
    fn test_compounding_growth() {
        let values = SeriesSpec::growing(dec!(100), dec!(0.10)).project(3);
        assert_eq!(values, vec![dec!(100), dec!(110), dec!(121)]);
    }

    #[test]
    fn test_compounding_decay() {
        let values = SeriesSpec::decaying(dec!(1000), dec!(0.5)).project(3);
        assert_eq!(values, vec![dec!(1000), dec!(500), dec!(250)]);
    }

    #[test]
    fn test_escalation_starts_at_base() {
        let spec = SeriesSpec::escalating(dec!(30), dec!(0.02));
        assert_eq!(spec.value_at(0), dec!(30));
        assert_eq!(spec.value_at(1), dec!(30.6));
        assert_eq!(spec.value_at(2), dec!(31.212));
    }

    #[test]
    fn test_composed_decay_and_growth() {
        let spec = SeriesSpec::decaying(dec!(100), dec!(0.5)).with(Adjustment::Growth(dec!(1)));
        // Halving and doubling cancel out
        assert!(spec.project(5).iter().all(|v| *v == dec!(100)));
    }

    #[test]
    fn test_step_is_additive() {
        let spec = SeriesSpec::constant(dec!(10)).with(Adjustment::Step(dec!(5)));
        assert_eq!(spec.project(3), vec![dec!(10), dec!(15), dec!(20)]);
    }

    #[test]
    fn test_iter_is_restartable() {
        let spec = SeriesSpec::growing(dec!(1), dec!(0.5));
        let first: Vec<_> = spec.iter(4).collect();
        let second: Vec<_> = spec.iter(4).collect();
        assert_eq!(first, second);
        assert_eq!(spec.iter(4).len(), 4);
    }

    #[test]
    fn test_zero_periods() {
        assert!(SeriesSpec::constant(dec!(1)).project(0).is_empty());
    }
}
