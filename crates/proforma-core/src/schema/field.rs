use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Ceiling for [`FieldKind::NonNegative`] amounts (10 trillion).
pub const MAX_AMOUNT: Decimal = dec!(10_000_000_000_000);

/// Ceiling for [`FieldKind::Count`] quantities.
pub const MAX_COUNT: u32 = 1_000_000;

/// What values a field accepts.
///
/// Every kind is bounded, so products of validated assumptions stay inside
/// `Decimal` range.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Decimal in [0, 1]
    Fraction,
    /// Decimal in [0, MAX_AMOUNT]
    NonNegative,
    /// Decimal in [min, max]
    Range { min: Decimal, max: Decimal },
    /// Integer in [0, MAX_COUNT]
    Count,
    /// Integer number of years in [min, max]
    Years { min: u32, max: u32 },
    /// Integer in [min, max]
    Integer { min: u32, max: u32 },
    /// Nested record with its own fields
    Group { fields: &'static [FieldSpec] },
}

/// Declaration of one assumption field. Archetypes publish these as statics;
/// they drive both validation and discovery.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Decimal>,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    pub const fn optional(
        name: &'static str,
        kind: FieldKind,
        default: Decimal,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            description,
        }
    }

    pub const fn group(name: &'static str, fields: &'static [FieldSpec], description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Group { fields },
            required: true,
            default: None,
            description,
        }
    }

    /// Look up a field by name in a field list.
    pub fn find<'a>(fields: &'a [FieldSpec], name: &str) -> Option<&'a FieldSpec> {
        fields.iter().find(|f| f.name == name)
    }
}
