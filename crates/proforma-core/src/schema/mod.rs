//! Assumption schemas: field declarations and the reader that validates raw
//! payloads against them.

pub mod field;
pub mod reader;

pub use field::{FieldKind, FieldSpec, MAX_AMOUNT, MAX_COUNT};
pub use reader::{parse_decimal, AssumptionReader};

use serde_json::{Map, Value};

use crate::error::{FieldError, ValidationErrors};

/// The top-level payload must be a JSON object.
pub fn as_object<'a>(archetype: &str, raw: &'a Value) -> Result<&'a Map<String, Value>, ValidationErrors> {
    raw.as_object().ok_or_else(|| ValidationErrors {
        archetype: archetype.to_string(),
        errors: vec![FieldError {
            field: "$".into(),
            reason: format!("assumption payload must be a JSON object, got {raw}"),
        }],
    })
}
