use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::field::{FieldKind, FieldSpec, MAX_AMOUNT, MAX_COUNT};
use crate::error::{FieldError, ValidationErrors};

/// Reads a raw JSON object against [`FieldSpec`]s, collecting every
/// violation instead of stopping at the first.
///
/// Accessors always return a value so reading can continue; when a field is
/// invalid the returned value is zero and an error has been recorded.
pub struct AssumptionReader<'a> {
    payload: &'a Map<String, Value>,
    prefix: String,
    errors: Vec<FieldError>,
}

impl<'a> AssumptionReader<'a> {
    pub fn new(payload: &'a Map<String, Value>) -> Self {
        Self {
            payload,
            prefix: String::new(),
            errors: Vec::new(),
        }
    }

    fn path(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn push(&mut self, name: &str, reason: impl Into<String>) {
        let field = self.path(name);
        self.errors.push(FieldError {
            field,
            reason: reason.into(),
        });
    }

    /// `true` if no error has been recorded for `name` at this level.
    pub fn is_valid(&self, name: &str) -> bool {
        let path = self.path(name);
        !self
            .errors
            .iter()
            .any(|e| e.field == path || e.field.starts_with(&format!("{path}.")))
    }

    /// Record a cross-field violation against `name` when `ok` is false.
    pub fn check(&mut self, ok: bool, name: &str, reason: impl Into<String>) {
        if !ok {
            self.push(name, reason);
        }
    }

    /// Present, non-null raw value, or the field default, or a recorded error.
    fn raw(&mut self, spec: &FieldSpec) -> Option<Result<Decimal, ()>> {
        let payload = self.payload;
        match payload.get(spec.name) {
            None | Some(Value::Null) => {
                if let Some(default) = spec.default {
                    Some(Ok(default))
                } else {
                    if spec.required {
                        self.push(spec.name, "missing required field");
                    }
                    None
                }
            }
            Some(value) => match parse_decimal(value) {
                Some(d) => Some(Ok(d)),
                None => {
                    self.push(spec.name, format!("expected a number, got {value}"));
                    Some(Err(()))
                }
            },
        }
    }

    pub fn decimal(&mut self, spec: &FieldSpec) -> Decimal {
        let value = match self.raw(spec) {
            Some(Ok(v)) => v,
            _ => return Decimal::ZERO,
        };

        let violation = match spec.kind {
            FieldKind::Fraction if value < Decimal::ZERO || value > Decimal::ONE => {
                Some(format!("must be between 0 and 1, got {value}"))
            }
            FieldKind::NonNegative if value < Decimal::ZERO => {
                Some(format!("must be non-negative, got {value}"))
            }
            FieldKind::NonNegative if value > MAX_AMOUNT => {
                Some(format!("must not exceed {MAX_AMOUNT}, got {value}"))
            }
            FieldKind::Range { min, max } if value < min || value > max => {
                Some(format!("must be between {min} and {max}, got {value}"))
            }
            FieldKind::Count | FieldKind::Years { .. } | FieldKind::Integer { .. } => {
                return self
                    .integer_checks(spec, value)
                    .map(Decimal::from)
                    .unwrap_or(Decimal::ZERO);
            }
            FieldKind::Group { .. } => Some("expected an object".to_string()),
            _ => None,
        };

        match violation {
            Some(reason) => {
                self.push(spec.name, reason);
                Decimal::ZERO
            }
            None => value,
        }
    }

    pub fn count(&mut self, spec: &FieldSpec) -> u32 {
        match self.raw(spec) {
            Some(Ok(v)) => self.integer_checks(spec, v).unwrap_or(0),
            _ => 0,
        }
    }

    fn integer_checks(&mut self, spec: &FieldSpec, value: Decimal) -> Option<u32> {
        if value < Decimal::ZERO {
            self.push(spec.name, format!("must be non-negative, got {value}"));
            return None;
        }
        if !value.fract().is_zero() {
            self.push(spec.name, format!("must be a whole number, got {value}"));
            return None;
        }
        let Some(n) = value.to_u32() else {
            self.push(spec.name, format!("is too large, got {value}"));
            return None;
        };
        let (min, max) = match spec.kind {
            FieldKind::Years { min, max } | FieldKind::Integer { min, max } => (min, max),
            _ => (0, MAX_COUNT),
        };
        if n < min || n > max {
            self.push(spec.name, format!("must be between {min} and {max}, got {n}"));
            return None;
        }
        Some(n)
    }

    /// Read a nested record. Errors inside it are reported with a
    /// `group.field` path; unknown keys inside it are rejected.
    pub fn group<T>(
        &mut self,
        spec: &FieldSpec,
        read: impl FnOnce(&mut AssumptionReader<'_>) -> T,
    ) -> T {
        let FieldKind::Group { fields } = spec.kind else {
            self.push(spec.name, "field is not a record");
            let empty = Map::new();
            return read(&mut AssumptionReader::new(&empty));
        };

        let payload = self.payload;
        match payload.get(spec.name) {
            Some(Value::Object(inner)) => {
                let mut child = AssumptionReader {
                    payload: inner,
                    prefix: format!("{}.", self.path(spec.name)),
                    errors: Vec::new(),
                };
                let value = read(&mut child);
                child.reject_unknown(fields);
                self.errors.append(&mut child.errors);
                value
            }
            other => {
                let reason = match other {
                    None | Some(Value::Null) => "missing required field".to_string(),
                    Some(v) => format!("expected an object, got {v}"),
                };
                self.push(spec.name, reason);
                // Still run the reader so the caller gets a value; its own
                // complaints about missing members would only repeat this one.
                let empty = Map::new();
                read(&mut AssumptionReader::new(&empty))
            }
        }
    }

    /// Record every key not declared in `fields`.
    pub fn reject_unknown(&mut self, fields: &[FieldSpec]) {
        let unknown: Vec<String> = self
            .payload
            .keys()
            .filter(|k| FieldSpec::find(fields, k).is_none())
            .cloned()
            .collect();
        for key in unknown {
            self.push(&key, "unknown field");
        }
    }

    /// Finish reading; `value` is returned only if nothing was recorded.
    pub fn finish<T>(self, archetype: &str, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors {
                archetype: archetype.to_string(),
                errors: self.errors,
            })
        }
    }
}

/// Accepts JSON numbers and numeric strings.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
