pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a JSON scalar for a cell; nested values are compacted to JSON.
pub fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Flatten an object row, lifting one level of nested objects into
/// `parent.child` columns (e.g. a projection period's `detail` map).
pub fn flatten_row(map: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(map.len());
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (k, v) in inner {
                    out.push((format!("{key}.{k}"), cell(v)));
                }
            }
            _ => out.push((key.clone(), cell(val))),
        }
    }
    out
}
