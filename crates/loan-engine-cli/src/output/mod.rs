pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Keys under `result` that hold amortisation rows rather than scalars.
pub(crate) const ROW_ARRAY_KEYS: [&str; 3] = ["schedule", "updated_tail", "projected_schedule"];

/// Part-payment outcomes arrive externally tagged; unwrap the tag so the
/// formatters see the payload object directly.
pub(crate) fn unwrap_outcome(result: &Value) -> &Value {
    if let Value::Object(map) = result {
        if map.len() == 1 {
            if let Some(inner) = map.get("applied").or_else(|| map.get("foreclosed_in_full")) {
                if inner.is_object() {
                    return inner;
                }
            }
        }
    }
    result
}

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}
