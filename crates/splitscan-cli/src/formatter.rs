//! Output formatting for scanned rows.
//!
//! Supports table, JSON, and CSV output formats.

use clap::ValueEnum;
use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::Value as JsonValue;
use splitscan_core::{Field, Row};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON array of objects keyed by field name.
    Json,
    /// CSV with a header line.
    Csv,
}

/// Formats rows according to the specified format.
pub fn format_rows(fields: &[Field], rows: &[Row], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(fields, rows),
        OutputFormat::Json => format_json(fields, rows),
        OutputFormat::Csv => format_csv(fields, rows),
    }
}

fn format_table(fields: &[Field], rows: &[Row]) -> String {
    let mut table = Table::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    if !fields.is_empty() {
        table.set_header(fields.iter().map(|f| Cell::new(&f.name)));
    }

    for row in rows {
        table.add_row(row.values().iter().map(|v| Cell::new(v.to_string())));
    }

    table.to_string()
}

fn format_json(fields: &[Field], rows: &[Row]) -> String {
    let objects: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let object = fields
                .iter()
                .zip(row.values())
                .map(|(field, value)| {
                    let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                    (field.name.clone(), json)
                })
                .collect();
            JsonValue::Object(object)
        })
        .collect();

    serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string())
}

fn format_csv(fields: &[Field], rows: &[Row]) -> String {
    let mut output = String::new();

    if !fields.is_empty() {
        let header: Vec<String> = fields.iter().map(|f| escape_csv(&f.name)).collect();
        output.push_str(&header.join(","));
        output.push('\n');
    }

    for row in rows {
        let values: Vec<String> = row
            .values()
            .iter()
            .map(|v| if v.is_null() { String::new() } else { escape_csv(&v.to_string()) })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

/// Escapes a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitscan_core::Value;
    use splitscan_store::DataType;

    fn sample() -> (Vec<Field>, Vec<Row>) {
        (
            vec![
                Field::new("id", DataType::BigInt),
                Field::new("name", DataType::Text),
            ],
            vec![
                Row::new(vec![Value::BigInt(1), Value::string("Alice")]),
                Row::new(vec![Value::BigInt(2), Value::Null]),
            ],
        )
    }

    #[test]
    fn test_format_table() {
        let (fields, rows) = sample();
        let output = format_rows(&fields, &rows, OutputFormat::Table);
        assert!(output.contains("id"));
        assert!(output.contains("Alice"));
        assert!(output.contains("NULL"));
    }

    #[test]
    fn test_format_json() {
        let (fields, rows) = sample();
        let output = format_rows(&fields, &rows, OutputFormat::Json);
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], "Alice");
        assert_eq!(parsed[1]["id"], 2);
        assert!(parsed[1]["name"].is_null());
    }

    #[test]
    fn test_format_csv() {
        let (fields, rows) = sample();
        let output = format_rows(&fields, &rows, OutputFormat::Csv);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines, vec!["id,name", "1,Alice", "2,"]);
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello,world"), "\"hello,world\"");
        assert_eq!(escape_csv("hello\"world"), "\"hello\"\"world\"");
    }
}
