//! Rewrites raw records into the canonical output shape.

use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde_json::{Map, Value};

use crate::error::ScrapeError;
use crate::formats::NormalizedRecord;

/// True for strings that parse as a float once trimmed, with `,` accepted as
/// the decimal separator.
pub fn is_numeric_string(value: &Value) -> bool {
    let Some(text) = value.as_str() else {
        return false;
    };
    text.trim().replace(',', ".").parse::<f64>().is_ok()
}

fn field(record: &Map<String, Value>, key: &str) -> Value {
    record
        .get(key)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

pub fn normalize_record(raw: &Value) -> Result<NormalizedRecord, ScrapeError> {
    let Value::Object(record) = raw else {
        return Err(ScrapeError::Schema(format!(
            "expected every record to be an object, got {raw}"
        )));
    };

    let raw_rating = field(record, "rating");
    let raw_count = field(record, "number_of_rates");
    // The site sometimes renders the count where the rating belongs.
    let (rating, number_of_rates) = if is_numeric_string(&raw_rating) {
        (raw_rating, raw_count)
    } else if is_numeric_string(&raw_count) {
        (raw_count, Value::String(String::new()))
    } else {
        (Value::String(String::new()), Value::String(String::new()))
    };
    let rating = match rating {
        Value::String(rating) => rating,
        _ => String::new(),
    };

    let details = match record.get("details") {
        Some(Value::Array(details)) => details.clone(),
        _ => Vec::new(),
    };

    Ok(NormalizedRecord {
        name: field(record, "name"),
        url: record.get("url").cloned(),
        address: field(record, "address"),
        authority: field(record, "authority"),
        phone: field(record, "phone"),
        rating,
        number_of_rates,
        details,
    })
}

pub fn normalize_records(root: &Value) -> Result<Vec<NormalizedRecord>, ScrapeError> {
    let Value::Array(records) = root else {
        return Err(ScrapeError::Schema(
            "the root value must be an array of records".to_owned(),
        ));
    };
    records.iter().map(normalize_record).collect()
}

/// Normalizes the records in `input`. The result goes to `output` when given,
/// otherwise to stdout. Returns the number of records written.
pub fn run(input: &Path, output: Option<&Path>) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("read raw records: {}", input.display()))?;
    let root: Value = serde_json::from_str(&text)
        .with_context(|| format!("parse raw records: {}", input.display()))?;
    let normalized = normalize_records(&root)?;
    let json = serde_json::to_string_pretty(&normalized).context("serialize normalized records")?;

    match output {
        Some(output) => {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir: {}", parent.display()))?;
            }
            std::fs::write(output, json)
                .with_context(|| format!("write normalized records: {}", output.display()))?;
            tracing::info!(
                records = normalized.len(),
                path = %output.display(),
                "normalized records written"
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("write normalized records to stdout")?;
        }
    }
    Ok(normalized.len())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_strings_accept_comma_decimals() {
        assert!(is_numeric_string(&json!("4,5")));
        assert!(is_numeric_string(&json!(" 4.5 ")));
        assert!(is_numeric_string(&json!("120")));
        assert!(!is_numeric_string(&json!("(120)")));
        assert!(!is_numeric_string(&json!("")));
        assert!(!is_numeric_string(&json!(4.5)));
        assert!(!is_numeric_string(&Value::Null));
    }

    #[test]
    fn transposed_rating_is_swapped_and_defaults_filled() -> anyhow::Result<()> {
        let raw = json!({"url": "u1", "name": "Cafe X", "rating": "abc", "number_of_rates": "4.5"});

        let normalized = normalize_record(&raw)?;

        assert_eq!(
            serde_json::to_string(&normalized)?,
            r#"{"name":"Cafe X","url":"u1","address":"","authority":"","phone":"","rating":"4.5","number_of_rates":"","details":[]}"#
        );
        Ok(())
    }

    #[test]
    fn numeric_rating_is_kept_verbatim() -> anyhow::Result<()> {
        let raw = json!({"name": "Cafe Y", "rating": "4,2", "number_of_rates": "87"});

        let normalized = normalize_record(&raw)?;

        assert_eq!(normalized.rating, "4,2");
        assert_eq!(normalized.number_of_rates, json!("87"));
        assert_eq!(normalized.url, None);
        Ok(())
    }

    #[test]
    fn unusable_rating_pair_is_blanked() -> anyhow::Result<()> {
        let raw = json!({"name": "Z", "rating": "Restaurant", "number_of_rates": "(12)"});

        let normalized = normalize_record(&raw)?;

        assert_eq!(normalized.rating, "");
        assert_eq!(normalized.number_of_rates, json!(""));
        Ok(())
    }

    #[test]
    fn key_order_is_fixed_and_url_is_optional() -> anyhow::Result<()> {
        let raw = json!({
            "details": [{"Services": ["Wi-Fi"]}],
            "phone": "0522",
            "extra": "dropped",
            "name": "N",
        });

        let text = serde_json::to_string(&normalize_record(&raw)?)?;

        assert_eq!(
            text,
            r#"{"name":"N","address":"","authority":"","phone":"0522","rating":"","number_of_rates":"","details":[{"Services":["Wi-Fi"]}]}"#
        );
        Ok(())
    }

    #[test]
    fn non_sequence_details_become_empty() -> anyhow::Result<()> {
        let raw = json!({"name": "N", "details": {"Services": []}});
        assert!(normalize_record(&raw)?.details.is_empty());
        Ok(())
    }

    #[test]
    fn non_array_root_is_a_schema_error() {
        let err = normalize_records(&json!({"name": "N"})).unwrap_err();
        assert!(matches!(err, ScrapeError::Schema(_)));

        let err = normalize_records(&json!([{"name": "N"}, 3])).unwrap_err();
        assert!(matches!(err, ScrapeError::Schema(_)));
    }

    #[test]
    fn run_writes_pretty_output_file() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let input = temp.path().join("product_details_live_cafe.json");
        let output = temp.path().join("out").join("product_details_live_cafe_cleaned.json");
        std::fs::write(&input, r#"[{"url":"u1","name":"Café","rating":"4,5"}]"#)?;

        let written = run(&input, Some(&output))?;

        assert_eq!(written, 1);
        let text = std::fs::read_to_string(&output)?;
        assert!(text.contains("\n  {\n    \"name\": \"Café\""));
        let back: Vec<NormalizedRecord> = serde_json::from_str(&text)?;
        assert_eq!(back[0].rating, "4,5");
        Ok(())
    }
}
