use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::experience;

/// Field the model reports raw experience under; normalized in place.
pub const FIELD_EXPERIENCE_YEARS: &str = "Total_Experience_Years";

/// Field stamped by the pipeline with the originating filename.
pub const FIELD_SOURCE_FILE: &str = "Resume_File_Name";

/// Column order for the report; any extra fields the model invents follow
/// these, sorted by name.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    "Name",
    "Email",
    "Phone",
    "Skills",
    "Experience",
    "Education",
    "Summary",
    FIELD_EXPERIENCE_YEARS,
    FIELD_SOURCE_FILE,
];

/// One successfully parsed resume. Immutable once built; workers hand
/// ownership to the aggregator over the results channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ParsedRecord {
    /// Builds a record from the model's decoded field map: normalizes the
    /// experience field and stamps the source filename.
    pub fn from_fields(mut fields: Map<String, Value>, filename: &str) -> Self {
        let raw = fields
            .get(FIELD_EXPERIENCE_YEARS)
            .cloned()
            .unwrap_or(Value::Null);
        let years = experience::normalize(&raw);
        fields.insert(FIELD_EXPERIENCE_YEARS.to_string(), json_f64(years));
        fields.insert(
            FIELD_SOURCE_FILE.to_string(),
            Value::String(filename.to_string()),
        );
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn source_file(&self) -> &str {
        self.fields
            .get(FIELD_SOURCE_FILE)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn experience_years(&self) -> f64 {
        self.fields
            .get(FIELD_EXPERIENCE_YEARS)
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Field names present on this record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Renders one field as a report cell. Arrays (e.g. skill lists) join
    /// with ", "; nested objects fall back to compact JSON.
    pub fn cell(&self, key: &str) -> String {
        match self.fields.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Some(other) => other.to_string(),
        }
    }
}

fn json_f64(x: f64) -> Value {
    serde_json::Number::from_f64(x)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_fields() -> Map<String, Value> {
        let value = json!({
            "Name": "Jane Doe",
            "Email": "jane@example.com",
            "Skills": ["Rust", "SQL"],
            "Total_Experience_Years": "5 years"
        });
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_fields_normalizes_and_stamps() {
        let record = ParsedRecord::from_fields(sample_fields(), "jane.pdf");
        assert_eq!(record.experience_years(), 5.0);
        assert_eq!(record.source_file(), "jane.pdf");
        assert_eq!(record.get("Name"), Some(&json!("Jane Doe")));
    }

    #[test]
    fn test_missing_experience_defaults_to_zero() {
        let mut fields = sample_fields();
        fields.remove(FIELD_EXPERIENCE_YEARS);
        let record = ParsedRecord::from_fields(fields, "x.pdf");
        assert_eq!(record.experience_years(), 0.0);
    }

    #[test]
    fn test_numeric_experience_unchanged() {
        let mut fields = sample_fields();
        fields.insert(FIELD_EXPERIENCE_YEARS.to_string(), json!(3.5));
        let record = ParsedRecord::from_fields(fields, "x.pdf");
        assert_eq!(record.experience_years(), 3.5);
    }

    #[test]
    fn test_cell_rendering() {
        let record = ParsedRecord::from_fields(sample_fields(), "jane.pdf");
        assert_eq!(record.cell("Name"), "Jane Doe");
        assert_eq!(record.cell("Skills"), "Rust, SQL");
        assert_eq!(record.cell("Total_Experience_Years"), "5.0");
        assert_eq!(record.cell("Nonexistent"), "");
    }

    #[test]
    fn test_serializes_flat() {
        let record = ParsedRecord::from_fields(sample_fields(), "jane.pdf");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Resume_File_Name"], json!("jane.pdf"));
        assert_eq!(value["Name"], json!("Jane Doe"));
    }
}
