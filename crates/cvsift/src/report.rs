//! Tabular report output for parsed resume records.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::Path;

use log::info;

use crate::error::ReportError;
use crate::llm::{ParsedRecord, CANONICAL_COLUMNS};

/// Writes `records` to a CSV report at `path`.
///
/// With `append` set and an existing file at `path`, rows are aligned to
/// that file's header: values for columns the header lacks are dropped,
/// columns the records lack come out empty. Otherwise the file is created
/// fresh with a header derived from the records, canonical columns first
/// and any extra model-emitted fields after them in sorted order.
pub fn write_report(records: &[ParsedRecord], path: &Path, append: bool) -> Result<(), ReportError> {
    if records.is_empty() {
        return Err(ReportError::NoRecords);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    if append && path.exists() {
        append_to_existing(records, path)
    } else {
        write_fresh(records, path)
    }
}

fn write_fresh(records: &[ParsedRecord], path: &Path) -> Result<(), ReportError> {
    let columns = derive_columns(records);

    let mut writer = csv::Writer::from_path(path).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    write_rows(&mut writer, records, &columns, true, path)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn append_to_existing(records: &[ParsedRecord], path: &Path) -> Result<(), ReportError> {
    let columns = read_header(path)?;

    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source: csv::Error::from(source),
        })?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    write_rows(&mut writer, records, &columns, false, path)?;
    info!(
        "Appended {} records to {}",
        records.len(),
        path.display()
    );
    Ok(())
}

fn write_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    records: &[ParsedRecord],
    columns: &[String],
    with_header: bool,
    path: &Path,
) -> Result<(), ReportError> {
    let wrap = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    if with_header {
        writer.write_record(columns).map_err(wrap)?;
    }
    for record in records {
        let row: Vec<String> = columns.iter().map(|c| record.cell(c)).collect();
        writer.write_record(&row).map_err(wrap)?;
    }
    writer.flush().map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })
}

/// Canonical columns that any record carries, then the leftover field
/// names sorted for a stable header.
fn derive_columns(records: &[ParsedRecord]) -> Vec<String> {
    let present: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.field_names())
        .collect();

    let mut columns: Vec<String> = CANONICAL_COLUMNS
        .iter()
        .filter(|c| present.contains(**c))
        .map(|c| c.to_string())
        .collect();

    for name in present {
        if !CANONICAL_COLUMNS.contains(&name) {
            columns.push(name.to_string());
        }
    }

    columns
}

fn read_header(path: &Path) -> Result<Vec<String>, ReportError> {
    let file = File::open(path).map_err(|source| ReportError::ReadExisting {
        path: path.to_path_buf(),
        source: csv::Error::from(source),
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let header = reader.headers().map_err(|source| ReportError::ReadExisting {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(header.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn record(fields: Value, filename: &str) -> ParsedRecord {
        let Value::Object(map) = fields else {
            panic!("expected object");
        };
        ParsedRecord::from_fields(map, filename)
    }

    fn sample_record(name: &str, filename: &str) -> ParsedRecord {
        record(
            json!({
                "Name": name,
                "Email": format!("{}@example.com", name.to_lowercase()),
                "Skills": ["Rust", "SQL"],
                "Total_Experience_Years": "3 years",
            }),
            filename,
        )
    }

    fn read_all(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn test_empty_records_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = write_report(&[], &dir.path().join("out.csv"), false).unwrap_err();
        assert!(matches!(err, ReportError::NoRecords));
    }

    #[test]
    fn test_header_orders_canonical_then_extras() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![record(
            json!({
                "Zodiac": "unexpected",
                "Name": "Jane",
                "Email": "jane@example.com",
                "Total_Experience_Years": 2.5,
            }),
            "jane.pdf",
        )];

        write_report(&records, &path, false).unwrap();

        let (header, rows) = read_all(&path);
        assert_eq!(
            header,
            vec![
                "Name",
                "Email",
                "Total_Experience_Years",
                "Resume_File_Name",
                "Zodiac"
            ]
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "Jane");
        assert_eq!(rows[0][3], "jane.pdf");
        assert_eq!(rows[0][4], "unexpected");
    }

    #[test]
    fn test_array_fields_join_with_commas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![sample_record("Jane", "jane.pdf")];

        write_report(&records, &path, false).unwrap();

        let (header, rows) = read_all(&path);
        let skills_idx = header.iter().position(|c| c == "Skills").unwrap();
        assert_eq!(rows[0][skills_idx], "Rust, SQL");
    }

    #[test]
    fn test_append_adds_rows_under_existing_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        write_report(&[sample_record("Jane", "jane.pdf")], &path, false).unwrap();
        write_report(&[sample_record("Bob", "bob.pdf")], &path, true).unwrap();

        let (header, rows) = read_all(&path);
        assert_eq!(rows.len(), 2);
        let name_idx = header.iter().position(|c| c == "Name").unwrap();
        assert_eq!(rows[0][name_idx], "Jane");
        assert_eq!(rows[1][name_idx], "Bob");
    }

    #[test]
    fn test_append_aligns_to_existing_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        write_report(&[sample_record("Jane", "jane.pdf")], &path, false).unwrap();
        // A record with an extra column and a missing one
        let odd = record(
            json!({
                "Name": "Bob",
                "Hobby": "chess",
                "Total_Experience_Years": 1,
            }),
            "bob.pdf",
        );
        write_report(&[odd], &path, true).unwrap();

        let (header, rows) = read_all(&path);
        assert!(!header.contains(&"Hobby".to_string()));
        let email_idx = header.iter().position(|c| c == "Email").unwrap();
        assert_eq!(rows[1][email_idx], "");
        let name_idx = header.iter().position(|c| c == "Name").unwrap();
        assert_eq!(rows[1][name_idx], "Bob");
    }

    #[test]
    fn test_append_to_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.csv");

        write_report(&[sample_record("Jane", "jane.pdf")], &path, true).unwrap();

        let (_, rows) = read_all(&path);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.csv");

        write_report(&[sample_record("Jane", "jane.pdf")], &path, false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_map_fields_become_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            record(json!({"Name": "A", "Phone": "123"}), "a.pdf"),
            record(json!({"Name": "B"}), "b.pdf"),
        ];

        write_report(&records, &path, false).unwrap();

        let (header, rows) = read_all(&path);
        let phone_idx = header.iter().position(|c| c == "Phone").unwrap();
        assert_eq!(rows[0][phone_idx], "123");
        assert_eq!(rows[1][phone_idx], "");
    }
}
