use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::domain::TedError;
use crate::store::{CellValue, ColumnConfig, Row};

// Imported rows are normalized into this fixed shape; unknown headers
// are dropped.
const TEXT_FIELDS: [&str; 5] = ["name", "email", "role", "department", "location"];

pub type ImportOutcome = Result<Vec<Row>, TedError>;

/// Parses CSV with a header row into rows. Header keys are trimmed and
/// lowercased, values trimmed; `age` is parsed as an integer defaulting
/// to 0, all other known fields default to the empty string. Source ids
/// are discarded in favor of synthetic `imported-<millis>-<index>` ids.
pub fn parse_rows<R: Read>(reader: R) -> ImportOutcome {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let stamp = now_millis();
    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let raw: HashMap<&str, &str> = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.as_str(), value.trim()))
            .collect();

        let mut fields = HashMap::with_capacity(TEXT_FIELDS.len() + 1);
        for key in TEXT_FIELDS {
            let value = raw.get(key).copied().unwrap_or("");
            fields.insert(key.to_string(), CellValue::from(value));
        }
        let age = raw.get("age").map(|v| leading_int(v)).unwrap_or(0);
        fields.insert("age".to_string(), CellValue::Int(age));

        rows.push(Row::new(format!("imported-{stamp}-{index}"), fields));
    }

    if rows.is_empty() {
        return Err(TedError::ImportEmpty);
    }
    debug!("Parsed {} rows from CSV", rows.len());
    Ok(rows)
}

pub fn import_file(path: &Path) -> ImportOutcome {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TedError::FileNotFound,
        ErrorKind::PermissionDenied => TedError::PermissionDenied,
        _ => TedError::IoError(e),
    })?;
    parse_rows(file)
}

/// Runs the import off the UI thread. The returned channel delivers a
/// single outcome; the event loop polls it and commits success through
/// one `ImportData` dispatch.
pub fn spawn_import(path: PathBuf) -> Receiver<ImportOutcome> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        info!("Importing {path:?} ...");
        let outcome = import_file(&path);
        if let Err(e) = &outcome {
            warn!("Import of {path:?} failed: {e}");
        }
        // The receiver may be gone if the application quit mid-import.
        let _ = tx.send(outcome);
    });
    rx
}

/// Serializes rows to CSV keyed by column **label**, visible columns
/// only, in visible-column order. Missing fields export as empty.
pub fn export_csv(rows: &[Row], columns: &[ColumnConfig]) -> Result<String, TedError> {
    let visible: Vec<&ColumnConfig> = columns.iter().filter(|c| c.visible).collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(visible.iter().map(|c| c.label.as_str()))?;
    for row in rows {
        let record: Vec<String> = visible
            .iter()
            .map(|c| row.get(&c.id).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn export_file(rows: &[Row], columns: &[ColumnConfig], path: &Path) -> Result<(), TedError> {
    let csv = export_csv(rows, columns)?;
    let mut file = File::create(path)?;
    file.write_all(csv.as_bytes())?;
    info!("Exported {} rows to {path:?}", rows.len());
    Ok(())
}

/// Parses the leading integer of a string: an optional sign followed by
/// digits, stopping at the first non-digit. `"30.5"` is 30, `"abc"` and
/// the empty string are 0.
pub fn leading_int(text: &str) -> i64 {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::store::TableState;

    #[test]
    fn import_normalizes_headers_and_trims_values() {
        let src = " Name , EMAIL ,Age\n  Bob  , bob@x.io ,30\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&CellValue::from("Bob")));
        assert_eq!(rows[0].get("email"), Some(&CellValue::from("bob@x.io")));
        assert_eq!(rows[0].get("age"), Some(&CellValue::Int(30)));
    }

    #[test]
    fn non_numeric_age_defaults_to_zero() {
        let src = "Name,Age\nBob,abc\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        assert_eq!(rows[0].get("name"), Some(&CellValue::from("Bob")));
        assert_eq!(rows[0].get("age"), Some(&CellValue::Int(0)));
    }

    #[test]
    fn decimal_age_truncates_to_the_integer_part() {
        let src = "Name,Age\nBob,30.5\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        assert_eq!(rows[0].get("age"), Some(&CellValue::Int(30)));
    }

    #[test]
    fn leading_int_stops_at_the_first_non_digit() {
        assert_eq!(leading_int("30.5"), 30);
        assert_eq!(leading_int("-7kg"), -7);
        assert_eq!(leading_int("+12"), 12);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn missing_known_fields_default_to_empty() {
        let src = "Name\nBob\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        for key in ["email", "role", "department", "location"] {
            assert_eq!(rows[0].get(key), Some(&CellValue::Text(String::new())));
        }
        assert_eq!(rows[0].get("age"), Some(&CellValue::Int(0)));
    }

    #[test]
    fn unknown_headers_are_ignored_and_source_ids_discarded() {
        let src = "id,name,favourite_color\n42,Bob,green\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        assert!(rows[0].id.starts_with("imported-"));
        assert!(!rows[0].fields.contains_key("favourite_color"));
        assert!(!rows[0].fields.contains_key("id"));
    }

    #[test]
    fn imported_ids_are_unique_per_row() {
        let src = "Name\nA\nB\nC\n";
        let rows = parse_rows(src.as_bytes()).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn empty_source_is_an_error() {
        assert!(matches!(
            parse_rows("Name,Age\n".as_bytes()),
            Err(TedError::ImportEmpty)
        ));
        assert!(matches!(
            parse_rows("".as_bytes()),
            Err(TedError::ImportEmpty)
        ));
    }

    #[test]
    fn export_is_keyed_by_label_in_visible_order() {
        let state = TableState::seed();
        let mut columns = state.columns.clone();
        columns[1].visible = false; // hide email
        let csv = export_csv(&state.rows[..2], &columns).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Name,Age,Role"));
        assert_eq!(lines.next(), Some("John Doe,28,Developer"));
        assert_eq!(lines.next(), Some("Jane Smith,32,Designer"));
    }

    #[test]
    fn export_import_round_trip_preserves_field_values() {
        let state = TableState::seed();
        let csv = export_csv(&state.rows, &state.columns).unwrap();
        let reimported = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(reimported.len(), state.rows.len());
        for (orig, imp) in state.rows.iter().zip(reimported.iter()) {
            for key in ["name", "email", "age", "role"] {
                assert_eq!(orig.get(key), imp.get(key), "field {key}");
            }
        }
    }

    #[test]
    fn spawn_import_delivers_outcome_over_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Name,Age\nAda,36").unwrap();

        let rx = spawn_import(path);
        let outcome = rx.recv().unwrap();
        let rows = outcome.unwrap();
        assert_eq!(rows[0].get("name"), Some(&CellValue::from("Ada")));
        assert_eq!(rows[0].get("age"), Some(&CellValue::Int(36)));
    }

    #[test]
    fn spawn_import_reports_missing_file() {
        let rx = spawn_import(PathBuf::from("/no/such/file.csv"));
        assert!(matches!(rx.recv().unwrap(), Err(TedError::FileNotFound)));
    }
}
