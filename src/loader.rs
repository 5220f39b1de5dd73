//! Reads a spreadsheet file into a [`Table`].
//!
//! Delimited files load every non-empty field as text; workbooks keep the
//! cell types of their first worksheet. The first row is always the header.

use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, TimeDelta};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    data::{Cell, Value, parse_text_cell},
    error::{AppendError, Result},
    io_utils::{self, SheetFormat},
    table::Table,
};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Overrides the extension-based delimiter for delimited files.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn load(path: &Path, options: &LoadOptions) -> Result<Table> {
    let format = SheetFormat::from_path(path);
    if format == SheetFormat::Unsupported {
        return Err(AppendError::file_format(
            path,
            "unsupported extension; expected .csv, .tsv, .txt, .xlsx, .xlsm, .xls, .xlsb or .ods",
        ));
    }
    if !path.exists() {
        return Err(AppendError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let table = match format {
        SheetFormat::Delimited => load_delimited(path, options)?,
        _ => load_workbook(path)?,
    };
    info!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        table.row_count(),
        table.columns().len(),
        path
    );
    Ok(table)
}

fn load_delimited(path: &Path, options: &LoadOptions) -> Result<Table> {
    let delimiter = io_utils::resolve_delimiter(path, options.delimiter);
    let file = File::open(path).map_err(|err| open_error(path, err))?;
    let mut reader = io_utils::open_csv_reader(BufReader::new(file), delimiter);
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .map_err(|err| AppendError::file_format(path, format!("{err:#}")))?;
    if headers.is_empty() {
        return Err(AppendError::file_format(path, "file has no header row"));
    }
    debug!("Headers of {:?}: {:?}", path, headers);

    let mut table = Table::with_columns(headers)?;
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            AppendError::file_format(path, format!("row {}: {err}", row_idx + 2))
        })?;
        let decoded = io_utils::decode_record(&record, options.encoding).map_err(|err| {
            AppendError::file_format(path, format!("row {}: {err:#}", row_idx + 2))
        })?;
        table.push_row(decoded.iter().map(|raw| parse_text_cell(raw)).collect())?;
    }
    Ok(table)
}

fn load_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|err| AppendError::file_format(path, err))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppendError::file_format(path, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| AppendError::file_format(path, err))?;
    debug!("Reading worksheet '{sheet_name}' from {:?}", path);

    let mut rows = range.rows();
    let mut headers = rows
        .next()
        .ok_or_else(|| AppendError::file_format(path, format!("worksheet '{sheet_name}' is empty")))?
        .iter()
        .map(header_text)
        .collect::<Vec<_>>();
    let data = rows
        .map(|row| row.iter().map(workbook_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    // The used range can extend past the header row when a stray formatted
    // or emptied cell sits to its right; such columns carry nothing.
    let width = trimmed_width(&headers, &data);
    if width < headers.len() {
        debug!(
            "Ignoring {} empty trailing column(s) in '{sheet_name}'",
            headers.len() - width
        );
        headers.truncate(width);
    }

    let mut table = Table::with_columns(headers)?;
    for mut row in data {
        row.truncate(width);
        table.push_row(row)?;
    }
    Ok(table)
}

/// Width once trailing columns with a blank header and no data are dropped.
fn trimmed_width(headers: &[String], rows: &[Vec<Cell>]) -> usize {
    let mut width = headers.len();
    while width > 0
        && headers[width - 1].trim().is_empty()
        && rows
            .iter()
            .all(|row| row.get(width - 1).is_none_or(|cell| cell.is_none()))
    {
        width -= 1;
    }
    width
}

fn open_error(path: &Path, err: io::Error) -> AppendError {
    if err.kind() == io::ErrorKind::NotFound {
        AppendError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        AppendError::file_format(path, err)
    }
}

fn header_text(data: &Data) -> String {
    workbook_cell(data)
        .map(|value| value.as_display())
        .unwrap_or_default()
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => parse_text_cell(s),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => Some(
            excel_serial_to_text(dt.as_f64())
                .map(Value::String)
                .unwrap_or(Value::Float(dt.as_f64())),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

/// Excel serial dates count days from 1899-12-30; whole days render as a
/// date, anything with a time part as a timestamp.
fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let moment = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    if millis % 86_400_000 == 0 {
        Some(moment.format("%Y-%m-%d").to_string())
    } else {
        Some(moment.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_preserves_column_order_and_blank_cells() {
        let file = csv_file("zeta,alpha,mid\n1,,x\n2,b,\n");
        let table = load(file.path(), &LoadOptions::default()).unwrap();
        assert_eq!(table.columns(), ["zeta", "alpha", "mid"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "alpha"), Some(&None));
        assert_eq!(table.get(1, "alpha"), Some(&Some(Value::from("b"))));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.csv"), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileNotFoundError");
    }

    #[test]
    fn ragged_rows_are_format_errors() {
        let file = csv_file("a,b\n1,2,3\n");
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn empty_file_is_a_format_error() {
        let file = csv_file("");
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
    }

    #[test]
    fn duplicate_headers_are_schema_errors() {
        let file = csv_file("id,id\n1,2\n");
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }

    #[test]
    fn invalid_encoding_is_a_format_error() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"name\ncaf\xe9\n").unwrap();
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");

        let latin1 = LoadOptions {
            encoding: encoding_rs::WINDOWS_1252,
            ..LoadOptions::default()
        };
        let table = load(file.path(), &latin1).unwrap();
        assert_eq!(table.get(0, "name"), Some(&Some(Value::from("café"))));
    }

    #[test]
    fn corrupt_workbook_is_a_format_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"not a zip archive").unwrap();
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
    }

    #[test]
    fn unsupported_extension_is_a_format_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{\"a\": 1}").unwrap();
        let err = load(file.path(), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert!(err.to_string().contains("unsupported extension"));

        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.pdf"), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
    }

    #[test]
    fn txt_and_extensionless_files_load_as_csv() {
        let dir = tempdir().unwrap();
        for name in ["export.txt", "export"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "a,b\n1,2\n").unwrap();
            let table = load(&path, &LoadOptions::default()).unwrap();
            assert_eq!(table.columns(), ["a", "b"]);
        }
    }

    #[test]
    fn blank_trailing_columns_without_data_are_dropped() {
        let headers = vec!["id".to_string(), "name".to_string(), String::new()];
        let rows = vec![
            vec![Some(Value::Integer(1)), Some(Value::from("Ann")), None],
            vec![Some(Value::Integer(2)), None, None],
        ];
        assert_eq!(trimmed_width(&headers, &rows), 2);

        let with_data = vec![vec![None, None, Some(Value::from("stray"))]];
        assert_eq!(trimmed_width(&headers, &with_data), 3);
    }

    #[test]
    fn workbook_with_stray_cell_right_of_header_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stray.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "name").unwrap();
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "Ann").unwrap();
        let bold = rust_xlsxwriter::Format::new().set_bold();
        sheet.write_blank(0, 3, &bold).unwrap();
        workbook.save(&path).unwrap();

        let table = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.get(0, "name"), Some(&Some(Value::from("Ann"))));
    }

    #[test]
    fn excel_serials_render_as_iso_text() {
        assert_eq!(excel_serial_to_text(45292.0).as_deref(), Some("2024-01-01"));
        assert_eq!(
            excel_serial_to_text(45292.5).as_deref(),
            Some("2024-01-01 12:00:00")
        );
        assert_eq!(excel_serial_to_text(-1.0), None);
    }
}
