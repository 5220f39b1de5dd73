//! Persists a [`Table`] to disk in the format implied by the destination.
//!
//! The table is rendered into a temporary file beside the destination and
//! renamed over it only once fully written, so a failed write leaves the
//! original file byte-identical.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};
use rust_xlsxwriter::{Workbook, XlsxError};
use tempfile::NamedTempFile;

use crate::{
    data::{Value, render_cell},
    error::{AppendError, Result},
    io_utils::{self, SheetFormat},
    table::Table,
};

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    /// Copy the existing destination to a timestamped backup first.
    pub backup: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            backup: false,
        }
    }
}

/// Writes `table` to `path`, returning the backup location when one was made.
pub fn write(table: &Table, path: &Path, options: &WriteOptions) -> Result<Option<PathBuf>> {
    let format = SheetFormat::from_path(path);
    match format {
        SheetFormat::Unsupported => {
            return Err(AppendError::file_format(
                path,
                "unsupported extension; expected .csv, .tsv, .txt or .xlsx",
            ));
        }
        SheetFormat::OtherWorkbook => {
            return Err(AppendError::file_format(
                path,
                "only .xlsx workbooks and delimited text (.csv, .tsv, .txt) can be written",
            ));
        }
        SheetFormat::Delimited | SheetFormat::Xlsx => {}
    }
    ensure_writable(path)?;

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(parent).map_err(|err| permission(path, err))?;
    debug!("Staging output for {:?} in {:?}", path, temp.path());

    match format {
        SheetFormat::Xlsx => {
            let bytes = render_xlsx(table, path)?;
            temp.as_file()
                .write_all(&bytes)
                .map_err(|err| permission(path, err))?;
        }
        _ => {
            let file = temp.reopen().map_err(|err| permission(path, err))?;
            let delimiter = io_utils::resolve_delimiter(path, options.delimiter);
            write_delimited(table, file, delimiter, options.encoding)
                .map_err(|err| permission(path, err))?;
        }
    }
    temp.as_file()
        .sync_all()
        .map_err(|err| permission(path, err))?;

    let backup = if options.backup && path.exists() {
        Some(create_backup(path)?)
    } else {
        None
    };

    temp.persist(path)
        .map_err(|err| permission(path, err.error))?;
    info!(
        "Wrote {} row(s) x {} column(s) to {:?}",
        table.row_count(),
        table.columns().len(),
        path
    );
    Ok(backup)
}

/// `<stem>.<YYYYMMDDHHMMSS>.bak.<ext>` next to the original.
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{stamp}.bak.{}", ext.to_string_lossy()),
        None => format!("{stem}.{stamp}.bak"),
    };
    path.with_file_name(name)
}

fn create_backup(path: &Path) -> Result<PathBuf> {
    let destination = backup_path(path);
    fs::copy(path, &destination).map_err(|err| permission(&destination, err))?;
    info!("Backed up {:?} to {:?}", path, destination);
    Ok(destination)
}

// Renaming over a read-only file succeeds on Unix, so check explicitly.
fn ensure_writable(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.permissions().readonly() => Err(permission(
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "destination is read-only"),
        )),
        _ => Ok(()),
    }
}

fn permission(path: &Path, source: io::Error) -> AppendError {
    AppendError::WritePermission {
        path: path.to_path_buf(),
        source,
    }
}

fn write_delimited(
    table: &Table,
    file: File,
    delimiter: u8,
    encoding: &'static Encoding,
) -> io::Result<()> {
    let mut writer = io_utils::open_csv_writer(file, delimiter, encoding);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(render_cell))?;
    }
    writer.flush()
}

/// Largest integer magnitude an Excel number (an f64) holds exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

fn render_xlsx(table: &Table, path: &Path) -> Result<Vec<u8>> {
    let xlsx_error = |err: XlsxError| AppendError::file_format(path, err);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in table.columns().iter().enumerate() {
        let (row, col) = sheet_position(0, col, path)?;
        worksheet.write_string(row, col, name).map_err(xlsx_error)?;
    }
    for (row_idx, cells) in table.rows().iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let (row, col) = sheet_position(row_idx + 1, col, path)?;
            match cell {
                None => {}
                Some(Value::String(s)) => {
                    worksheet.write_string(row, col, s).map_err(xlsx_error)?;
                }
                // Beyond 2^53 a number cell would round; keep the digits as text.
                Some(Value::Integer(i)) if i.unsigned_abs() > MAX_EXACT_INTEGER => {
                    worksheet
                        .write_string(row, col, i.to_string())
                        .map_err(xlsx_error)?;
                }
                Some(Value::Integer(i)) => {
                    worksheet
                        .write_number(row, col, *i as f64)
                        .map_err(xlsx_error)?;
                }
                Some(Value::Float(f)) => {
                    worksheet.write_number(row, col, *f).map_err(xlsx_error)?;
                }
                Some(Value::Boolean(b)) => {
                    worksheet.write_boolean(row, col, *b).map_err(xlsx_error)?;
                }
            }
        }
    }
    workbook.save_to_buffer().map_err(xlsx_error)
}

fn sheet_position(row: usize, col: usize, path: &Path) -> Result<(u32, u16)> {
    let row = u32::try_from(row)
        .map_err(|_| AppendError::file_format(path, format!("row {row} exceeds worksheet limits")))?;
    let col = u16::try_from(col).map_err(|_| {
        AppendError::file_format(path, format!("column {col} exceeds worksheet limits"))
    })?;
    Ok((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadOptions, load};
    use tempfile::tempdir;

    fn sample() -> Table {
        Table::new(
            vec!["id".to_string(), "name".to_string(), "note".to_string()],
            vec![
                vec![Some(Value::Integer(1)), Some(Value::from("Ann")), None],
                vec![
                    Some(Value::Integer(2)),
                    Some(Value::from("Bo, Jr.")),
                    Some(Value::from("x")),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_output_quotes_only_when_needed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write(&sample(), &path, &WriteOptions::default()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,name,note\n1,Ann,\n2,\"Bo, Jr.\",x\n");
    }

    #[test]
    fn tsv_output_uses_tabs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write(&sample(), &path, &WriteOptions::default()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("id\tname\tnote\n"));
    }

    #[test]
    fn xlsx_round_trip_keeps_types() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write(&sample(), &path, &WriteOptions::default()).unwrap();
        let loaded = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.columns(), sample().columns());
        assert_eq!(loaded.get(1, "name"), Some(&Some(Value::from("Bo, Jr."))));
        assert_eq!(loaded.get(0, "note"), Some(&None));
        let id = loaded.get(0, "id").unwrap().as_ref().unwrap();
        assert_eq!(id.as_display(), "1");
    }

    #[test]
    fn legacy_workbook_destination_is_rejected_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xls");
        fs::write(&path, b"original").unwrap();
        let err = write(&sample(), &path, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[test]
    fn macro_workbook_destination_is_rejected_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.xlsm");
        fs::write(&path, b"original").unwrap();
        let err = write(&sample(), &path, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unsupported_destination_is_rejected_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        fs::write(&path, b"original").unwrap();
        let err = write(&sample(), &path, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert!(err.to_string().contains("unsupported extension"));
        assert_eq!(fs::read(&path).unwrap(), b"original");

        let fresh = dir.path().join("notes.json");
        assert!(write(&sample(), &fresh, &WriteOptions::default()).is_err());
        assert!(!fresh.exists());
    }

    #[test]
    fn integers_beyond_exact_float_range_keep_their_digits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.xlsx");
        let table = Table::new(
            vec!["id".to_string()],
            vec![
                vec![Some(Value::Integer(9_007_199_254_740_993))],
                vec![Some(Value::Integer(-9_007_199_254_740_993))],
                vec![Some(Value::Integer(42))],
            ],
        )
        .unwrap();
        write(&table, &path, &WriteOptions::default()).unwrap();
        let loaded = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(
            loaded.get(0, "id"),
            Some(&Some(Value::from("9007199254740993")))
        );
        assert_eq!(
            loaded.get(1, "id"),
            Some(&Some(Value::from("-9007199254740993")))
        );
        let small = loaded.get(2, "id").unwrap().as_ref().unwrap();
        assert_eq!(small.as_display(), "42");
    }

    #[test]
    fn sheet_positions_out_of_range_are_format_errors() {
        let path = Path::new("wide.xlsx");
        assert_eq!(sheet_position(3, 2, path).unwrap(), (3, 2));
        let err = sheet_position(0, 70_000, path).unwrap_err();
        assert_eq!(err.kind(), "FileFormatError");
        assert!(err.to_string().contains("column 70000"));
    }

    #[test]
    fn read_only_destination_is_left_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.csv");
        fs::write(&path, "a\n1\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let err = write(&sample(), &path, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "WritePermissionError");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn backup_copies_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "old\n").unwrap();
        let options = WriteOptions {
            backup: true,
            ..WriteOptions::default()
        };
        let backup = write(&sample(), &path, &options).unwrap().expect("backup path");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old\n");
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("people."));
        assert!(name.ends_with(".bak.csv"));
    }

    #[test]
    fn non_utf8_output_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        let table = Table::new(vec!["name".to_string()], vec![vec![Some(Value::from("café"))]])
            .unwrap();
        let options = WriteOptions {
            encoding: encoding_rs::WINDOWS_1252,
            ..WriteOptions::default()
        };
        write(&table, &path, &options).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"name\ncaf\xe9\n");
    }
}
