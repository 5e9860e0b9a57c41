use crate::error::Result;
use crate::schema::{Cell, RawSheet, Workbook};
use crate::utils::parse_date_string;
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use log::{debug, warn};
use std::path::Path;

/// Reads every sheet of an xlsx workbook into typed in-memory tables.
///
/// Only a file that cannot be opened or parsed as a workbook container is an
/// error; from here on, problems degrade per sheet or per row.
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let mut xlsx: Xlsx<_> = open_workbook(path.as_ref())?;
    let mut workbook = Workbook::default();

    let names = xlsx.sheet_names().to_owned();
    for name in names {
        let range = match xlsx.worksheet_range(&name) {
            Ok(range) => range,
            Err(err) => {
                warn!("Skipping unreadable sheet '{}': {}", name, err);
                continue;
            }
        };
        let rows: Vec<Vec<Cell>> = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();
        let sheet = sheet_from_rows(&name, rows);
        debug!(
            "Loaded sheet '{}': {} columns, {} data rows",
            name,
            sheet.headers.len(),
            sheet.rows.len()
        );
        workbook.insert(sheet);
    }

    Ok(workbook)
}

/// Builds a `RawSheet` from already-typed rows; the first row is the header.
/// Trailing fully-blank rows, common in exported sheets, are dropped.
pub fn sheet_from_rows(name: &str, rows: Vec<Vec<Cell>>) -> RawSheet {
    let mut iter = rows.into_iter();
    let headers: Vec<String> = iter
        .next()
        .map(|row| row.iter().map(header_string).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<Cell>> = iter
        .filter(|row| !row.iter().all(Cell::is_blank))
        .collect();

    RawSheet {
        name: name.to_string(),
        headers,
        rows,
    }
}

fn header_string(cell: &Cell) -> String {
    match cell {
        // Month columns sometimes arrive as real date cells; render them as
        // a label the reshaper recognizes.
        Cell::Date(d) => d.format("%b-%y").to_string(),
        other => other.as_text().unwrap_or_default(),
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => parse_date_string(s).map(Cell::Date).unwrap_or(Cell::Empty),
        Data::DurationIso(_) | Data::Error(_) => Cell::Empty,
    }
}

/// Excel serial dates count days from 1899-12-30.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.floor() as i64))
}
