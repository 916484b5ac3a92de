use std::path::Path;

use crate::error::Result;
use crate::models::{ColumnLayout, RawValue, SourceKind, SourceRow, SourceTable};

#[cfg(feature = "cnae")]
use crate::error::FiscoError;

// ---------------------------------------------------------------------------
// Cell parsing helpers
// ---------------------------------------------------------------------------

/// Parse a numeric cell that may carry currency or grouping noise:
/// "1,234.56", "R$ 1.234,56", "(500.00)". Returns None when nothing numeric
/// remains.
pub fn parse_number(raw: &str) -> Option<f64> {
    let stripped = raw.replace("R$", "").replace('"', "").replace(' ', "");
    let mut s = stripped.trim().to_string();
    let parenthesized = s.starts_with('(') && s.ends_with(')') && s.len() > 2;
    if parenthesized {
        s = s[1..s.len() - 1].to_string();
    }

    let has_dot = s.contains('.');
    let has_comma = s.contains(',');
    let cleaned = if has_dot && has_comma {
        // The rightmost separator is the decimal point; the other one is
        // grouping.
        if s.rfind('.') > s.rfind(',') {
            s.replace(',', "")
        } else {
            s.replace('.', "").replace(',', ".")
        }
    } else if has_comma {
        // A lone comma with exactly two digits after it reads as a decimal
        // separator, anything else as grouping.
        let after = s.rsplit(',').next().unwrap_or("");
        if s.matches(',').count() == 1 && after.len() == 2 {
            s.replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else {
        s
    };

    let value: f64 = cleaned.parse().ok()?;
    Some(if parenthesized { -value } else { value })
}

fn raw_from_str(s: &str) -> RawValue {
    let s = s.trim();
    if s.is_empty() {
        return RawValue::Missing;
    }
    match parse_number(s) {
        Some(v) => RawValue::Num(v),
        None => RawValue::Unparsed,
    }
}

fn parse_month(s: &str) -> Option<u32> {
    let m: u32 = s.trim().parse().ok()?;
    (1..=12).contains(&m).then_some(m)
}

// ---------------------------------------------------------------------------
// CSV source
// ---------------------------------------------------------------------------

/// Read a flat CSV export with the same header shape as the SQLite table.
/// Rows with an unreadable year, month, or region are skipped.
pub fn read_csv(path: &Path, kind: SourceKind) -> Result<SourceTable> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let layout = ColumnLayout::locate(&columns, kind)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let Ok(record) = result else { continue };
        let Some(year) = record
            .get(layout.year)
            .and_then(|s| s.trim().parse::<i32>().ok())
        else {
            continue;
        };
        let Some(month) = record.get(layout.month).and_then(parse_month) else {
            continue;
        };
        let Some(region) = record
            .get(layout.region)
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            continue;
        };

        let values = layout
            .categories
            .iter()
            .map(|(i, _)| raw_from_str(record.get(*i).unwrap_or("")))
            .collect();
        rows.push(SourceRow {
            year,
            month,
            region: region.to_string(),
            values,
        });
    }

    Ok(SourceTable {
        kind,
        category_columns: layout.categories.iter().map(|(_, n)| n.clone()).collect(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// XLSX source (CNAE workbook)
// ---------------------------------------------------------------------------

/// Read the first sheet of an XLSX workbook, header row first. Used for the
/// legal-entity (CNAE) collection workbook.
#[cfg(feature = "cnae")]
pub fn read_workbook(path: &Path, kind: SourceKind) -> Result<SourceTable> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| FiscoError::Excel(format!("failed to open {}: {e}", path.display())))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| FiscoError::Excel("workbook has no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| FiscoError::Excel(format!("failed to read sheet '{sheet}': {e}")))?;

    let mut sheet_rows = range.rows();
    let header = sheet_rows
        .next()
        .ok_or_else(|| FiscoError::Excel(format!("sheet '{sheet}' is empty")))?;
    let columns: Vec<String> = header
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();
    let layout = ColumnLayout::locate(&columns, kind)?;

    let mut rows = Vec::new();
    for row in sheet_rows {
        let Some(year) = row.get(layout.year).and_then(sheet_cell_to_i64) else {
            continue;
        };
        let month = match row.get(layout.month).and_then(sheet_cell_to_i64) {
            Some(m @ 1..=12) => m as u32,
            _ => continue,
        };
        let region = match row.get(layout.region) {
            Some(Data::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => continue,
        };

        let values = layout
            .categories
            .iter()
            .map(|(i, _)| sheet_cell_to_raw(row.get(*i)))
            .collect();
        rows.push(SourceRow {
            year: year as i32,
            month,
            region,
            values,
        });
    }

    Ok(SourceTable {
        kind,
        category_columns: layout.categories.iter().map(|(_, n)| n.clone()).collect(),
        rows,
    })
}

#[cfg(feature = "cnae")]
fn sheet_cell_to_i64(cell: &calamine::Data) -> Option<i64> {
    use calamine::Data;
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(feature = "cnae")]
fn sheet_cell_to_raw(cell: Option<&calamine::Data>) -> RawValue {
    use calamine::Data;
    match cell {
        Some(Data::Int(i)) => RawValue::Num(*i as f64),
        Some(Data::Float(f)) => RawValue::Num(*f),
        Some(Data::String(s)) => raw_from_str(s),
        Some(Data::Empty) | None => RawValue::Missing,
        Some(_) => RawValue::Unparsed,
    }
}
