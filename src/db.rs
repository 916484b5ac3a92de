use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::{FiscoError, Result};
use crate::importer::parse_number;
use crate::models::{ColumnLayout, RawValue, SourceKind, SourceRow, SourceTable};

/// Open the ETL-produced database read-only. The serving path never writes
/// to the source.
pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if !db_path.is_file() {
        return Err(FiscoError::DatabaseNotFound(db_path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Read the whole source table, discovering the category columns from the
/// statement header: every column not in the fixed identifier set is a tax
/// category. Rows with an unreadable year, month, or region are skipped.
pub fn read_table(db_path: &Path, kind: SourceKind) -> Result<SourceTable> {
    let conn = get_connection(db_path)?;
    read_table_from(&conn, kind)
}

pub fn read_table_from(conn: &Connection, kind: SourceKind) -> Result<SourceTable> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", kind.table_name()))?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let layout = ColumnLayout::locate(&columns, kind)?;

    let mut rows = Vec::new();
    let mut db_rows = stmt.query([])?;
    while let Some(row) = db_rows.next()? {
        let Some(year) = cell_to_i64(row.get_ref(layout.year)?) else {
            continue;
        };
        let month = match cell_to_i64(row.get_ref(layout.month)?) {
            Some(m @ 1..=12) => m as u32,
            _ => continue,
        };
        let region = match row.get_ref(layout.region)? {
            ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
            _ => continue,
        };
        if region.trim().is_empty() {
            continue;
        }

        let mut values = Vec::with_capacity(layout.categories.len());
        for (i, _) in &layout.categories {
            values.push(cell_to_raw(row.get_ref(*i)?));
        }
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

fn cell_to_raw(cell: ValueRef<'_>) -> RawValue {
    match cell {
        ValueRef::Integer(i) => RawValue::Num(i as f64),
        ValueRef::Real(f) => RawValue::Num(f),
        ValueRef::Text(t) => {
            let s = String::from_utf8_lossy(t);
            if s.trim().is_empty() {
                RawValue::Missing
            } else {
                match parse_number(&s) {
                    Some(v) => RawValue::Num(v),
                    None => RawValue::Unparsed,
                }
            }
        }
        ValueRef::Null => RawValue::Missing,
        ValueRef::Blob(_) => RawValue::Unparsed,
    }
}

fn cell_to_i64(cell: ValueRef<'_>) -> Option<i64> {
    match cell {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(t) => String::from_utf8_lossy(t).trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Demo database
// ---------------------------------------------------------------------------

/// Schema used by `fisco demo` to seed a sample collection table shaped
/// like the real ETL output.
pub const DEMO_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS arrecadacao_federal (
    ano INTEGER NOT NULL,
    mes INTEGER NOT NULL,
    sigla_uf TEXT NOT NULL,
    sigla_uf_nome TEXT,
    imposto_importacao REAL,
    ipi REAL,
    irpf REAL,
    irpj REAL,
    cofins REAL,
    csll REAL
);
";

pub fn create_demo_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(DEMO_SCHEMA)?;
    conn.execute("DELETE FROM arrecadacao_federal", [])?;
    Ok(conn)
}
