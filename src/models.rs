use crate::error::{FiscoError, Result};

/// Columns that identify a row rather than carry a tax value. Anything in
/// this set is never treated as a category column, whichever source it
/// appears in.
pub const IDENTIFIER_COLUMNS: &[&str] = &[
    "ano",
    "mes",
    "ano_mes",
    "sigla_uf",
    "sigla_uf_nome",
    "natureza_juridica_codigo_descricao",
];

/// Which source table a dataset was loaded from. The federal table is keyed
/// by state abbreviation; the CNAE workbook is keyed by legal-entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Federal,
    Entities,
}

impl SourceKind {
    pub fn region_column(&self) -> &'static str {
        match self {
            Self::Federal => "sigla_uf",
            Self::Entities => "natureza_juridica_codigo_descricao",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Federal => "arrecadacao_federal",
            Self::Entities => "arrecadacao_cnae",
        }
    }

    /// State abbreviations are folded to trimmed uppercase on load; entity
    /// descriptions keep their casing and are only trimmed.
    pub fn normalize_regions(&self) -> bool {
        matches!(self, Self::Federal)
    }
}

/// One source cell before coercion. `Missing` covers NULL/empty cells,
/// `Unparsed` text that failed numeric parsing; both aggregate as zero, but
/// only `Unparsed` counts against the schema tolerance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Num(f64),
    Missing,
    Unparsed,
}

/// One source row with identifiers extracted and category cells still raw,
/// in the column order reported by the loader.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub year: i32,
    pub month: u32,
    pub region: String,
    pub values: Vec<RawValue>,
}

/// Loader-neutral table handed to `Dataset::from_table`.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub kind: SourceKind,
    pub category_columns: Vec<String>,
    pub rows: Vec<SourceRow>,
}

/// One fully-coerced dataset row. `values` is parallel to the catalog's
/// column keys; `total` is always derived from `values`, never read from
/// the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub year: i32,
    pub month: u32,
    pub region: String,
    pub values: Vec<f64>,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Column layout discovery
// ---------------------------------------------------------------------------

/// Positions of the identifier columns and the (index, name) list of
/// category columns within a source header.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub year: usize,
    pub month: usize,
    pub region: usize,
    pub categories: Vec<(usize, String)>,
}

impl ColumnLayout {
    pub fn locate(columns: &[String], kind: SourceKind) -> Result<Self> {
        let find = |name: &str| columns.iter().position(|c| c == name);

        let year = find("ano")
            .ok_or_else(|| FiscoError::InvalidSchema("missing column 'ano'".into()))?;
        let month = find("mes")
            .ok_or_else(|| FiscoError::InvalidSchema("missing column 'mes'".into()))?;
        let region = find(kind.region_column()).ok_or_else(|| {
            FiscoError::InvalidSchema(format!("missing column '{}'", kind.region_column()))
        })?;

        let categories: Vec<(usize, String)> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !IDENTIFIER_COLUMNS.contains(&c.as_str()))
            .map(|(i, c)| (i, c.clone()))
            .collect();

        Ok(Self {
            year,
            month,
            region,
            categories,
        })
    }
}
