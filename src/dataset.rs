use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use sha2::{Digest, Sha256};

use crate::db;
use crate::error::{FiscoError, Result};
use crate::importer;
use crate::models::{Observation, RawValue, SourceKind, SourceTable};

/// Column key of the synthetic total category. A column with this name in
/// the source is dropped and re-derived, never trusted.
pub const TOTAL_KEY: &str = "receita_total";
pub const TOTAL_LABEL: &str = "Receita Total";

/// Share of unparseable non-null cells beyond which a category column is
/// rejected as non-numeric.
const UNPARSED_TOLERANCE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Category catalog
// ---------------------------------------------------------------------------

/// Resolved category selector: either the derived total or an index into an
/// observation's value vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySel {
    Total,
    Column(usize),
}

/// Mapping between display labels and category column keys, derived once
/// from the source header. The synthetic "Receita Total" entry is always
/// present.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    keys: Vec<String>,
    labels: Vec<(String, String)>,
}

impl CategoryCatalog {
    fn new(keys: Vec<String>) -> Self {
        let mut labels: Vec<(String, String)> = keys
            .iter()
            .map(|k| (clean_label(k), k.clone()))
            .collect();
        labels.push((TOTAL_LABEL.to_string(), TOTAL_KEY.to_string()));
        labels.sort();
        Self { keys, labels }
    }

    /// Accepts either a display label ("Cofins entidades financeiras") or a
    /// raw column key ("cofins_entidades_financeiras").
    pub fn resolve(&self, name: &str) -> Result<CategorySel> {
        let name = name.trim();
        if name == TOTAL_KEY || name.eq_ignore_ascii_case(TOTAL_LABEL) {
            return Ok(CategorySel::Total);
        }
        if let Some(idx) = self.keys.iter().position(|k| k == name) {
            return Ok(CategorySel::Column(idx));
        }
        if let Some((_, key)) = self.labels.iter().find(|(label, _)| label == name) {
            if let Some(idx) = self.keys.iter().position(|k| k == key) {
                return Ok(CategorySel::Column(idx));
            }
        }
        Err(FiscoError::UnknownCategory(name.to_string()))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// (display label, column key) pairs sorted by label, total included.
    pub fn entries(&self) -> &[(String, String)] {
        &self.labels
    }

    pub fn display_label(&self, name: &str) -> String {
        match self.resolve(name) {
            Ok(CategorySel::Total) => TOTAL_LABEL.to_string(),
            Ok(CategorySel::Column(idx)) => clean_label(&self.keys[idx]),
            Err(_) => name.to_string(),
        }
    }
}

/// `cofins_entidades_financeiras` -> `Cofins entidades financeiras`.
pub fn clean_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Trim and uppercase a region code so `" sp "` and `"SP"` share a key.
pub fn normalize_region(code: &str) -> String {
    code.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Immutable in-memory dataset: coerced observations plus the category
/// catalog derived from the source header.
#[derive(Debug, Clone)]
pub struct Dataset {
    catalog: CategoryCatalog,
    rows: Vec<Observation>,
}

impl Dataset {
    pub fn from_table(table: SourceTable) -> Result<Self> {
        let SourceTable {
            kind,
            mut category_columns,
            mut rows,
        } = table;

        // A source-provided total is dropped; the total is always re-derived
        // from the category columns so it cannot disagree with their sum.
        if let Some(idx) = category_columns.iter().position(|c| c == TOTAL_KEY) {
            category_columns.remove(idx);
            for row in &mut rows {
                if idx < row.values.len() {
                    row.values.remove(idx);
                }
            }
        }

        if category_columns.is_empty() {
            return Err(FiscoError::InvalidSchema(
                "no tax category columns found".into(),
            ));
        }

        for (i, col) in category_columns.iter().enumerate() {
            let mut unparsed = 0usize;
            let mut present = 0usize;
            for row in &rows {
                match row.values.get(i) {
                    Some(RawValue::Num(_)) => present += 1,
                    Some(RawValue::Unparsed) => {
                        unparsed += 1;
                        present += 1;
                    }
                    Some(RawValue::Missing) | None => {}
                }
            }
            if present > 0 && (unparsed as f64) > (present as f64) * UNPARSED_TOLERANCE {
                return Err(FiscoError::InvalidSchema(format!(
                    "column '{col}' is mostly non-numeric"
                )));
            }
        }

        // Catalog order is the sorted column names, independent of how the
        // source happened to enumerate them.
        let mut order: Vec<usize> = (0..category_columns.len()).collect();
        order.sort_by(|&a, &b| category_columns[a].cmp(&category_columns[b]));
        let keys: Vec<String> = order.iter().map(|&i| category_columns[i].clone()).collect();

        let normalize = kind.normalize_regions();
        let observations: Vec<Observation> = rows
            .into_iter()
            .map(|row| {
                let values: Vec<f64> = order
                    .iter()
                    .map(|&i| match row.values.get(i) {
                        Some(RawValue::Num(v)) => *v,
                        _ => 0.0,
                    })
                    .collect();
                let total = values.iter().sum();
                let region = if normalize {
                    normalize_region(&row.region)
                } else {
                    row.region.trim().to_string()
                };
                Observation {
                    year: row.year,
                    month: row.month,
                    region,
                    values,
                    total,
                }
            })
            .collect();

        Ok(Self {
            catalog: CategoryCatalog::new(keys),
            rows: observations,
        })
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn value(&self, row: &Observation, sel: CategorySel) -> f64 {
        match sel {
            CategorySel::Total => row.total,
            CategorySel::Column(idx) => row.values.get(idx).copied().unwrap_or(0.0),
        }
    }

    /// Sorted distinct region codes.
    pub fn regions(&self) -> Vec<String> {
        let mut out: Vec<String> = self.rows.iter().map(|r| r.region.clone()).collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let min = self.rows.iter().map(|r| r.year).min()?;
        let max = self.rows.iter().map(|r| r.year).max()?;
        Some((min, max))
    }
}

// ---------------------------------------------------------------------------
// Memoized loading
// ---------------------------------------------------------------------------

static CACHE: OnceLock<Mutex<HashMap<String, Arc<Dataset>>>> = OnceLock::new();

pub fn load_federal(path: &Path) -> Result<Arc<Dataset>> {
    load_cached(path, SourceKind::Federal)
}

pub fn load_entities(path: &Path) -> Result<Arc<Dataset>> {
    load_cached(path, SourceKind::Entities)
}

/// Load a dataset once per process per source. The cache key is the SHA-256
/// of the file contents, so an unchanged source always maps back to the same
/// immutable `Dataset`.
fn load_cached(path: &Path, kind: SourceKind) -> Result<Arc<Dataset>> {
    let key = format!("{}:{}", kind.table_name(), fingerprint(path)?);
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    {
        let guard = cache
            .lock()
            .map_err(|_| FiscoError::Other("dataset cache poisoned".into()))?;
        if let Some(ds) = guard.get(&key) {
            return Ok(Arc::clone(ds));
        }
    }
    let dataset = Arc::new(load_uncached(path, kind)?);
    let mut guard = cache
        .lock()
        .map_err(|_| FiscoError::Other("dataset cache poisoned".into()))?;
    Ok(Arc::clone(guard.entry(key).or_insert(dataset)))
}

fn load_uncached(path: &Path, kind: SourceKind) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let table = match ext.as_str() {
        "db" | "sqlite" | "sqlite3" => db::read_table(path, kind)?,
        "csv" => importer::read_csv(path, kind)?,
        #[cfg(feature = "cnae")]
        "xlsx" | "xlsm" | "xls" | "ods" => importer::read_workbook(path, kind)?,
        other => {
            return Err(FiscoError::Other(format!(
                "unsupported source format: .{other}"
            )))
        }
    };
    Dataset::from_table(table)
}

fn fingerprint(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(FiscoError::DatabaseNotFound(path.to_path_buf()));
    }
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
