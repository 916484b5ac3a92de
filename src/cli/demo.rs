use rusqlite::params;

use crate::db::create_demo_db;
use crate::error::Result;
use crate::settings::{resolve_data_dir, FEDERAL_DB};

// (sigla, nome, base monthly volume, yearly trend)
const UFS: &[(&str, &str, f64, f64)] = &[
    ("SP", "São Paulo", 520.0, 0.045),
    ("RJ", "Rio de Janeiro", 310.0, -0.012),
    ("MG", "Minas Gerais", 240.0, 0.035),
    ("RS", "Rio Grande do Sul", 180.0, 0.028),
    ("PR", "Paraná", 160.0, 0.032),
    ("BA", "Bahia", 140.0, 0.025),
    ("PE", "Pernambuco", 90.0, 0.030),
    ("AM", "Amazonas", 70.0, 0.038),
];

/// Relative weight of each tax category within a state's volume, in the
/// column order of the demo schema.
const CATEGORY_WEIGHTS: &[f64] = &[0.6, 0.9, 1.4, 1.2, 1.6, 0.7];

/// Mild seasonality: January and December peak with filing deadlines.
const MONTH_FACTOR: [f64; 12] = [
    1.10, 0.92, 0.98, 1.00, 0.97, 0.95, 1.02, 0.99, 0.96, 1.01, 0.98, 1.12,
];

const FIRST_YEAR: i32 = 2000;
const LAST_YEAR: i32 = 2024;

/// Seed a deterministic sample collection table covering 2000-2024 for a
/// handful of states, shaped like the real ETL output. Rio declines over
/// the range so the growth report has something to show on both sides.
pub fn run(data_dir: &Option<String>) -> Result<()> {
    let dir = resolve_data_dir(data_dir);
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join(FEDERAL_DB);
    let mut conn = create_demo_db(&db_path)?;

    let tx = conn.transaction()?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO arrecadacao_federal
             (ano, mes, sigla_uf, sigla_uf_nome, imposto_importacao, ipi, irpf, irpj, cofins, csll)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for &(sigla, nome, base, trend) in UFS {
            for year in FIRST_YEAR..=LAST_YEAR {
                let growth = 1.0 + trend * (year - FIRST_YEAR) as f64;
                for month in 1..=12u32 {
                    let season = MONTH_FACTOR[(month - 1) as usize];
                    let v: Vec<f64> = CATEGORY_WEIGHTS
                        .iter()
                        .map(|w| (base * w * growth * season * 1_000_000.0 * 100.0).round() / 100.0)
                        .collect();
                    stmt.execute(params![
                        year, month, sigla, nome, v[0], v[1], v[2], v[3], v[4], v[5],
                    ])?;
                    inserted += 1;
                }
            }
        }
    }
    tx.commit()?;

    println!(
        "Base de exemplo criada em {} ({inserted} registros, {FIRST_YEAR}–{LAST_YEAR}).",
        db_path.display()
    );
    println!("Experimente: fisco report series --level anual");
    Ok(())
}
