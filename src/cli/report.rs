use std::collections::BTreeMap;

use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::cli::{federal_source, region_filter, Level};
use crate::dataset::{self, Dataset, TOTAL_LABEL};
use crate::engine::{self, Granularity, Request};
use crate::error::{FiscoError, Result};
use crate::fmt::{money, percent};

/// Resolve the effective year range: explicit flags win, the dataset's own
/// bounds fill the gaps. None means there is nothing to report on at all.
fn year_range(ds: &Dataset, from: Option<i32>, to: Option<i32>) -> Option<(i32, i32)> {
    match (from, to, ds.year_bounds()) {
        (Some(a), Some(b), _) => Some((a, b)),
        (a, b, Some((min, max))) => Some((a.unwrap_or(min), b.unwrap_or(max))),
        _ => None,
    }
}

fn category_or_default(category: Option<String>) -> String {
    category.unwrap_or_else(|| TOTAL_LABEL.to_string())
}

#[allow(clippy::too_many_arguments)]
pub fn series(
    data_dir: &Option<String>,
    source: &Option<String>,
    category: Option<String>,
    uf: Option<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    level: Level,
    top: usize,
) -> Result<()> {
    let ds = dataset::load_federal(&federal_source(data_dir, source))?;
    let Some(years) = year_range(&ds, from_year, to_year) else {
        println!("Sem dados de arrecadação na fonte.");
        return Ok(());
    };

    let req = Request {
        region: region_filter(&uf),
        years,
        months: None,
        category: category_or_default(category),
        granularity: level.into(),
    };
    let points = engine::bucket(&ds, &req)?;
    if points.is_empty() {
        println!("Não há dados de arrecadação para esses filtros (UF ou período).");
        return Ok(());
    }

    let ranked = engine::top_k(&points, top);
    let label = ds.catalog().display_label(&req.category);

    let mut table = Table::new();
    table.set_header(vec![
        "Período".to_string(),
        "UF".to_string(),
        format!("{label} (R$)"),
    ]);
    for p in &ranked.points {
        table.add_row(vec![
            Cell::new(p.period.to_string()),
            Cell::new(&p.region),
            Cell::new(money(p.value)),
        ]);
    }

    let scope = match level {
        Level::Anual => "Série Anual",
        Level::Mensal => "Série Mensal",
    };
    println!("{scope} de {label} ({}–{})\n{table}", years.0, years.1);
    println!(
        "UFs exibidas (top {}): {}",
        ranked.regions.len(),
        ranked.regions.join(", ")
    );
    Ok(())
}

#[derive(Serialize)]
struct MapCell {
    valor_medio: f64,
    formatado: String,
}

#[allow(clippy::too_many_arguments)]
pub fn map(
    data_dir: &Option<String>,
    source: &Option<String>,
    category: Option<String>,
    uf: Option<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    json: bool,
) -> Result<()> {
    let ds = dataset::load_federal(&federal_source(data_dir, source))?;
    let Some(years) = year_range(&ds, from_year, to_year) else {
        println!("Sem dados de arrecadação na fonte.");
        return Ok(());
    };

    let req = Request {
        region: region_filter(&uf),
        years,
        months: None,
        category: category_or_default(category),
        granularity: Granularity::Monthly,
    };
    let means = engine::mean_by_region(&ds, &req)?;
    if means.is_empty() {
        println!("Não há dados suficientes para gerar a tabela ou o mapa.");
        return Ok(());
    }

    let label = ds.catalog().display_label(&req.category);

    if json {
        // Keyed by UF code, matching the `sigla` property of the boundary
        // lookup the choropleth renderer uses.
        let payload: BTreeMap<&String, MapCell> = means
            .iter()
            .map(|(region, v)| {
                (
                    region,
                    MapCell {
                        valor_medio: *v,
                        formatado: money(*v),
                    },
                )
            })
            .collect();
        let out = serde_json::to_string_pretty(&payload)
            .map_err(|e| FiscoError::Other(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["UF", "Valor Médio (R$)"]);
    for (region, value) in &means {
        table.add_row(vec![Cell::new(region), Cell::new(money(*value))]);
    }
    println!("Média Mensal de {label} por UF ({}–{})\n{table}", years.0, years.1);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn growth(
    data_dir: &Option<String>,
    source: &Option<String>,
    category: Option<String>,
    uf: Option<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    start: Option<i32>,
    end: Option<i32>,
) -> Result<()> {
    let ds = dataset::load_federal(&federal_source(data_dir, source))?;
    let Some(years) = year_range(&ds, from_year, to_year) else {
        println!("Sem dados de arrecadação na fonte.");
        return Ok(());
    };
    let start = start.unwrap_or(years.0);
    let end = end.unwrap_or(years.1);

    let req = Request {
        region: region_filter(&uf),
        years,
        months: None,
        category: category_or_default(category),
        granularity: Granularity::Annual,
    };

    let report = match engine::percent_change(&ds, &req, start, end) {
        Ok(r) => r,
        // Informational, not a failure: the requested boundary simply is
        // not inside the filtered range.
        Err(FiscoError::NoDataForBoundaryYear { year, from, to }) => {
            println!(
                "Não há valores de {year} dentro do intervalo {from}–{to} para calcular o crescimento percentual."
            );
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let label = ds.catalog().display_label(&req.category);
    println!(
        "Crescimento Percentual de {label} ({} → {})",
        report.start_year, report.end_year
    );

    if report.changes.is_empty() {
        println!("Não há dados completos para calcular o crescimento percentual.");
        return Ok(());
    }

    let decliners = report.top_decliners();
    if decliners.is_empty() {
        println!("\nNenhuma UF com queda no período.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["UF", "Queda (%)"]);
        for c in decliners {
            table.add_row(vec![
                Cell::new(&c.region),
                Cell::new(percent(c.percent).red().to_string()),
            ]);
        }
        println!("\nMaiores quedas\n{table}");
    }

    let gainers = report.top_gainers();
    if gainers.is_empty() {
        println!("\nNenhuma UF com crescimento no período.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["UF", "Crescimento (%)"]);
        for c in gainers {
            table.add_row(vec![
                Cell::new(&c.region),
                Cell::new(percent(c.percent).green().to_string()),
            ]);
        }
        println!("\nMaiores crescimentos\n{table}");
    }
    Ok(())
}
