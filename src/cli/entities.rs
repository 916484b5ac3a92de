use std::collections::BTreeMap;

use comfy_table::{Cell, Table};

use crate::cli::{entities_source, region_filter, Level};
use crate::dataset::{self, TOTAL_LABEL};
use crate::engine::{self, Granularity, Period, Request};
use crate::error::Result;
use crate::fmt::{money, month_name};

fn month_filter(months: &[u32]) -> Option<Vec<u32>> {
    if months.is_empty() {
        None
    } else {
        Some(months.to_vec())
    }
}

fn months_note(months: &Option<Vec<u32>>) -> Option<String> {
    let months = months.as_ref()?;
    let names: Vec<String> = months.iter().map(|&m| month_name(m)).collect();
    Some(names.join(", "))
}

#[allow(clippy::too_many_arguments)]
pub fn series(
    data_dir: &Option<String>,
    source: &Option<String>,
    category: Option<String>,
    entity: Option<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    months: Vec<u32>,
    level: Level,
) -> Result<()> {
    let ds = dataset::load_entities(&entities_source(data_dir, source))?;
    let Some((min, max)) = ds.year_bounds() else {
        println!("Sem dados na planilha de naturezas jurídicas.");
        return Ok(());
    };
    let years = (from_year.unwrap_or(min), to_year.unwrap_or(max));

    let req = Request {
        region: region_filter(&entity),
        years,
        months: month_filter(&months),
        category: category.unwrap_or_else(|| TOTAL_LABEL.to_string()),
        granularity: level.into(),
    };
    let points = engine::bucket(&ds, &req)?;
    if points.is_empty() {
        println!("Sem dados para estes filtros.");
        return Ok(());
    }

    // The series view sums across entity classes per period; a specific
    // --entity filter leaves a single class in the sum.
    let mut by_period: BTreeMap<Period, f64> = BTreeMap::new();
    for p in &points {
        *by_period.entry(p.period).or_default() += p.value;
    }

    let label = ds.catalog().display_label(&req.category);
    let mut table = Table::new();
    table.set_header(vec!["Período".to_string(), format!("{label} (R$)")]);
    for (period, value) in &by_period {
        table.add_row(vec![Cell::new(period.to_string()), Cell::new(money(*value))]);
    }

    let scope = match level {
        Level::Anual => "Receita Anual",
        Level::Mensal => "Receita Mensal",
    };
    let entity_note = req
        .region
        .as_deref()
        .map(|e| format!(" de {e}"))
        .unwrap_or_default();
    println!("{scope}{entity_note} ({}–{})\n{table}", years.0, years.1);
    if let Some(note) = months_note(&req.months) {
        println!("Meses: {note}");
    }
    Ok(())
}

pub fn ranking(
    data_dir: &Option<String>,
    source: &Option<String>,
    category: Option<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    months: Vec<u32>,
) -> Result<()> {
    let ds = dataset::load_entities(&entities_source(data_dir, source))?;
    let Some((min, max)) = ds.year_bounds() else {
        println!("Sem dados na planilha de naturezas jurídicas.");
        return Ok(());
    };
    let years = (from_year.unwrap_or(min), to_year.unwrap_or(max));

    let req = Request {
        region: None,
        years,
        months: month_filter(&months),
        category: category.unwrap_or_else(|| TOTAL_LABEL.to_string()),
        granularity: Granularity::Annual,
    };
    let points = engine::bucket(&ds, &req)?;
    if points.is_empty() {
        println!("Sem dados para ranking.");
        return Ok(());
    }

    let rows = engine::ranking(&points);
    let label = ds.catalog().display_label(&req.category);

    let mut table = Table::new();
    table.set_header(vec!["Natureza Jurídica".to_string(), format!("{label} (R$)")]);
    for (entity, value) in &rows {
        table.add_row(vec![Cell::new(entity), Cell::new(money(*value))]);
    }
    println!(
        "Naturezas Jurídicas ordenadas por {label} ({}–{})\n{table}",
        years.0, years.1
    );
    if let Some(note) = months_note(&req.months) {
        println!("Meses: {note}");
    }
    Ok(())
}
