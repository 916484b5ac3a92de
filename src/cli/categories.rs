use comfy_table::{Cell, Table};

use crate::cli::federal_source;
use crate::dataset;
use crate::error::Result;

pub fn run(data_dir: &Option<String>, source: &Option<String>) -> Result<()> {
    let ds = dataset::load_federal(&federal_source(data_dir, source))?;

    let mut table = Table::new();
    table.set_header(vec!["Tributo", "Coluna"]);
    for (label, key) in ds.catalog().entries() {
        table.add_row(vec![Cell::new(label), Cell::new(key)]);
    }
    println!("Categorias\n{table}");
    Ok(())
}
