use crate::cli::federal_source;
use crate::dataset;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{resolve_data_dir, ENTITIES_XLSX};

pub fn run(data_dir: &Option<String>) -> Result<()> {
    let dir = resolve_data_dir(data_dir);
    let db_path = federal_source(data_dir, &None);

    println!("Diretório:  {}", dir.display());
    println!("Fonte:      {}", db_path.display());

    if db_path.is_file() {
        let meta = std::fs::metadata(&db_path)?;
        println!("Tamanho:    {}", format_bytes(meta.len()));
        if let Ok(modified) = meta.modified() {
            let when: chrono::DateTime<chrono::Local> = modified.into();
            println!("Modificado: {}", when.format("%Y-%m-%d %H:%M"));
        }

        let ds = dataset::load_federal(&db_path)?;
        println!();
        println!("Registros:   {}", ds.len());
        if let Some((min, max)) = ds.year_bounds() {
            println!("Anos:        {min}–{max}");
        }
        println!("UFs:         {}", ds.regions().len());
        println!("Categorias:  {}", ds.catalog().keys().len());
    } else {
        println!();
        println!("Fonte não encontrada. Rode o ETL ou `fisco demo` para dados de exemplo.");
    }

    let xlsx_path = dir.join(ENTITIES_XLSX);
    if xlsx_path.is_file() {
        println!();
        println!("Planilha CNAE: {}", xlsx_path.display());
    }

    Ok(())
}
