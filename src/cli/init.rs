use crate::error::Result;
use crate::settings::{resolve_data_dir, save_settings, Settings, FEDERAL_DB};

pub fn run(data_dir: &Option<String>) -> Result<()> {
    let dir = resolve_data_dir(data_dir);
    std::fs::create_dir_all(&dir)?;

    let settings = Settings {
        data_dir: dir.to_string_lossy().to_string(),
    };
    save_settings(&settings)?;
    println!("Diretório de dados: {}", dir.display());

    let db_path = dir.join(FEDERAL_DB);
    if db_path.is_file() {
        println!("Fonte encontrada: {}", db_path.display());
    } else {
        println!(
            "Nenhum {FEDERAL_DB} encontrado. Rode o ETL para gerá-lo, ou `fisco demo` para dados de exemplo."
        );
    }
    Ok(())
}
