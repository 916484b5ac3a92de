mod cli;
mod dataset;
mod db;
mod engine;
mod error;
mod fmt;
mod importer;
mod models;
mod settings;

use clap::Parser;

#[cfg(feature = "cnae")]
use cli::EntitiesCommands;
use cli::{Cli, Commands, ReportCommands};

fn main() {
    let cli = Cli::parse();
    let data_dir = cli.data_dir;

    let result = match cli.command {
        Commands::Init => cli::init::run(&data_dir),
        Commands::Status => cli::status::run(&data_dir),
        Commands::Categories { source } => cli::categories::run(&data_dir, &source),
        Commands::Demo => cli::demo::run(&data_dir),
        Commands::Report { command } => match command {
            ReportCommands::Series {
                category,
                uf,
                from_year,
                to_year,
                level,
                top,
                source,
            } => cli::report::series(
                &data_dir, &source, category, uf, from_year, to_year, level, top,
            ),
            ReportCommands::Map {
                category,
                uf,
                from_year,
                to_year,
                json,
                source,
            } => cli::report::map(&data_dir, &source, category, uf, from_year, to_year, json),
            ReportCommands::Growth {
                category,
                uf,
                from_year,
                to_year,
                start,
                end,
                source,
            } => cli::report::growth(
                &data_dir, &source, category, uf, from_year, to_year, start, end,
            ),
        },
        #[cfg(feature = "cnae")]
        Commands::Entities { command } => match command {
            EntitiesCommands::Series {
                category,
                entity,
                from_year,
                to_year,
                months,
                level,
                source,
            } => cli::entities::series(
                &data_dir, &source, category, entity, from_year, to_year, months, level,
            ),
            EntitiesCommands::Ranking {
                category,
                from_year,
                to_year,
                months,
                source,
            } => cli::entities::ranking(&data_dir, &source, category, from_year, to_year, months),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
