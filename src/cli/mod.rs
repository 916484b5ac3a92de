pub mod categories;
pub mod demo;
#[cfg(feature = "cnae")]
pub mod entities;
pub mod init;
pub mod report;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::engine::Granularity;
use crate::settings;

// ---------------------------------------------------------------------------
// Shared argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn federal_source(data_dir: &Option<String>, source: &Option<String>) -> PathBuf {
    match source {
        Some(path) => PathBuf::from(path),
        None => settings::resolve_data_dir(data_dir).join(settings::FEDERAL_DB),
    }
}

#[cfg(feature = "cnae")]
pub(crate) fn entities_source(data_dir: &Option<String>, source: &Option<String>) -> PathBuf {
    match source {
        Some(path) => PathBuf::from(path),
        None => settings::resolve_data_dir(data_dir).join(settings::ENTITIES_XLSX),
    }
}

/// "todas"/"all" (any case) or an empty string clears the filter.
pub(crate) fn region_filter(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| {
            !v.is_empty() && !v.eq_ignore_ascii_case("todas") && !v.eq_ignore_ascii_case("all")
        })
}

/// Time detail of a series: yearly sums or raw monthly values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Level {
    Anual,
    Mensal,
}

impl From<Level> for Granularity {
    fn from(level: Level) -> Self {
        match level {
            Level::Anual => Granularity::Annual,
            Level::Mensal => Granularity::Monthly,
        }
    }
}

// ---------------------------------------------------------------------------
// Command tree
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "fisco",
    about = "Reporting CLI for Brazilian federal tax-collection data."
)]
pub struct Cli {
    /// Override the configured data directory.
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up fisco: choose the data directory holding the ETL output.
    Init,
    /// Show the configured sources and a dataset summary.
    Status,
    /// List the tax categories discovered in the dataset.
    Categories {
        /// Source file (default: <data_dir>/tributos.db)
        #[arg(long)]
        source: Option<String>,
    },
    /// Seed a deterministic sample tributos.db to explore fisco.
    Demo,
    /// Reports over the federal collection table.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Reports over the legal-entity (CNAE) collection workbook.
    #[cfg(feature = "cnae")]
    Entities {
        #[command(subcommand)]
        command: EntitiesCommands,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Time series of a category per UF, restricted to the top-K states.
    Series {
        /// Category label or column key (default: Receita Total)
        #[arg(long)]
        category: Option<String>,
        /// UF filter, e.g. SP (default: todas)
        #[arg(long)]
        uf: Option<String>,
        /// First year of the range (default: first year in the data)
        #[arg(long = "from")]
        from_year: Option<i32>,
        /// Last year of the range (default: last year in the data)
        #[arg(long = "to")]
        to_year: Option<i32>,
        /// Detail level
        #[arg(long, value_enum, default_value = "mensal")]
        level: Level,
        /// How many states to keep in the chart data
        #[arg(long, default_value_t = 5)]
        top: usize,
        /// Source file (default: <data_dir>/tributos.db)
        #[arg(long)]
        source: Option<String>,
    },
    /// Per-UF mean of a category: table, or JSON for the choropleth renderer.
    Map {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        uf: Option<String>,
        #[arg(long = "from")]
        from_year: Option<i32>,
        #[arg(long = "to")]
        to_year: Option<i32>,
        /// Emit the region/value mapping as JSON instead of a table.
        #[arg(long)]
        json: bool,
        #[arg(long)]
        source: Option<String>,
    },
    /// Percentage growth/decline per UF between two boundary years.
    Growth {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        uf: Option<String>,
        #[arg(long = "from")]
        from_year: Option<i32>,
        #[arg(long = "to")]
        to_year: Option<i32>,
        /// Start boundary year (default: start of the range)
        #[arg(long)]
        start: Option<i32>,
        /// End boundary year (default: end of the range)
        #[arg(long)]
        end: Option<i32>,
        #[arg(long)]
        source: Option<String>,
    },
}

#[cfg(feature = "cnae")]
#[derive(Subcommand)]
pub enum EntitiesCommands {
    /// Time series of a category summed across entity classes.
    Series {
        #[arg(long)]
        category: Option<String>,
        /// Entity class filter (default: todas)
        #[arg(long)]
        entity: Option<String>,
        #[arg(long = "from")]
        from_year: Option<i32>,
        #[arg(long = "to")]
        to_year: Option<i32>,
        /// Months to include, e.g. --months 1,2,12 (default: all)
        #[arg(long, value_delimiter = ',')]
        months: Vec<u32>,
        #[arg(long, value_enum, default_value = "mensal")]
        level: Level,
        /// Source file (default: <data_dir>/arrecadacao_cnae.xlsx)
        #[arg(long)]
        source: Option<String>,
    },
    /// Full ranking of entity classes by summed category, smallest first.
    Ranking {
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "from")]
        from_year: Option<i32>,
        #[arg(long = "to")]
        to_year: Option<i32>,
        #[arg(long, value_delimiter = ',')]
        months: Vec<u32>,
        #[arg(long)]
        source: Option<String>,
    },
}
