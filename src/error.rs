use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FiscoError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Excel(String),

    #[error("Database not found at {0}\nRun the ETL first, or `fisco demo` to seed sample data.")]
    DatabaseNotFound(PathBuf),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Boundary year {year} is outside the filtered range {from}\u{2013}{to}")]
    NoDataForBoundaryYear { year: i32, from: i32, to: i32 },

    #[error("Invalid year range: {0} > {1}")]
    InvalidYearRange(i32, i32),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FiscoError>;
