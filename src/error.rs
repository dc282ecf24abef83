use std::fmt;
use thiserror::Error;

/// Which of the two uploaded tables an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Raw,
    Roster,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Raw => write!(f, "raw install log"),
            InputKind::Roster => write!(f, "rep roster"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Please upload both required CSV files ({which} is missing)")]
    MissingInput { which: InputKind },

    #[error("Could not find a Sales Rep column in one of the files ({table}; columns: {})", .columns.join(", "))]
    UnresolvedRequiredColumn { table: InputKind, columns: Vec<String> },

    #[error("Malformed table {source_name}: {reason}")]
    MalformedTable { source_name: String, reason: String },

    #[error("Configuration error in {path}: {reason}")]
    Config { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ReportError>;
