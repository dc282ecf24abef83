use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Managers whose whole team is left out of the team breakdown.
    pub suppressed_managers: Vec<String>,
    // Column detection synonyms, matched as case-insensitive substrings
    pub rep_synonyms: Vec<String>,
    pub team_synonyms: Vec<String>,
    pub manager_synonyms: Vec<String>,
    pub output_directory: Option<String>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suppressed_managers: vec!["Michael Grabowski".to_string()],
            rep_synonyms: ColumnRole::Rep.default_synonyms(),
            team_synonyms: ColumnRole::Team.default_synonyms(),
            manager_synonyms: ColumnRole::Manager.default_synonyms(),
            output_directory: Some("output".to_string()),
            log_level: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_path).map_err(|e| ReportError::Config {
            path: file_path.to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ReportError::Config {
            path: file_path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn save_to_file(&self, file_path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ReportError::Config {
            path: file_path.to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(file_path, content).map_err(|e| ReportError::Config {
            path: file_path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn synonyms_for(&self, role: ColumnRole) -> &[String] {
        match role {
            ColumnRole::Rep => &self.rep_synonyms,
            ColumnRole::Team => &self.team_synonyms,
            ColumnRole::Manager => &self.manager_synonyms,
        }
    }

    /// Case-insensitive, whitespace-trimmed match against the suppression list.
    pub fn is_suppressed_manager(&self, manager: &Cell) -> bool {
        match manager.as_str() {
            Some(name) => {
                let name = name.trim().to_lowercase();
                self.suppressed_managers
                    .iter()
                    .any(|suppressed| suppressed.trim().to_lowercase() == name)
            }
            None => false,
        }
    }
}

/// A table value. `Empty` is the explicit "value absent" marker and is
/// distinct from both `"0"` and a real empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Text(String),
    Empty,
}

/// Field spellings read as a missing value when loading CSV input.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

impl Cell {
    pub fn from_field(field: &str) -> Self {
        if NA_TOKENS.contains(&field) {
            Cell::Empty
        } else {
            Cell::text(field)
        }
    }

    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Finite numeric value of the text, if it reads as a number.
    pub fn as_number(&self) -> Option<f64> {
        self.as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
    }

    /// Display form: the empty marker renders as an empty string.
    pub fn display(&self) -> &str {
        self.as_str().unwrap_or("")
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Numbers order by value and come before other text, text orders by bytes,
/// and the empty marker sorts last. Equal numbers fall back to their text.
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Empty, Cell::Empty) => Ordering::Equal,
            (Cell::Empty, _) => Ordering::Greater,
            (_, Cell::Empty) => Ordering::Less,
            (Cell::Text(a), Cell::Text(b)) => match (self.as_number(), other.as_number()) {
                (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Empty => serializer.serialize_none(),
        }
    }
}

/// Rows keep the source file order; every row has one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Rep,
    Team,
    Manager,
}

impl ColumnRole {
    pub fn default_synonyms(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ColumnRole::Rep => &["Sale Rep", "Rep", "SalesRep", "Agent"],
            ColumnRole::Team => &["Team", "Team Name", "Sales Team"],
            ColumnRole::Manager => &["Manager", "Sales Manager"],
        };
        names.iter().map(|n| n.to_string()).collect()
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Rep => write!(f, "rep"),
            ColumnRole::Team => write!(f, "team"),
            ColumnRole::Manager => write!(f, "manager"),
        }
    }
}

/// Column names bound to each role for one pair of input tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub raw_rep: String,
    pub roster_rep: String,
    pub team: Option<String>,
    pub manager: Option<String>,
}

/// A roster row after the join, with the install count attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub cells: Vec<Cell>,
    pub installs: u64,
}

impl ReconciledRow {
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepInstalls {
    #[serde(rename = "Rep")]
    pub rep: Cell,
    #[serde(rename = "Installs")]
    pub installs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamGroup {
    pub team: String,
    pub manager: Cell,
    pub manager_installs: u64,
    pub total: u64,
    pub reps: Vec<RepInstalls>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Roster column the rep identifiers were read from.
    pub rep_column: String,
    /// Roster column names, in file order, for `top_reps` cells.
    pub columns: Vec<String>,
    pub top_reps: Vec<ReconciledRow>,
    pub zero_reps: Vec<Cell>,
    pub team_breakdown: Vec<TeamGroup>,
}

impl Report {
    pub fn total_installs(&self) -> u64 {
        self.top_reps.iter().map(|r| r.installs).sum()
    }

    /// Zero-install reps as display strings.
    pub fn zero_rep_names(&self) -> Vec<String> {
        self.zero_reps.iter().map(|c| c.display().to_string()).collect()
    }

    pub fn rep_of<'a>(&self, row: &'a ReconciledRow) -> &'a Cell {
        match self.columns.iter().position(|c| *c == self.rep_column) {
            Some(index) => row.cell(index),
            None => &Cell::Empty,
        }
    }
}

struct RowRecord<'a> {
    columns: &'a [String],
    row: &'a ReconciledRow,
}

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 1))?;
        for (index, column) in self.columns.iter().enumerate() {
            if column != "Installs" {
                map.serialize_entry(column, self.row.cell(index))?;
            }
        }
        map.serialize_entry("Installs", &self.row.installs)?;
        map.end()
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let top_reps: Vec<RowRecord<'_>> = self
            .top_reps
            .iter()
            .map(|row| RowRecord { columns: &self.columns, row })
            .collect();

        let mut state = serializer.serialize_struct("Report", 4)?;
        state.serialize_field("rep_column", &self.rep_column)?;
        state.serialize_field("top_reps", &top_reps)?;
        state.serialize_field("zero_reps", &self.zero_rep_names())?;
        state.serialize_field("team_breakdown", &self.team_breakdown)?;
        state.end()
    }
}
