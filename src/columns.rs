//! Finds which column of an uploaded table plays a given role.
//!
//! Matching is a case-insensitive substring test of each synonym against each
//! column name. Columns are tried in file order and the first hit wins, so a
//! column like "Repository" placed before "Sale Rep" is picked for the rep
//! role.

use crate::error::{InputKind, ReportError, Result};
use crate::models::{ColumnRole, Config, ResolvedColumns, Table};
use tracing::{info, warn};

/// Returns the first column name containing any of `synonyms`.
pub fn resolve<'a, S: AsRef<str>>(column_names: &'a [String], synonyms: &[S]) -> Option<&'a str> {
    let synonyms: Vec<String> = synonyms
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .collect();

    column_names
        .iter()
        .find(|column| {
            let column = column.to_lowercase();
            synonyms.iter().any(|name| column.contains(name.as_str()))
        })
        .map(|column| column.as_str())
}

pub fn resolve_role<'a>(table: &'a Table, role: ColumnRole, config: &Config) -> Option<&'a str> {
    resolve(&table.columns, config.synonyms_for(role))
}

/// Resolves every role across both tables. Only the rep role is required.
pub fn resolve_columns(raw: &Table, roster: &Table, config: &Config) -> Result<ResolvedColumns> {
    let raw_rep = resolve_role(raw, ColumnRole::Rep, config).ok_or_else(|| {
        ReportError::UnresolvedRequiredColumn {
            table: InputKind::Raw,
            columns: raw.columns.clone(),
        }
    })?;
    let roster_rep = resolve_role(roster, ColumnRole::Rep, config).ok_or_else(|| {
        ReportError::UnresolvedRequiredColumn {
            table: InputKind::Roster,
            columns: roster.columns.clone(),
        }
    })?;

    let team = resolve_role(roster, ColumnRole::Team, config);
    let manager = resolve_role(roster, ColumnRole::Manager, config);

    info!("Rep column: '{}' (raw), '{}' (roster)", raw_rep, roster_rep);
    for (role, column) in [(ColumnRole::Team, team), (ColumnRole::Manager, manager)] {
        match column {
            Some(name) => info!("{} column: '{}'", role, name),
            None => warn!("No {} column in roster, team breakdown will be empty", role),
        }
    }

    Ok(ResolvedColumns {
        raw_rep: raw_rep.to_string(),
        roster_rep: roster_rep.to_string(),
        team: team.map(str::to_string),
        manager: manager.map(str::to_string),
    })
}
