use crate::columns::resolve_columns;
use crate::error::Result;
use crate::models::{Cell, Config, ReconciledRow, RepInstalls, Report, Table, TeamGroup};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Install counts per rep identifier, as observed in the raw table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallCounts {
    counts: HashMap<Cell, u64>,
    first_seen: Vec<Cell>,
}

impl InstallCounts {
    pub fn get(&self, rep: &Cell) -> Option<u64> {
        self.counts.get(rep).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Highest count first; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<(&Cell, u64)> {
        let mut ranked: Vec<(&Cell, u64)> = self
            .first_seen
            .iter()
            .map(|rep| (rep, self.counts[rep]))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    fn record(&mut self, rep: &Cell) {
        match self.counts.get_mut(rep) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(rep.clone(), 1);
                self.first_seen.push(rep.clone());
            }
        }
    }
}

/// Counts every row of `raw` under its `rep_column` value. Empty identifiers
/// are counted under the empty marker; values are compared exactly.
pub fn aggregate(raw: &Table, rep_column: &str) -> InstallCounts {
    let mut counts = InstallCounts::default();
    let rep_index = raw.column_index(rep_column);

    for row in &raw.rows {
        let rep = rep_index.and_then(|i| row.get(i)).unwrap_or(&Cell::Empty);
        counts.record(rep);
    }

    counts
}

/// Left join of the roster against `counts`. One output row per roster row,
/// in roster order; reps absent from the raw table get zero installs.
/// Missing values were already normalized to `Cell::Empty` on load.
pub fn reconcile(roster: &Table, counts: &InstallCounts, roster_rep_column: &str) -> Vec<ReconciledRow> {
    let rep_index = roster.column_index(roster_rep_column);

    roster
        .rows
        .iter()
        .map(|row| {
            let rep = rep_index.and_then(|i| row.get(i)).unwrap_or(&Cell::Empty);
            ReconciledRow {
                cells: row.clone(),
                installs: counts.get(rep).unwrap_or(0),
            }
        })
        .collect()
}

/// Builds the leaderboard, the zero-install list and the team breakdown.
pub fn build_report(
    reconciled: &[ReconciledRow],
    columns: &[String],
    rep_column: &str,
    team_column: Option<&str>,
    manager_column: Option<&str>,
    config: &Config,
) -> Report {
    let position = |name: &str| columns.iter().position(|c| c == name);
    let rep_index = position(rep_column);
    let rep_of = |row: &ReconciledRow| -> Cell {
        rep_index.map(|i| row.cell(i).clone()).unwrap_or(Cell::Empty)
    };

    // Step 1: split active and inactive reps
    let (mut top_reps, inactive): (Vec<ReconciledRow>, Vec<ReconciledRow>) =
        reconciled.iter().cloned().partition(|row| row.installs > 0);

    // Step 2: leaderboard by installs descending (stable)
    top_reps.sort_by(|a, b| b.installs.cmp(&a.installs));

    // Step 3: zero-install reps by identifier (numbers by value), empty markers last
    let mut zero_reps: Vec<Cell> = inactive.iter().map(rep_of).collect();
    zero_reps.sort();

    // Step 4: team breakdown when both team and manager columns exist
    let team_breakdown = match (team_column.and_then(position), manager_column.and_then(position)) {
        (Some(team_index), Some(manager_index)) => {
            build_team_breakdown(reconciled, team_index, manager_index, &rep_of, config)
        }
        _ => Vec::new(),
    };

    debug!(
        "Report: {} active, {} inactive, {} teams",
        top_reps.len(),
        zero_reps.len(),
        team_breakdown.len()
    );

    Report {
        rep_column: rep_column.to_string(),
        columns: columns.to_vec(),
        top_reps,
        zero_reps,
        team_breakdown,
    }
}

fn build_team_breakdown(
    reconciled: &[ReconciledRow],
    team_index: usize,
    manager_index: usize,
    rep_of: &dyn Fn(&ReconciledRow) -> Cell,
    config: &Config,
) -> Vec<TeamGroup> {
    // Group by team name keeping first-encountered order; rows without a team are skipped
    let mut groups: Vec<(String, Vec<&ReconciledRow>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for row in reconciled {
        let team = match row.cell(team_index).as_str() {
            Some(team) => team.to_string(),
            None => continue,
        };
        let index = *group_index.entry(team.clone()).or_insert_with(|| {
            groups.push((team, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(row);
    }

    let mut breakdown = Vec::new();
    for (team, rows) in groups {
        // The first row's manager speaks for the whole team
        let manager = rows[0].cell(manager_index).clone();

        if config.is_suppressed_manager(&manager) {
            info!("Skipping team '{}' of suppressed manager '{}'", team, manager);
            continue;
        }

        // An empty manager never matches a rep
        let is_manager = |row: &ReconciledRow| !manager.is_empty() && rep_of(row) == manager;

        let manager_installs: u64 = rows
            .iter()
            .filter(|row| is_manager(row))
            .map(|row| row.installs)
            .sum();
        let total: u64 = rows.iter().map(|row| row.installs).sum();

        let mut reps: Vec<RepInstalls> = rows
            .iter()
            .filter(|row| !is_manager(row))
            .map(|row| RepInstalls {
                rep: rep_of(row),
                installs: row.installs,
            })
            .collect();
        reps.sort_by(|a, b| b.installs.cmp(&a.installs));

        breakdown.push(TeamGroup {
            team,
            manager,
            manager_installs,
            total,
            reps,
        });
    }

    breakdown
}

pub struct SalesAnalyzer<'a> {
    pub config: &'a Config,
}

impl<'a> SalesAnalyzer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Runs the whole pipeline. Either a full report or an error, never a partial report.
    pub fn analyze(&self, raw: &Table, roster: &Table) -> Result<Report> {
        // Step 1: find the rep, team and manager columns
        let columns = resolve_columns(raw, roster, self.config)?;

        // Step 2: count installs per rep in the raw log
        let counts = aggregate(raw, &columns.raw_rep);
        if counts.is_empty() {
            warn!("Raw install log has no rows, every rep will show zero installs");
        } else {
            debug!("{} install rows across {} distinct reps", counts.total(), counts.len());
            if let Some((rep, installs)) = counts.ranked().first() {
                debug!("Most installs in raw log: '{}' ({})", rep, installs);
            }
        }

        // Step 3: attach counts to every roster row
        let reconciled = reconcile(roster, &counts, &columns.roster_rep);

        // Step 4: leaderboard, zero list and teams
        let report = build_report(
            &reconciled,
            &roster.columns,
            &columns.roster_rep,
            columns.team.as_deref(),
            columns.manager.as_deref(),
            self.config,
        );

        info!(
            "Report ready: {} reps with installs, {} without, {} teams",
            report.top_reps.len(),
            report.zero_reps.len(),
            report.team_breakdown.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InputKind, ReportError};
    use crate::loader::parse_table;

    fn table(csv: &str) -> Table {
        parse_table(csv.as_bytes(), "test").unwrap()
    }

    fn rep_installs(rep: &str, installs: u64) -> RepInstalls {
        RepInstalls {
            rep: Cell::text(rep),
            installs,
        }
    }

    fn analyze(raw: &str, roster: &str) -> Report {
        let config = Config::default();
        SalesAnalyzer::new(&config)
            .analyze(&table(raw), &table(roster))
            .unwrap()
    }

    #[test]
    fn aggregate_counts_exact_values_including_empty() {
        let mut raw = table("Rep\nA\na\nA\nB\n");
        raw.rows.push(vec![Cell::Empty]);

        let counts = aggregate(&raw, "Rep");
        assert_eq!(counts.get(&Cell::text("A")), Some(2));
        assert_eq!(counts.get(&Cell::text("a")), Some(1));
        assert_eq!(counts.get(&Cell::Empty), Some(1));
        assert_eq!(counts.get(&Cell::text("Z")), None);
        assert_eq!(counts.total(), raw.len() as u64);
    }

    #[test]
    fn ranked_counts_put_highest_first() {
        let counts = aggregate(&table("Rep\nB\nA\nA\nC\nC\n"), "Rep");
        let ranked: Vec<(String, u64)> = counts
            .ranked()
            .into_iter()
            .map(|(rep, n)| (rep.display().to_string(), n))
            .collect();
        assert_eq!(
            ranked,
            vec![("A".to_string(), 2), ("C".to_string(), 2), ("B".to_string(), 1)]
        );
    }

    #[test]
    fn reconcile_preserves_roster_cardinality() {
        let counts = aggregate(&table("Rep\nA\nA\nZ\n"), "Rep");
        let roster = table("Rep,Team\nA,X\nA,X\nB,Y\nNaN,Y\n");

        let reconciled = reconcile(&roster, &counts, "Rep");
        assert_eq!(reconciled.len(), roster.len());
        let installs: Vec<u64> = reconciled.iter().map(|r| r.installs).collect();
        assert_eq!(installs, vec![2, 2, 0, 0]);
        assert_eq!(reconciled[3].cells[0], Cell::Empty);
    }

    #[test]
    fn roster_reps_absent_from_raw_get_zero() {
        let counts = aggregate(&table("Rep\nA\n"), "Rep");
        let reconciled = reconcile(&table("Rep\nB\nC\n"), &counts, "Rep");
        assert!(reconciled.iter().all(|r| r.installs == 0));
    }

    #[test]
    fn worked_scenario() {
        let report = analyze(
            "Rep\nA\nA\nB\n",
            "Rep,Team,Manager\nA,X,A\nB,X,A\nC,X,A\n",
        );

        let top: Vec<(String, u64)> = report
            .top_reps
            .iter()
            .map(|row| (report.rep_of(row).display().to_string(), row.installs))
            .collect();
        assert_eq!(top, vec![("A".to_string(), 2), ("B".to_string(), 1)]);
        assert_eq!(report.zero_rep_names(), vec!["C"]);
        assert_eq!(report.rep_column, "Rep");

        assert_eq!(report.team_breakdown.len(), 1);
        let team = &report.team_breakdown[0];
        assert_eq!(team.team, "X");
        assert_eq!(team.manager, Cell::text("A"));
        assert_eq!(team.manager_installs, 2);
        assert_eq!(team.total, 3);
        assert_eq!(team.reps, vec![rep_installs("B", 1), rep_installs("C", 0)]);
    }

    #[test]
    fn manager_missing_from_rep_rows_has_zero_installs() {
        let report = analyze(
            "Rep\nA\nB\nB\n",
            "Rep,Team,Manager\nA,X,Boss\nB,X,Boss\n",
        );
        let team = &report.team_breakdown[0];
        assert_eq!(team.manager_installs, 0);
        assert_eq!(team.total, 3);
        assert_eq!(team.reps, vec![rep_installs("B", 2), rep_installs("A", 1)]);
    }

    #[test]
    fn active_and_inactive_partition_the_roster() {
        let report = analyze(
            "Rep\nA\nC\nC\nX\n",
            "Rep\nA\nB\nC\nD\nB\n",
        );
        assert_eq!(report.top_reps.len() + report.zero_reps.len(), 5);
        assert!(report.top_reps.iter().all(|r| r.installs > 0));
        assert_eq!(report.zero_rep_names(), vec!["B", "B", "D"]);
        assert!(report.team_breakdown.is_empty());
    }

    #[test]
    fn leaderboard_sort_is_stable_for_ties() {
        let report = analyze("Rep\nB\nA\nC\nC\n", "Rep\nA\nB\nC\n");
        let order: Vec<&str> = report
            .top_reps
            .iter()
            .map(|row| report.rep_of(row).display())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn zero_reps_render_empty_marker_last_as_empty_string() {
        let report = analyze("Rep\nA\n", "Rep\nNaN\nB\nA\n");
        assert_eq!(report.zero_reps, vec![Cell::text("B"), Cell::Empty]);
        assert_eq!(report.zero_rep_names(), vec!["B", ""]);
    }

    #[test]
    fn numeric_rep_ids_sort_by_value() {
        let report = analyze("Rep\n1\n", "Rep\n10\n9\n2\n1\n");
        assert_eq!(report.zero_rep_names(), vec!["2", "9", "10"]);
    }

    #[test]
    fn suppressed_manager_team_is_dropped_regardless_of_case() {
        for manager in ["MICHAEL GRABOWSKI", "michael grabowski"] {
            let roster = format!(
                "Rep,Team,Manager\nA,X,{manager}\nB,Y,Zoe\nZoe,Y,Zoe\n"
            );
            let report = analyze("Rep\nA\nB\nZoe\n", &roster);
            let teams: Vec<&str> = report.team_breakdown.iter().map(|t| t.team.as_str()).collect();
            assert_eq!(teams, vec!["Y"]);
            // Suppressed reps still show on the leaderboard
            assert_eq!(report.top_reps.len(), 3);
        }
    }

    #[test]
    fn first_row_manager_is_authoritative() {
        let report = analyze(
            "Rep\nA\nB\n",
            "Rep,Team,Manager\nB,X,A\nA,X,Michael Grabowski\n",
        );
        let team = &report.team_breakdown[0];
        assert_eq!(team.manager, Cell::text("A"));
        assert_eq!(team.manager_installs, 1);
    }

    #[test]
    fn teams_keep_first_encountered_order_and_skip_empty_team() {
        let report = analyze(
            "Rep\nA\nB\nC\nD\n",
            "Rep,Team,Manager\nA,Zulu,M\nB,Alpha,N\nC,Zulu,M\nD,,N\n",
        );
        let teams: Vec<(&str, u64)> = report
            .team_breakdown
            .iter()
            .map(|t| (t.team.as_str(), t.total))
            .collect();
        assert_eq!(teams, vec![("Zulu", 2), ("Alpha", 1)]);
    }

    #[test]
    fn team_totals_never_exceed_raw_rows() {
        let raw = "Rep\nA\nA\nB\nC\nGhost\n";
        let report = analyze(raw, "Rep,Team,Manager\nA,X,A\nB,X,A\nC,Y,C\n");
        let total: u64 = report.team_breakdown.iter().map(|t| t.total).sum();
        assert_eq!(total, 4);
        assert!(total <= 5);
    }

    #[test]
    fn empty_manager_matches_no_rep() {
        let report = analyze("Rep\nA\nB\n", "Rep,Team,Manager\nA,X,\nB,X,A\n");
        let team = &report.team_breakdown[0];
        assert_eq!(team.manager, Cell::Empty);
        assert_eq!(team.manager_installs, 0);
        assert_eq!(team.reps.len(), 2);
    }

    #[test]
    fn empty_rep_rows_share_the_empty_count() {
        let mut raw = table("Rep\nA\n");
        raw.rows.push(vec![Cell::Empty]);
        raw.rows.push(vec![Cell::Empty]);
        let config = Config::default();
        let report = SalesAnalyzer::new(&config)
            .analyze(&raw, &table("Rep\nA\nN/A\n"))
            .unwrap();
        let installs: Vec<u64> = report.top_reps.iter().map(|r| r.installs).collect();
        assert_eq!(installs, vec![2, 1]);
        assert!(report.zero_reps.is_empty());
    }

    #[test]
    fn missing_team_column_gives_empty_breakdown() {
        let report = analyze("Rep\nA\n", "Rep,Manager\nA,A\n");
        assert!(report.team_breakdown.is_empty());
        assert_eq!(report.top_reps.len(), 1);
    }

    #[test]
    fn different_rep_column_names_across_tables() {
        let report = analyze(
            "Date,Agent\n2024-01-01,Ann\n2024-01-02,Ann\n",
            "Sales Rep Name,Sales Team,Sales Manager\nAnn,East,Ann\nBo,East,Ann\n",
        );
        assert_eq!(report.rep_column, "Sales Rep Name");
        let team = &report.team_breakdown[0];
        assert_eq!(team.team, "East");
        assert_eq!(team.manager_installs, 2);
        assert_eq!(team.reps, vec![rep_installs("Bo", 0)]);
    }

    #[test]
    fn unresolved_rep_column_fails_whole_run() {
        let config = Config::default();
        let err = SalesAnalyzer::new(&config)
            .analyze(&table("Date\n2024-01-01\n"), &table("Rep\nA\n"))
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::UnresolvedRequiredColumn { table: InputKind::Raw, .. }
        ));
    }

    #[test]
    fn suppression_list_comes_from_config() {
        let config = Config {
            suppressed_managers: vec!["Zoe".to_string()],
            ..Config::default()
        };
        let report = SalesAnalyzer::new(&config)
            .analyze(
                &table("Rep\nA\n"),
                &table("Rep,Team,Manager\nA,X,Michael Grabowski\nB,Y,zoe\n"),
            )
            .unwrap();
        let teams: Vec<&str> = report.team_breakdown.iter().map(|t| t.team.as_str()).collect();
        assert_eq!(teams, vec!["X"]);
    }
}
