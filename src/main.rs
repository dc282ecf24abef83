mod analyzer;
mod columns;
mod error;
mod loader;
mod models;

use analyzer::SalesAnalyzer;
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use error::InputKind;
use models::{Config, Report};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TEXT_REPORT: &str = "sales_report.txt";
const JSON_REPORT: &str = "report.json";
const LEADERBOARD_CSV: &str = "leaderboard.csv";

fn main() -> Result<()> {
    let matches = Command::new("sales-report")
        .version("0.1")
        .about("Builds a sales-performance report from an install log and a rep roster")
        .arg(
            Arg::new("raw")
                .short('r')
                .long("raw")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Raw install log CSV (one row per install)"),
        )
        .arg(
            Arg::new("roster")
                .short('u')
                .long("roster")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Sales rep roster CSV"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory (overrides the configuration file)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["text", "json", "both"])
                .default_value("both")
                .help("Which report files to write"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config_exists = Path::new(config_file).exists();
    let config = if config_exists {
        Config::load_from_file(config_file)?
    } else {
        Config::default()
    };

    init_tracing(matches.get_count("verbose"), config.log_level.as_deref());

    if config_exists {
        info!("Loaded configuration from {}", config_file);
    } else {
        config
            .save_to_file(config_file)
            .with_context(|| format!("Failed to write default configuration to {}", config_file))?;
        info!("Created default configuration file {}", config_file);
    }

    let output_dir = matches
        .get_one::<String>("output")
        .cloned()
        .or_else(|| config.output_directory.clone())
        .unwrap_or_else(|| "output".to_string());
    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("both");

    let raw = loader::load_table(
        matches.get_one::<PathBuf>("raw").map(PathBuf::as_path),
        InputKind::Raw,
    )?;
    let roster = loader::load_table(
        matches.get_one::<PathBuf>("roster").map(PathBuf::as_path),
        InputKind::Roster,
    )?;
    info!(
        "Read {} install rows and {} roster rows",
        raw.len(),
        roster.len()
    );
    if roster.is_empty() {
        warn!("Roster {} has no rows, the report will be empty", roster.name);
    }

    let report = SalesAnalyzer::new(&config).analyze(&raw, &roster)?;

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir))?;
    clean_output_directory(&output_dir)?;

    if format == "text" || format == "both" {
        generate_text_report(&report, &output_dir)?;
    }
    if format == "json" || format == "both" {
        generate_json_report(&report, &output_dir)?;
    }
    generate_leaderboard_csv(&report, &output_dir)?;

    print_summary(&report);

    println!("\n✅ Report complete!");
    println!("📂 Results: {}", output_dir);
    Ok(())
}

/// Log filter: `RUST_LOG` first, then `-v` flags, then the configured level.
fn init_tracing(verbose: u8, configured: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = match (verbose, configured) {
        (0, Some(level)) => format!("sales_report={}", level),
        (0, None) => "sales_report=info".to_string(),
        (1, _) => "sales_report=debug".to_string(),
        _ => "sales_report=trace".to_string(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn generate_text_report(report: &Report, output_dir: &str) -> Result<()> {
    let mut content = String::new();
    content.push_str("Sales Performance Report\n");
    content.push_str("========================\n\n");

    content.push_str(&format!(
        "Top reps ({} total installs)\n",
        report.total_installs()
    ));
    content.push_str("----------------------------\n");
    for (i, row) in report.top_reps.iter().enumerate() {
        content.push_str(&format!(
            "{:>3}. {} - {}\n",
            i + 1,
            report.rep_of(row),
            row.installs
        ));
    }

    content.push_str(&format!("\nReps with zero installs ({})\n", report.zero_reps.len()));
    content.push_str("----------------------------\n");
    for name in report.zero_rep_names() {
        content.push_str(&format!("   - {}\n", name));
    }

    if !report.team_breakdown.is_empty() {
        content.push_str("\nTeam breakdown\n");
        content.push_str("--------------\n");
        for team in &report.team_breakdown {
            content.push_str(&format!(
                "Team: {}\n\
                Manager: {} ({} installs)\n\
                Team total: {}\n",
                team.team, team.manager, team.manager_installs, team.total
            ));
            for rep in &team.reps {
                content.push_str(&format!("   - {} - {}\n", rep.rep, rep.installs));
            }
            content.push('\n');
        }
    }

    fs::write(Path::new(output_dir).join(TEXT_REPORT), content)?;
    Ok(())
}

fn generate_json_report(report: &Report, output_dir: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(Path::new(output_dir).join(JSON_REPORT), json)?;
    Ok(())
}

/// Leaderboard export keyed by the roster's own rep column name.
fn generate_leaderboard_csv(report: &Report, output_dir: &str) -> Result<()> {
    use csv::Writer;

    let csv_path = Path::new(output_dir).join(LEADERBOARD_CSV);
    let mut writer = Writer::from_path(csv_path)?;

    writer.write_record([report.rep_column.as_str(), "Installs"])?;

    for row in &report.top_reps {
        writer.write_record([report.rep_of(row).display(), row.installs.to_string().as_str()])?;
    }
    for rep in &report.zero_reps {
        writer.write_record([rep.display(), "0"])?;
    }

    writer.flush()?;
    Ok(())
}

fn print_summary(report: &Report) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!("🏆 Top reps ({} total installs):", report.total_installs());
    for (i, row) in report.top_reps.iter().take(10).enumerate() {
        println!("   {}. {} - {}", i + 1, report.rep_of(row), row.installs);
    }
    if report.top_reps.len() > 10 {
        println!("   ... and {} more", report.top_reps.len() - 10);
    }

    println!("\n💤 Reps with zero installs: {}", report.zero_reps.len());

    if report.team_breakdown.is_empty() {
        println!("\n👥 No team breakdown (team or manager column not found)");
    } else {
        println!("\n👥 Teams:");
        for team in &report.team_breakdown {
            println!(
                "   {} (manager {}): {} installs",
                team.team, team.manager, team.total
            );
        }
    }
}

// Clean up previous results from output directory
fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !output_path.exists() {
        return Ok(());
    }

    for item in [TEXT_REPORT, JSON_REPORT, LEADERBOARD_CSV] {
        let item_path = output_path.join(item);
        if item_path.is_file() {
            fs::remove_file(&item_path)?;
            info!("Removed previous {}", item);
        }
    }

    Ok(())
}
