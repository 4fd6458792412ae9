use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use lean_dash::data::loader::load_file;
use lean_dash::{Dashboard, DashboardConfig};

/// Print a dashboard summary for a record file
#[derive(Parser, Debug)]
#[command(name = "lean-dash")]
#[command(version)]
#[command(about = "Summarise a time-series record file as dashboard charts", long_about = None)]
struct Cli {
    /// Record file (.json, .csv or .parquet)
    data: PathBuf,

    /// JSON dashboard configuration; defaults apply when omitted
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DashboardConfig::from_json_file(path)?,
        None => DashboardConfig::default(),
    };

    let index = load_file(&cli.data, &config)?;
    let dashboard = Dashboard::new(index, config)?;
    print_summary(&dashboard)?;
    Ok(())
}

fn print_summary(dashboard: &Dashboard) -> Result<()> {
    let range = dashboard.range();
    println!(
        "{} ({} .. {}), {} of {} records active",
        range.name,
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d"),
        dashboard.dataset().active().count(),
        dashboard.dataset().len(),
    );

    let shown = dashboard.displayed_series();
    println!("\n{}", shown.base_name);
    for (t, v) in &shown.base {
        println!("  {}  {v:>12.2}", t.format("%Y-%m-%d"));
    }
    println!("\n{}", shown.derived_name);
    for (t, v) in &shown.derived {
        println!("  {}  {v:>12.2}", t.format("%Y-%m-%d"));
    }

    for category in dashboard.categories() {
        println!("\n{}", dashboard.category_subtitle(&category.id)?);
        for (key, value) in dashboard.category_entries(&category.id)? {
            println!("  {key:<12} {value:>12.2}");
        }
    }

    println!("\n{}", dashboard.table_subtitle());
    for row in dashboard.table_rows() {
        println!("  {:>12}  {}", row.value, row.key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_data_and_optional_config() {
        let cli = Cli::try_parse_from(["lean-dash", "records.csv"]).unwrap();
        assert_eq!(cli.data, PathBuf::from("records.csv"));
        assert_eq!(cli.config, None);

        let cli = Cli::try_parse_from(["lean-dash", "records.csv", "dash.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("dash.json")));
    }

    #[test]
    fn help_is_not_taken_as_a_data_file() {
        let err = Cli::try_parse_from(["lean-dash", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let err = Cli::try_parse_from(["lean-dash"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
