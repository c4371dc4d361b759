//! Lay time inspection entry point.
//!
//! # Responsibility
//! - With no arguments, print a deterministic `laytime_core` linkage check.
//! - With `<db-path> <lay-time-id>`, print that chain with violation markers
//!   and the laytime summary.
//!
//! Set `LAYTIME_LOG_DIR` to an absolute path to enable file logging.

use chrono::{DateTime, Utc};
use laytime_core::db::open_db;
use laytime_core::{
    default_log_level, format_duration, init_logging, ActivityService, ChainSnapshot,
    LaytimeSummary, SqliteActivityStore,
};
use std::error::Error;
use std::process::ExitCode;

const USAGE: &str = "usage: laytime_cli [<db-path> <lay-time-id>]";

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("LAYTIME_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("laytime_core ping={}", laytime_core::ping());
            println!("laytime_core version={}", laytime_core::core_version());
            ExitCode::SUCCESS
        }
        [db_path, lay_time_id] => match print_chain(db_path, lay_time_id) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => {
                eprintln!("lay time not found: {lay_time_id}");
                ExitCode::FAILURE
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

fn print_chain(db_path: &str, lay_time_id: &str) -> Result<bool, Box<dyn Error>> {
    let conn = open_db(db_path)?;
    let service = ActivityService::new(SqliteActivityStore::try_new(&conn)?);

    let Some(snapshot) = service.snapshot(lay_time_id)? else {
        return Ok(false);
    };
    print_rows(&snapshot);
    if let Some(summary) = service.summary(lay_time_id)? {
        print_summary(&summary);
    }
    Ok(true)
}

fn print_rows(snapshot: &ChainSnapshot) {
    println!(
        "{:<2} {:<3} {:<12} {:<16} {:<16} {:>9} {:>4}  remarks",
        "", "day", "type", "from", "to", "duration", "%"
    );
    for activity in &snapshot.activities {
        let marker = if snapshot.is_violating(activity.id) {
            "!"
        } else {
            ""
        };
        println!(
            "{:<2} {:<3} {:<12} {:<16} {:<16} {:>9} {:>4}  {}",
            marker,
            activity.day(),
            activity.activity_type.as_str(),
            timestamp(activity.from_date_time),
            timestamp(activity.to_date_time),
            format_duration(activity.duration()),
            activity.percentage.value(),
            activity.remarks
        );
    }
    println!(
        "activities={} violations={}",
        snapshot.activities.len(),
        snapshot.violations.len()
    );
}

fn print_summary(summary: &LaytimeSummary) {
    println!("allowed  {}", format_duration(summary.allowed));
    println!("used     {}", format_duration(summary.used));
    println!("deducted {}", format_duration(summary.deducted));
    println!("counted  {}", format_duration(summary.counted));
    if summary.is_exceeded() {
        println!("balance  -{} (exceeded)", format_duration(-summary.balance));
    } else {
        println!("balance  {}", format_duration(summary.balance));
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}
