//! `schedule` command: print the polling interval for every hour of the day.

use harvestkit::cadence::{next_peak_start, period_label, AdaptiveCadenceController};
use harvestkit::clock::{SharedClock, SystemClock};
use harvestkit::config::CadenceConfig;
use serde::Serialize;
use std::sync::Arc;

use crate::error::CliError;

/// One row of the schedule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub hour: u32,
    pub interval_mins: u64,
    pub band: &'static str,
}

/// Build the 24-hour schedule.
pub fn schedule_rows(cadence: &AdaptiveCadenceController) -> Vec<ScheduleRow> {
    (0..24)
        .map(|hour| ScheduleRow {
            hour,
            interval_mins: cadence.next_interval(hour).as_secs() / 60,
            band: period_label(hour),
        })
        .collect()
}

/// Run the schedule command.
pub fn run(config: &CadenceConfig, json: bool) -> Result<(), CliError> {
    let clock: SharedClock = Arc::new(SystemClock);
    let cadence = AdaptiveCadenceController::new(config.clone(), Arc::clone(&clock));
    let rows = schedule_rows(&cadence);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Hour  Interval  Band");
    println!("----  --------  --------");
    for row in &rows {
        println!("{:02}    {:>3} min   {}", row.hour, row.interval_mins, row.band);
    }
    println!();
    println!("{}", cadence.next_check_description());
    if let Some((period, starts_at)) = next_peak_start(clock.local_time()) {
        println!("next peak: {} at {}", period, starts_at.format("%H:%M"));
    }
    Ok(())
}
