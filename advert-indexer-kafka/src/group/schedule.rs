//! Cron schedules for error group resubscription.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::errors::BrokerError;

/// Parse a cron expression.
///
/// Five-field expressions (minute precision) get a leading `0` seconds field;
/// six- and seven-field expressions are used as-is.
pub fn parse(expression: &str) -> Result<Schedule, BrokerError> {
    let expression = expression.trim();
    let normalized = match expression.split_whitespace().count() {
        5 => format!("0 {expression}"),
        _ => expression.to_string(),
    };

    Schedule::from_str(&normalized)
        .map_err(|e| BrokerError::schedule(format!("invalid cron expression '{expression}': {e}")))
}

/// Time until the next fire after `now`, or `None` if the schedule never fires again.
pub fn until_next(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    schedule
        .after(&now)
        .next()
        .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
}
