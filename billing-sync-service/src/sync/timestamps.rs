//! Conversion of remote epoch timestamps and billing period arithmetic.

use crate::error::{SyncError, SyncResult};
use crate::models::PeriodUnit;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime};

/// Offset applied before truncating deferred revenue dates, so a UTC-midnight
/// boundary never lands on the previous calendar day.
const DEFERRED_OFFSET_HOURS: i64 = 12;

pub fn to_datetime(epoch: Option<i64>) -> Option<NaiveDateTime> {
    match epoch {
        None | Some(0) => None,
        Some(secs) => DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc()),
    }
}

pub fn to_date(epoch: Option<i64>) -> Option<NaiveDate> {
    to_datetime(epoch).map(|dt| dt.date())
}

pub fn to_deferred_date(epoch: Option<i64>) -> Option<NaiveDate> {
    to_datetime(epoch)
        .and_then(|dt| dt.checked_add_signed(Duration::hours(DEFERRED_OFFSET_HOURS)))
        .map(|dt| dt.date())
}

/// Whole calendar months from `start` to `end`. A month counts once
/// `start` shifted by it, clamped to the month end, is not after `end`.
fn elapsed_months(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = (end.year() as i64 - start.year() as i64) * 12 + end.month() as i64
        - start.month() as i64;
    if months <= 0 {
        return 0;
    }
    let reached = u32::try_from(months)
        .ok()
        .and_then(|m| start.checked_add_months(Months::new(m)))
        .is_some_and(|shifted| shifted <= end);
    if reached { months } else { months - 1 }
}

/// Number of complete billing cycles between `start` and `end`.
pub fn billing_cycles(
    start: NaiveDate,
    end: NaiveDate,
    period: i32,
    unit: &str,
) -> SyncResult<u32> {
    let unit = PeriodUnit::parse(unit)?;
    if period <= 0 {
        return Err(SyncError::UnsupportedData(format!(
            "billing period {}",
            period
        )));
    }
    if end < start {
        return Ok(0);
    }

    let days = (end - start).num_days();
    let elapsed = match unit {
        PeriodUnit::Day => days,
        PeriodUnit::Week => days / 7,
        PeriodUnit::Month => elapsed_months(start, end),
        PeriodUnit::Year => elapsed_months(start, end) / 12,
    };

    let cycles = elapsed.max(0) / i64::from(period);
    u32::try_from(cycles)
        .map_err(|_| SyncError::UnsupportedData(format!("{} billing cycles", cycles)))
}
