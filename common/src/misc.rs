use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// First instant of the calendar month (UTC) containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Whether `then` lies in a calendar month before the one containing `now`.
pub fn is_previous_month(then: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    then < month_start(now)
}
