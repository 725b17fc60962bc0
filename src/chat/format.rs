//! Timestamp and date labels shown in the chat list and conversation view.
//!
//! All calendar arithmetic is done in UTC.

use chrono::{DateTime, NaiveDate, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// 24-hour `HH:MM`
pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%H:%M").to_string()
}

/// `M/D/YYYY`, without zero padding
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

/// Separator label above a day's messages
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if Some(date) == today.pred_opt() {
        "Yesterday".to_string()
    } else {
        format_date(date)
    }
}

/// Label next to a chat in the sidebar.
///
/// Counts whole elapsed 24-hour periods rather than calendar days, so a
/// message from 23:50 yesterday still shows its time at 00:10 today.
pub fn sidebar_timestamp(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed_days = (now - ts).num_milliseconds().div_euclid(MILLIS_PER_DAY);
    match elapsed_days {
        0 => format_time(ts),
        1 => "Yesterday".to_string(),
        _ => format_date(ts.date_naive()),
    }
}
