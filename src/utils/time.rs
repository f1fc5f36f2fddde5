use chrono::{DateTime, Local, NaiveDate, Utc};

/// This is the standard way of converting a date to a string in tabtally. Daily statistics are
/// keyed by it.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar day of an instant in the user's local time zone.
pub fn local_date(moment: DateTime<Utc>) -> NaiveDate {
    moment.with_timezone(&Local).date_naive()
}
