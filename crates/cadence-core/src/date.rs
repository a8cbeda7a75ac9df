//! Calendar-date helpers. Config files and plans use plain `YYYY-MM-DD`.

use time::{Date, Weekday};

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<Date, String> {
    let format = time::format_description::parse("[year]-[month]-[day]")
        .map_err(|e| e.to_string())?;
    Date::parse(raw.trim(), &format).map_err(|e| format!("invalid date \"{raw}\": {e}"))
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn is_weekend(date: Date) -> bool {
    matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Number of calendar days in `[start, end]`, or 0 when `start > end`.
pub fn days_inclusive(start: Date, end: Date) -> usize {
    if start > end {
        return 0;
    }
    (end - start).whole_days() as usize + 1
}

/// Serde adapter for `YYYY-MM-DD` dates.
pub mod ymd {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}
