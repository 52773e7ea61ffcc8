//! Calendar helpers shared by the planning routes. Dates travel as
//! `YYYY-MM-DD` strings and are interpreted in UTC.

use time::{format_description::FormatItem, macros::format_description, Date, Duration, OffsetDateTime};

use crate::error::{AppError, AppResult};

const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `#[serde(with = "crate::dates::serde_iso_date")]` for `Date` fields.
pub mod serde_iso_date {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let text = date.format(super::ISO_DATE).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        Date::parse(&raw, super::ISO_DATE).map_err(D::Error::custom)
    }
}

pub fn parse_date(field: &str, raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), ISO_DATE)
        .map_err(|_| AppError::bad_request(format!("{} must be a date in YYYY-MM-DD format", field)))
}

pub fn optional_date(field: &str, raw: Option<&str>) -> AppResult<Option<Date>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => parse_date(field, r).map(Some),
        None => Ok(None),
    }
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Sunday through Saturday of the week containing `day`.
pub fn week_of(day: Date) -> (Date, Date) {
    let offset = day.weekday().number_days_from_sunday() as i64;
    let start = day - Duration::days(offset);
    (start, start + Duration::days(6))
}

/// Reads an optional `start_date`/`end_date` pair. Missing bounds default to
/// the current week; an end before the start is rejected.
pub fn range_or_current_week(start: Option<&str>, end: Option<&str>) -> AppResult<(Date, Date)> {
    let (week_start, week_end) = week_of(today());
    let start = optional_date("start_date", start)?.unwrap_or(week_start);
    let end = optional_date("end_date", end)?.unwrap_or(week_end);
    if end < start {
        return Err(AppError::bad_request("end_date must not be before start_date"));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date("d", "2024-03-05").unwrap(), date!(2024 - 03 - 05));
        assert!(parse_date("d", "03/05/2024").is_err());
        assert!(parse_date("d", "2024-02-30").is_err());
        assert_eq!(optional_date("d", Some("  ")).unwrap(), None);
    }

    #[test]
    fn weeks_run_sunday_to_saturday() {
        // 2024-03-06 is a Wednesday.
        assert_eq!(
            week_of(date!(2024 - 03 - 06)),
            (date!(2024 - 03 - 03), date!(2024 - 03 - 09))
        );
        let sunday = date!(2024 - 03 - 03);
        assert_eq!(week_of(sunday).0, sunday);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(range_or_current_week(Some("2024-03-10"), Some("2024-03-01")).is_err());
        let (s, e) = range_or_current_week(Some("2024-03-01"), Some("2024-03-01")).unwrap();
        assert_eq!(s, e);
    }

    #[test]
    fn dates_serialize_as_plain_days() {
        #[derive(serde::Serialize)]
        struct Row {
            #[serde(with = "serde_iso_date")]
            day: Date,
        }
        let json = serde_json::to_string(&Row {
            day: date!(2024 - 01 - 09),
        })
        .unwrap();
        assert_eq!(json, r#"{"day":"2024-01-09"}"#);
    }
}
