//! Lenient parsing of publication dates scraped from item text.

use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::{format_description, time};
use time::{Date, Month, OffsetDateTime};

/// Parse a scraped date. Tries, in order: `YYYY-MM-DD`, `DD-MM-YYYY`, `DD/MM/YYYY`, `DD-MM-YY`,
/// RFC 3339, and RFC 2822. Calendar dates are taken as midnight UTC.
pub fn parse_published(raw: &str) -> Option<OffsetDateTime> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    let calendar = Date::parse(
        cleaned,
        format_description!("[year]-[month padding:none]-[day padding:none]"),
    )
    .or_else(|_| {
        Date::parse(
            cleaned,
            format_description!("[day padding:none]-[month padding:none]-[year]"),
        )
    })
    .or_else(|_| {
        Date::parse(
            cleaned,
            format_description!("[day padding:none]/[month padding:none]/[year]"),
        )
    })
    .ok()
    .or_else(|| parse_short_year(cleaned));
    if let Some(date) = calendar {
        return Some(date.with_time(time!(0:00)).assume_utc());
    }

    OffsetDateTime::parse(cleaned, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(cleaned, &Rfc2822))
        .ok()
}

/// `DD-MM-YY`, read as a year in the 2000s.
fn parse_short_year(cleaned: &str) -> Option<Date> {
    let parts: Vec<&str> = cleaned.split('-').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if year.len() != 2 {
        return None;
    }
    let day: u8 = day.parse().ok()?;
    let month: u8 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    Date::from_calendar_date(2000 + year, Month::try_from(month).ok()?, day).ok()
}
