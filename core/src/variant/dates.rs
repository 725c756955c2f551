use super::value::Variant;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use log::warn;

/// Days between the OLE automation epoch (1899-12-30) and 1970-01-01
const OLE_TO_UNIX_DAYS: i64 = 25569;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// The zero date/time. Absent or unusable dates decode to this value
pub fn zero_time() -> DateTime<Utc> {
    DateTime::default()
}

pub fn is_zero_time(time: &DateTime<Utc>) -> bool {
    *time == zero_time()
}

/**
 * Decode a service date value. Anything that is absent or not tagged as a date returns the zero time.
 * Date values are OLE automation time: whole days since 1899-12-30 with the time of day as the fraction
 */
pub fn date_or_zero(value: Option<&Variant>) -> DateTime<Utc> {
    match value {
        Some(Variant::Date(oletime)) => ole_automationtime_to_utc(*oletime),
        _ => zero_time(),
    }
}

/// Encode a time as an OLE automation date
pub fn date_to_variant(time: &DateTime<Utc>) -> Variant {
    Variant::Date(utc_to_ole_automationtime(time))
}

/// Convert OLE Automation time (sometimes also referred to as Variant time) to UTC
pub(crate) fn ole_automationtime_to_utc(oletime: f64) -> DateTime<Utc> {
    if !oletime.is_finite() {
        warn!("[taskmaster] Got non-finite OLE automation time {oletime}");
        return zero_time();
    }

    // Before the epoch the sign only applies to the day part. The time of day is still positive
    let days = oletime.trunc();
    let time_of_day = (oletime - days).abs();

    // Stay in f64 until the end. The cast saturates, chrono rejects anything out of range
    let millis = (days * MILLIS_PER_DAY + time_of_day * MILLIS_PER_DAY).round()
        - OLE_TO_UNIX_DAYS as f64 * MILLIS_PER_DAY;

    match DateTime::from_timestamp_millis(millis as i64) {
        Some(result) => result,
        None => {
            warn!("[taskmaster] OLE automation time {oletime} is out of range");
            zero_time()
        }
    }
}

/// Convert UTC to OLE Automation time
pub(crate) fn utc_to_ole_automationtime(time: &DateTime<Utc>) -> f64 {
    let millis = time.timestamp_millis() + OLE_TO_UNIX_DAYS * MILLIS_PER_DAY as i64;
    let days = millis as f64 / MILLIS_PER_DAY;

    let whole = days.floor();
    let time_of_day = days - whole;
    if whole < 0.0 && time_of_day > 0.0 {
        return whole - time_of_day;
    }
    days
}

/**
 * Decode a date the service stores as text (trigger boundaries, registration date).
 * Accepts RFC3339 or the zone-less `YYYY-MM-DDTHH:MM:SS` form, which is treated as UTC
 */
pub fn text_date_or_zero(value: Option<&Variant>) -> DateTime<Utc> {
    let text = match value {
        Some(Variant::Bstr(text)) if !text.is_empty() => text,
        Some(Variant::Date(oletime)) => return ole_automationtime_to_utc(*oletime),
        _ => return zero_time(),
    };

    if let Ok(result) = DateTime::parse_from_rfc3339(text) {
        return result.with_timezone(&Utc);
    }

    match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(result) => result.and_utc(),
        Err(err) => {
            warn!("[taskmaster] Could not parse date {text}: {err:?}");
            zero_time()
        }
    }
}

/// Encode a date as service text. The zero time encodes as an empty string
pub fn date_to_text(time: &DateTime<Utc>) -> String {
    if is_zero_time(time) {
        return String::new();
    }
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::{
        date_or_zero, date_to_text, date_to_variant, is_zero_time, ole_automationtime_to_utc,
        text_date_or_zero, utc_to_ole_automationtime, zero_time,
    };
    use crate::variant::value::Variant;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_date_or_zero() {
        assert!(is_zero_time(&date_or_zero(None)));
        assert!(is_zero_time(&date_or_zero(Some(&Variant::I4(10)))));
        assert!(is_zero_time(&date_or_zero(Some(&Variant::R8(2.5)))));

        let result = date_or_zero(Some(&Variant::Date(2.5)));
        assert_eq!(result, Utc.with_ymd_and_hms(1900, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_ole_automationtime_to_utc() {
        let test = 43794.01875;
        let result = ole_automationtime_to_utc(test);
        assert_eq!(result.timestamp(), 1574641620);

        // 1899-12-29 06:00
        let result = ole_automationtime_to_utc(-1.25);
        assert_eq!(result, Utc.with_ymd_and_hms(1899, 12, 29, 6, 0, 0).unwrap());

        assert_eq!(ole_automationtime_to_utc(f64::NAN), zero_time());
    }

    #[test]
    fn test_ole_automationtime_out_of_range() {
        for oletime in [1e300, -1e300, f64::MAX, f64::MIN, 1e12] {
            assert_eq!(date_or_zero(Some(&Variant::Date(oletime))), zero_time());
        }
    }

    #[test]
    fn test_utc_to_ole_automationtime() {
        let time = Utc.with_ymd_and_hms(1900, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(utc_to_ole_automationtime(&time), 2.5);

        let time = Utc.with_ymd_and_hms(1899, 12, 29, 6, 0, 0).unwrap();
        assert_eq!(utc_to_ole_automationtime(&time), -1.25);

        let time = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap();
        assert_eq!(date_or_zero(Some(&date_to_variant(&time))), time);
    }

    #[test]
    fn test_text_date_or_zero() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 5).unwrap();
        let value = Variant::from("2024-03-09T18:30:05Z");
        assert_eq!(text_date_or_zero(Some(&value)), expected);

        let value = Variant::from("2024-03-09T18:30:05");
        assert_eq!(text_date_or_zero(Some(&value)), expected);

        assert!(is_zero_time(&text_date_or_zero(None)));
        assert!(is_zero_time(&text_date_or_zero(Some(&Variant::from("")))));
        assert!(is_zero_time(&text_date_or_zero(Some(&Variant::from("yesterday")))));
        assert!(is_zero_time(&text_date_or_zero(Some(&Variant::Bool(true)))));
    }

    #[test]
    fn test_date_to_text() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 5).unwrap();
        assert_eq!(date_to_text(&time), "2024-03-09T18:30:05Z");
        assert_eq!(date_to_text(&DateTime::default()), "");

        let time = time + Duration::milliseconds(250);
        let text = date_to_text(&time);
        assert_eq!(text, "2024-03-09T18:30:05.250Z");
        assert_eq!(text_date_or_zero(Some(&Variant::from(text.as_str()))), time);
    }
}
