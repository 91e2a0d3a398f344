// Epoch Converter - calendar dates <-> seconds since J2000
// Dates carry millisecond resolution, the same resolution the displayed date uses

use chrono::{DateTime, Utc};

/// J2000 reference instant (2000-01-01T12:00:00Z) as Unix milliseconds
pub const J2000_UNIX_MILLIS: i64 = 946_728_000_000;

/// Julian Date of the J2000 reference instant
pub const J2000_JULIAN_DATE: f64 = 2451545.0;

/// Seconds in one day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// The J2000 reference instant
pub fn j2000() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(J2000_UNIX_MILLIS).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Seconds elapsed since J2000 for a calendar date (negative before the epoch)
pub fn to_epoch_seconds(date: &DateTime<Utc>) -> f64 {
    (date.timestamp_millis() - J2000_UNIX_MILLIS) as f64 / 1000.0
}

/// Calendar date for a number of seconds since J2000.
///
/// Rounds to the nearest millisecond. Instants outside chrono's representable
/// range saturate to `MIN_UTC` / `MAX_UTC`.
pub fn to_date(epoch_seconds: f64) -> DateTime<Utc> {
    let offset_ms = (epoch_seconds * 1000.0).round() as i64;
    match J2000_UNIX_MILLIS
        .checked_add(offset_ms)
        .and_then(DateTime::from_timestamp_millis)
    {
        Some(date) => date,
        None if offset_ms < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Julian Date for a number of seconds since J2000
pub fn julian_date(epoch_seconds: f64) -> f64 {
    J2000_JULIAN_DATE + epoch_seconds / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_j2000_is_zero() {
        let date = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(j2000(), date);
        assert_eq!(to_epoch_seconds(&date), 0.0);
        assert_eq!(to_date(0.0), date);
    }

    #[test]
    fn test_known_offsets() {
        let before = Utc.with_ymd_and_hms(1999, 12, 31, 12, 0, 0).unwrap();
        assert_eq!(to_epoch_seconds(&before), -86400.0);

        let after = Utc.with_ymd_and_hms(2000, 1, 2, 12, 0, 1).unwrap();
        assert_eq!(to_epoch_seconds(&after), 86401.0);
        assert!((julian_date(86400.0) - 2451546.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_random_dates() {
        let mut rng = StdRng::seed_from_u64(2000);
        for _ in 0..1000 {
            // roughly years 1000..3000 at millisecond resolution
            let ms: i64 = rng.gen_range(-30_610_000_000_000..32_500_000_000_000);
            let date = DateTime::from_timestamp_millis(ms).unwrap();
            assert_eq!(to_date(to_epoch_seconds(&date)), date);
        }
    }

    #[test]
    fn test_one_day_advances_calendar_day() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap();
        let seconds = to_epoch_seconds(&start) + 86400.0;
        assert_eq!(to_date(seconds), start + Duration::days(1));
    }

    #[test]
    fn test_out_of_range_saturates() {
        assert_eq!(to_date(1e20), DateTime::<Utc>::MAX_UTC);
        assert_eq!(to_date(-1e20), DateTime::<Utc>::MIN_UTC);
    }
}
