//! Rental price calculation
//!
//! Converts a reservation window and the listing's rate pair into a total
//! charge. Bookings of 24 hours or more are charged per started day when a
//! daily rate exists; shorter windows fall back to the hourly rate, then to
//! a fractional-day charge.

use chrono::{DateTime, Utc};

/// Duration of a rental window in hours (never negative)
pub fn rental_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_seconds() as f64;
    (seconds / 3600.0).max(0.0)
}

/// Compute the total charge for a rental window.
///
/// `days = ceil(hours / 24)`; a daily rate wins for any window of a full
/// day or more, otherwise the hourly rate applies. A listing with neither
/// rate is free. The window is validated upstream (`end > start`), so
/// `hours > 0` here.
pub fn compute_price(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hourly_rate: Option<f64>,
    daily_rate: Option<f64>,
) -> f64 {
    let hours = rental_hours(start, end);
    let days = (hours / 24.0).ceil();

    if days >= 1.0 {
        if let Some(daily) = daily_rate {
            return days * daily;
        }
    }

    if let Some(hourly) = hourly_rate {
        return hours * hourly;
    }

    if let Some(daily) = daily_rate {
        return (hours / 24.0) * daily;
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn forty_eight_hours_at_daily_rate() {
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 3, 0), None, Some(500.0));
        assert_eq!(price, 1000.0);
    }

    #[test]
    fn forty_eight_hours_at_hourly_rate_only() {
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 3, 0), Some(20.0), None);
        assert_eq!(price, 960.0);
    }

    #[test]
    fn five_hours_at_hourly_rate() {
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 1, 5), Some(20.0), None);
        assert_eq!(price, 100.0);
    }

    #[test]
    fn sub_day_window_prefers_daily_rate_when_present() {
        // Any positive window rounds up to one day
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 1, 5), Some(20.0), Some(300.0));
        assert_eq!(price, 300.0);
    }

    #[test]
    fn partial_second_day_is_charged_in_full() {
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 2, 1), None, Some(500.0));
        assert_eq!(price, 1000.0);
    }

    #[test]
    fn no_rates_is_free() {
        let price = compute_price(at(2024, 1, 1, 0), at(2024, 1, 2, 0), None, None);
        assert_eq!(price, 0.0);
    }

    #[test]
    fn rental_hours_spans() {
        assert_eq!(rental_hours(at(2024, 1, 1, 0), at(2024, 1, 3, 0)), 48.0);
        assert_eq!(rental_hours(at(2024, 1, 1, 0), at(2024, 1, 1, 5)), 5.0);
        // Inverted windows clamp to zero rather than going negative
        assert_eq!(rental_hours(at(2024, 1, 2, 0), at(2024, 1, 1, 0)), 0.0);
    }
}
