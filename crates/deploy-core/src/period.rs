use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Advance `period_start` by whole months until it is the most recent period
/// boundary at or before `now`, snap it to UTC midnight, and derive
/// `period_end` as one month past the snapped start (§4.A: "newPeriodStart is
/// aligned to UTC 00:00", "newPeriodEnd = addMonths(newPeriodStart, 1)").
///
/// Shared by the Postgres and in-memory `SubscriptionStore` implementations
/// so a FREE period refresh behaves identically regardless of backend.
pub fn advance_period(period_start: DateTime<Utc>, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let mut period_start = period_start;
    while add_months(period_start, 1) <= now {
        period_start = add_months(period_start, 1);
    }
    let period_start = snap_to_utc_midnight(period_start);
    let period_end = add_months(period_start, 1);
    (period_start, period_end)
}

/// Add `months` calendar months to `dt`. Days past the 28th are clamped to
/// the 28th so the result is always a valid date regardless of month length.
pub fn add_months(dt: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let total = dt.year() * 12 + (dt.month0() as i32) + months;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12);
    Utc.with_ymd_and_hms(year, (month0 + 1) as u32, dt.day().min(28), dt.hour(), dt.minute(), dt.second())
        .single()
        .unwrap_or(dt)
}

pub fn snap_to_utc_midnight(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 0, 0, 0).single().unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_to_the_most_recent_boundary_and_snaps_to_midnight() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 13, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 4, 3, 9, 0, 0).unwrap();
        let (new_start, new_end) = advance_period(start, now);
        assert_eq!(new_start, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(new_end, Utc.with_ymd_and_hms(2026, 4, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn leaves_an_unexpired_period_start_untouched_aside_from_midnight_snap() {
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 4, 3, 9, 0, 0).unwrap();
        let (new_start, new_end) = advance_period(start, now);
        assert_eq!(new_start, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(new_end, Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn clamps_month_end_days_to_the_28th() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let advanced = add_months(start, 1);
        assert_eq!(advanced, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());
    }
}
