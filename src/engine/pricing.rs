use crate::model::*;

/// Price of a stay, fixed at booking time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub duration_hours: u32,
    pub total_days: f64,
    pub cost: u64,
}

/// Charges are pro-rated by the day: `cost = round(days * nightly_rate)`,
/// rounding half away from zero. Duration is whole hours, rounded up.
/// `span` is never empty or negative, so all arithmetic stays unsigned.
pub fn quote(span: &Span, nightly_rate: u32) -> Quote {
    let ms = span.duration_ms();
    let duration_hours = ((ms + HOUR_MS - 1) / HOUR_MS) as u32;
    let total_days = ms as f64 / DAY_MS as f64;
    // Exact rational rounding; `days * rate` in f64 can land just below .5
    let numerator = ms as u128 * nightly_rate as u128;
    let day = DAY_MS as u128;
    let cost = ((2 * numerator + day) / (2 * day)) as u64;
    Quote {
        duration_hours,
        total_days,
        cost,
    }
}

/// Two-decimal view of a day count, for display.
pub fn round_days(days: f64) -> f64 {
    (days * 100.0).round() / 100.0
}
