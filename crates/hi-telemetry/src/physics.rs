//! Dew point, condensation and mould classification, seasonal targets

use hi_core::RiskTier;

const MAGNUS_A: f64 = 17.62;
const MAGNUS_B: f64 = 243.12;

/// Dew point in °C by the Magnus approximation
///
/// Returns `None` for non-positive relative humidity, where the logarithm is
/// undefined.
pub fn dew_point(temperature_c: f64, relative_humidity: f64) -> Option<f64> {
    if relative_humidity <= 0.0 {
        return None;
    }
    let gamma = (MAGNUS_A * temperature_c / (MAGNUS_B + temperature_c))
        + (relative_humidity / 100.0).ln();
    Some((MAGNUS_B * gamma) / (MAGNUS_A - gamma))
}

/// Condensation tier by dew-point spread: smaller spread, higher tier
pub fn condensation_tier(spread: f64) -> RiskTier {
    if spread <= 2.0 {
        RiskTier::Danger
    } else if spread <= 4.0 {
        RiskTier::Risk
    } else if spread <= 6.0 {
        RiskTier::Watch
    } else {
        RiskTier::Ok
    }
}

/// Mould score 0..=3 from humidity and spread
pub fn mould_level(relative_humidity: f64, spread: f64) -> u8 {
    let mut level = 0;
    if relative_humidity >= 75.0 {
        level += 2;
    } else if relative_humidity >= 68.0 {
        level += 1;
    }
    if spread <= 2.0 {
        level += 2;
    } else if spread <= 4.0 {
        level += 1;
    }
    level.min(3)
}

pub fn mould_tier(level: u8) -> RiskTier {
    match level {
        0 => RiskTier::Ok,
        1 => RiskTier::Watch,
        2 => RiskTier::Risk,
        _ => RiskTier::Danger,
    }
}

/// Target humidity band (low, high) for a calendar month (1..=12)
pub fn seasonal_band(month: u32) -> (f64, f64) {
    match month {
        11 | 12 | 1 | 2 | 3 => (45.0, 55.0),
        6..=8 => (51.0, 60.0),
        _ => (47.0, 58.0),
    }
}
