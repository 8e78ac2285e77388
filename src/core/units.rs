use thiserror::Error;

/// Sea-level barometric pressure used for rating conditions, in inHg
pub const STANDARD_PRESSURE_INHG: f64 = 29.921;
pub const KBTUH_PER_KW: f64 = 3.412;
pub const BTUH_PER_KBTUH: f64 = 1_000.;
pub const MINUTES_PER_HOUR: f64 = 60.;
pub(crate) const INHG_PER_PSI: f64 = 2.0360;
pub(crate) const SQUARE_INCHES_PER_SQUARE_FOOT: f64 = 144.;
pub(crate) const RANKINE_OFFSET: f64 = 459.67;
pub(crate) const FEET_PER_METRE: f64 = 3.281;
pub const KBTUH_PER_TON: f64 = 12.;

pub fn fahrenheit_to_celsius(temp_f: f64) -> f64 {
    (5. / 9.) * (temp_f - 32.)
}

/// Barometric pressure (inHg) at the given elevation (ft), standard atmosphere
pub fn pressure_at_elevation(elevation_ft: f64) -> Result<f64, ElevationOutOfRangeError> {
    let elevation_m = elevation_ft / FEET_PER_METRE;
    let temperature_ratio = (288. - 0.0065 * elevation_m) / 288.;
    if !temperature_ratio.is_finite() || temperature_ratio <= 0. {
        return Err(ElevationOutOfRangeError { elevation_ft });
    }

    Ok(STANDARD_PRESSURE_INHG * temperature_ratio.powf(5.256))
}

#[derive(Debug, Error)]
#[error("Elevation of {elevation_ft} ft is outside the range of the standard atmosphere")]
pub struct ElevationOutOfRangeError {
    elevation_ft: f64,
}

/// Round to the given number of decimals, resolving exact halves to the even neighbour.
pub(crate) fn round_half_even(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    let scaled = value * scale;
    let truncated = scaled.trunc();
    let fraction = (scaled - truncated).abs();
    let away = if scaled >= 0. { 1. } else { -1. };

    let rounded = if fraction < 0.5 {
        truncated
    } else if fraction > 0.5 {
        truncated + away
    } else if truncated % 2. == 0. {
        truncated
    } else {
        truncated + away
    };

    rounded / scale
}
