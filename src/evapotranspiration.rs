//! Reference evapotranspiration (ET0) estimate, Hargreaves-Samani.
//!
//! `ET0 = 0.0023 * Ra * sqrt(Tmax - Tmin) * (Tmean + 17.8)` in mm/day, where
//! `Ra` is either a supplied radiation value or the extraterrestrial
//! radiation derived from latitude and day of year.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::models::round2;

// ---

#[derive(Debug, Error, PartialEq)]
pub enum EvapotranspirationError {
    #[error("maximum temperature {max}°C is below minimum temperature {min}°C")]
    InvertedRange { max: f64, min: f64 },
}

/// Estimate ET0 in mm/day, rounded to two decimals.
///
/// `solar_radiation` is used directly when present and non-zero; otherwise
/// the extraterrestrial radiation for `latitude`/`day_of_year` is computed.
pub fn estimate_et(
    temp_mean: f64,
    temp_max: f64,
    temp_min: f64,
    latitude: f64,
    day_of_year: u32,
    solar_radiation: Option<f64>,
) -> Result<f64, EvapotranspirationError> {
    // ---
    if temp_max < temp_min {
        return Err(EvapotranspirationError::InvertedRange {
            max: temp_max,
            min: temp_min,
        });
    }

    let radiation = match solar_radiation {
        Some(r) if r != 0.0 => r,
        _ => extraterrestrial_radiation(latitude, day_of_year),
    };

    let et0 = 0.0023 * radiation * (temp_max - temp_min).sqrt() * (temp_mean + 17.8);
    Ok(round2(et0))
}

/// Extraterrestrial radiation for a latitude (degrees) and day of year.
pub fn extraterrestrial_radiation(latitude: f64, day_of_year: u32) -> f64 {
    // ---
    let lat_rad = latitude * PI / 180.0;
    let year_angle = 2.0 * PI * f64::from(day_of_year) / 365.0;

    let declination = 0.409 * (year_angle - 1.39).sin();
    let dr = 1.0 + 0.033 * year_angle.cos();

    // Clamped so polar day/night yield pi / 0 instead of NaN
    let cos_ws = (-lat_rad.tan() * declination.tan()).clamp(-1.0, 1.0);
    let sunset_hour_angle = cos_ws.acos();

    (24.0 * 60.0 / PI)
        * 0.082
        * dr
        * (sunset_hour_angle * lat_rad.sin() * declination.sin()
            + lat_rad.cos() * declination.cos() * sunset_hour_angle.sin())
}

/// Rough illuminance to radiation proxy: 1 lux ≈ 0.0079 W/m², and 1 W/m²
/// over a day ≈ 0.0864 MJ/m².
pub fn lux_to_solar_radiation(lux: f64) -> f64 {
    lux * 0.0079 * 0.0864
}

/// Day of year, 1-based.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_reference_value_brasilia_june() {
        // ---
        // Ra = 26.172 for lat -15.78 on day 172; 0.0023 * 26.172 * sqrt(10) * 37.8 = 7.195
        let et = estimate_et(20.0, 25.0, 15.0, -15.78, 172, None).unwrap();
        assert_eq!(et, 7.2);
    }

    #[test]
    fn test_result_is_deterministic() {
        // ---
        let a = estimate_et(20.0, 25.0, 15.0, -15.78, 172, None).unwrap();
        let b = estimate_et(20.0, 25.0, 15.0, -15.78, 172, None).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        assert!(a > 0.0);
    }

    #[test]
    fn test_warmer_day_raises_et() {
        // ---
        let mild = estimate_et(20.0, 25.0, 15.0, -15.78, 172, None).unwrap();
        let hot = estimate_et(28.0, 33.0, 23.0, -15.78, 172, None).unwrap();
        assert_eq!(hot, 8.72);
        assert!(hot > mild);
    }

    #[test]
    fn test_supplied_radiation_overrides_latitude() {
        // ---
        let radiation = lux_to_solar_radiation(50_000.0);
        assert!((radiation - 34.128).abs() < 1e-9);

        let et = estimate_et(20.0, 25.0, 15.0, -15.78, 172, Some(radiation)).unwrap();
        assert_eq!(et, 9.38);

        // Zero counts as "not supplied"
        let et_zero = estimate_et(20.0, 25.0, 15.0, -15.78, 172, Some(0.0)).unwrap();
        assert_eq!(et_zero, 7.2);
    }

    #[test]
    fn test_flat_temperature_gives_zero() {
        // ---
        assert_eq!(estimate_et(15.0, 15.0, 15.0, -15.78, 172, None).unwrap(), 0.0);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        // ---
        let err = estimate_et(20.0, 15.0, 25.0, -15.78, 172, None).unwrap_err();
        assert_eq!(
            err,
            EvapotranspirationError::InvertedRange {
                max: 15.0,
                min: 25.0
            }
        );
    }

    #[test]
    fn test_polar_latitudes_stay_finite() {
        // ---
        let midnight_sun = estimate_et(20.0, 25.0, 15.0, 80.0, 172, None).unwrap();
        assert_eq!(midnight_sun, 12.3);

        let polar_night = estimate_et(20.0, 25.0, 15.0, -80.0, 172, None).unwrap();
        assert_eq!(polar_night, 0.0);
    }

    #[test]
    fn test_day_of_year() {
        // ---
        assert_eq!(day_of_year(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), 1);
        assert_eq!(day_of_year(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap()), 172);
        assert_eq!(day_of_year(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()), 366);
    }
}
