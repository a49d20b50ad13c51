//! Feature construction for impact inference
//!
//! Turns validated typhoon parameters into the fixed-order input vector the
//! fitted ensembles were trained on: raw intensities, log population,
//! province exposure and a handful of engineered intensity features.

use crate::models::TyphoonParams;

/// Model input schema, in vector order
pub const FEATURE_NAMES: [&str; 9] = [
    "max_wind_speed",
    "rainfall_24hr",
    "storm_duration",
    "log10_population",
    "province_exposure",
    "combined_threat_score",
    "wind_intensity_category",
    "rainfall_intensity",
    "rainfall_rate",
];

/// Wind category boundaries in km/h (depression, storm, severe storm, typhoon, super typhoon)
pub const WIND_CATEGORY_BOUNDS: [f64; 4] = [61.0, 88.0, 117.0, 184.0];

/// Rainfall intensity boundaries in mm
pub const RAINFALL_INTENSITY_BOUNDS: [f64; 4] = [50.0, 100.0, 200.0, 400.0];

/// Builds the model input vector
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder {
    reference_population: u64,
}

impl FeatureBuilder {
    pub fn new(reference_population: u64) -> Self {
        Self {
            reference_population,
        }
    }

    /// Callers validate `params` and resolve the exposure beforehand.
    pub fn build(&self, params: &TyphoonParams, exposure: f64) -> [f64; 9] {
        let population = params.population.unwrap_or(self.reference_population).max(1);

        [
            params.wind_speed,
            params.rainfall,
            params.duration,
            (population as f64).log10(),
            exposure,
            combined_threat_score(params.wind_speed, params.rainfall),
            wind_intensity_category(params.wind_speed) as f64,
            rainfall_intensity(params.rainfall) as f64,
            params.rainfall / (params.duration + 1.0),
        ]
    }
}

/// Number of boundaries strictly exceeded by `wind_kph` (0-4)
pub fn wind_intensity_category(wind_kph: f64) -> u8 {
    category(wind_kph, &WIND_CATEGORY_BOUNDS)
}

/// Number of boundaries strictly exceeded by `rainfall_mm` (0-4)
pub fn rainfall_intensity(rainfall_mm: f64) -> u8 {
    category(rainfall_mm, &RAINFALL_INTENSITY_BOUNDS)
}

pub fn combined_threat_score(wind_kph: f64, rainfall_mm: f64) -> f64 {
    wind_kph / 200.0 + rainfall_mm / 400.0
}

fn category(value: f64, bounds: &[f64]) -> u8 {
    bounds.iter().filter(|&&b| value > b).count() as u8
}
