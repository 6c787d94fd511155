//! Random reading locations inside a per-identity region.
//!
//! Points are drawn uniformly over a disk of `radius_km` around the region
//! center (angle uniform, distance `sqrt(u) * radius`) and projected onto the
//! sphere with the destination-point formula.

use std::collections::HashMap;
use std::f64::consts::PI;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::CoordinatesConfig;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Center and radius of a sampling region.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CoordinateConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
}

impl CoordinateConfig {
    pub const fn new(center_lat: f64, center_lon: f64, radius_km: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            radius_km,
        }
    }
}

/// Identity to region lookup with a fallback entry.
#[derive(Debug, Clone)]
pub struct RegionTable {
    default: CoordinateConfig,
    regions: HashMap<String, CoordinateConfig>,
}

impl RegionTable {
    pub fn new(default: CoordinateConfig, regions: HashMap<String, CoordinateConfig>) -> Self {
        Self { default, regions }
    }

    pub fn from_config(config: &CoordinatesConfig) -> Self {
        Self::new(config.default, config.regions.clone())
    }

    /// Region for `identity`, or the default when it has none.
    pub fn resolve(&self, identity: &str) -> CoordinateConfig {
        self.regions
            .get(identity)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::from_config(&CoordinatesConfig::default())
    }
}

pub struct CoordinateGenerator {
    config: CoordinateConfig,
    rng: Mutex<StdRng>,
}

impl CoordinateGenerator {
    /// Generator for `identity`; the region is fixed from here on.
    pub fn new(seed: u64, identity: &str, regions: &RegionTable) -> Self {
        Self::with_config(seed, regions.resolve(identity))
    }

    pub fn with_config(seed: u64, config: CoordinateConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn current_config(&self) -> CoordinateConfig {
        self.config
    }

    /// Sample a point as `(latitude, longitude)` in degrees.
    pub fn sample(&self) -> (f64, f64) {
        let (angle, distance) = {
            let mut rng = self.rng.lock();
            let angle = rng.random::<f64>() * 2.0 * PI;
            let distance = rng.random::<f64>().sqrt() * self.config.radius_km;
            (angle, distance)
        };
        destination(
            self.config.center_lat,
            self.config.center_lon,
            angle,
            distance,
        )
    }

    /// Sample a point formatted with six decimals.
    pub fn generate(&self) -> (String, String) {
        let (lat, lon) = self.sample();
        (format!("{:.6}", lat), format!("{:.6}", lon))
    }
}

/// Point reached from `(lat, lon)` travelling `distance_km` along `bearing`
/// (radians, clockwise from north).
pub fn destination(lat: f64, lon: f64, bearing: f64, distance_km: f64) -> (f64, f64) {
    let lat1 = lat * DEG_TO_RAD;
    let lon1 = lon * DEG_TO_RAD;
    let delta = distance_km / EARTH_RADIUS_KM;

    let (sin_lat1, cos_lat1) = lat1.sin_cos();
    let (sin_delta, cos_delta) = delta.sin_cos();
    let (sin_bearing, cos_bearing) = bearing.sin_cos();

    let lat2 = (sin_lat1 * cos_delta + cos_lat1 * sin_delta * cos_bearing).asin();
    let lon2 = lon1
        + (sin_bearing * sin_delta * cos_lat1).atan2(cos_delta - sin_lat1 * lat2.sin());

    (lat2 * RAD_TO_DEG, lon2 * RAD_TO_DEG)
}

/// Haversine distance in kilometers.
pub fn great_circle_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1 * DEG_TO_RAD;
    let phi2 = lat2 * DEG_TO_RAD;
    let d_phi = (lat2 - lat1) * DEG_TO_RAD;
    let d_lambda = (lon2 - lon1) * DEG_TO_RAD;

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
