use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::coordinate::CoordinateConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub coordinates: CoordinatesConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub photo: PhotoConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Attempts per call before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound for one attempt; a timed-out attempt is retried.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum idle connections kept per host.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle connections are closed after this long.
    #[serde(default = "default_idle_lifetime")]
    pub idle_connection_secs: u64,
    /// No connection outlives this; the pool is rebuilt once it is reached.
    #[serde(default = "default_max_lifetime")]
    pub max_connection_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
            max_connections: default_max_connections(),
            idle_connection_secs: default_idle_lifetime(),
            max_connection_secs: default_max_lifetime(),
        }
    }
}

fn default_base_url() -> String {
    "http://portalapp.iconpln.co.id:8000/api-v2-acmt-prod/mobile".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_connections() -> usize {
    100
}

fn default_idle_lifetime() -> u64 {
    300 // 5 minutes
}

fn default_max_lifetime() -> u64 {
    600 // 10 minutes
}

/// Endpoints and headers for the reading submission
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_primary_path")]
    pub primary_path: String,
    /// Auxiliary (photo) endpoints. Result slots follow this order.
    #[serde(default = "default_auxiliary_paths")]
    pub auxiliary_paths: Vec<String>,
    #[serde(default = "default_primary_user_agent")]
    pub primary_user_agent: String,
    #[serde(default = "default_auxiliary_user_agent")]
    pub auxiliary_user_agent: String,
    /// Readings submitted at the same time by a batch run.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_submissions: usize,
    /// Largest batch the CLI accepts.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Service unit code, also the username prefix.
    #[serde(default = "default_unit")]
    pub unit: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            primary_path: default_primary_path(),
            auxiliary_paths: default_auxiliary_paths(),
            primary_user_agent: default_primary_user_agent(),
            auxiliary_user_agent: default_auxiliary_user_agent(),
            max_concurrent_submissions: default_max_concurrent(),
            max_batch: default_max_batch(),
            unit: default_unit(),
        }
    }
}

fn default_primary_path() -> String {
    "/setStanPrabayar".to_string()
}

fn default_auxiliary_paths() -> Vec<String> {
    vec![
        "/uploadFoto52".to_string(),
        "/uploadFoto2".to_string(),
        "/uploadFoto3".to_string(),
    ]
}

fn default_primary_user_agent() -> String {
    "Dalvik/2.1.0".to_string()
}

fn default_auxiliary_user_agent() -> String {
    "Apache-HttpClient/UNAVAILABLE".to_string()
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_batch() -> usize {
    110
}

fn default_unit() -> String {
    "52260".to_string()
}

/// Bulk record fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_path")]
    pub path: String,
    #[serde(default = "default_fetch_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            path: default_fetch_path(),
            user_agent: default_fetch_user_agent(),
        }
    }
}

fn default_fetch_path() -> String {
    "/getAllStanPrabayar".to_string()
}

fn default_fetch_user_agent() -> String {
    "Apache-HttpClient/UNAVAILABLE (java 1.4)".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("prepaidData.db")
}

/// Identity to sampling region table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatesConfig {
    /// Region used when the identity has no entry.
    #[serde(default = "default_region")]
    pub default: CoordinateConfig,
    #[serde(default = "default_regions")]
    pub regions: HashMap<String, CoordinateConfig>,
}

impl Default for CoordinatesConfig {
    fn default() -> Self {
        Self {
            default: default_region(),
            regions: default_regions(),
        }
    }
}

fn default_region() -> CoordinateConfig {
    CoordinateConfig::new(-7.093408, 109.280774, 7.00)
}

fn default_regions() -> HashMap<String, CoordinateConfig> {
    HashMap::from([
        (
            "52260.j03".to_string(),
            CoordinateConfig::new(-7.139337, 109.252766, 0.01),
        ),
        (
            "52260.j07".to_string(),
            CoordinateConfig::new(-7.139305, 109.241971, 1.00),
        ),
        (
            "52260.j08".to_string(),
            CoordinateConfig::new(-7.09902, 109.32261, 0.01),
        ),
    ])
}

/// Reading timestamp sequence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeConfig {
    /// First reading hour is drawn from `start_hour_min..=start_hour_max`.
    #[serde(default = "default_start_hour_min")]
    pub start_hour_min: u32,
    #[serde(default = "default_start_hour_max")]
    pub start_hour_max: u32,
    /// Gap between readings, `gap_min_secs..gap_max_secs`.
    #[serde(default = "default_gap_min")]
    pub gap_min_secs: u32,
    #[serde(default = "default_gap_max")]
    pub gap_max_secs: u32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start_hour_min: default_start_hour_min(),
            start_hour_max: default_start_hour_max(),
            gap_min_secs: default_gap_min(),
            gap_max_secs: default_gap_max(),
        }
    }
}

fn default_start_hour_min() -> u32 {
    7
}

fn default_start_hour_max() -> u32 {
    8
}

fn default_gap_min() -> u32 {
    120
}

fn default_gap_max() -> u32 {
    240
}

/// Photo sent with every auxiliary upload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PhotoConfig {
    /// JPEG file to attach. Uploads carry an empty photo when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
