use super::{types::Config, ConfigError};
use crate::coordinate::CoordinateConfig;

/// Validate configuration
/// Currently validates:
/// - Transport retries, timeout and base URL
/// - Submission concurrency
/// - Morning window and gap range of the time sequencer
/// - Every sampling region (center in range, positive finite radius)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let transport = &config.transport;
    if transport.max_retries == 0 {
        return Err(invalid("transport.max_retries must be at least 1"));
    }
    if transport.request_timeout_secs == 0 {
        return Err(invalid("transport.request_timeout_secs cannot be 0"));
    }
    if reqwest::Url::parse(&transport.base_url).is_err() {
        return Err(invalid(format!(
            "transport.base_url is not a valid URL: {}",
            transport.base_url
        )));
    }

    if config.submission.max_concurrent_submissions == 0 {
        return Err(invalid("submission.max_concurrent_submissions cannot be 0"));
    }

    let time = &config.time;
    if time.start_hour_min > time.start_hour_max || time.start_hour_max > 23 {
        return Err(invalid(format!(
            "time start hours must satisfy min <= max <= 23 (got {}..={})",
            time.start_hour_min, time.start_hour_max
        )));
    }
    if time.gap_min_secs >= time.gap_max_secs {
        return Err(invalid(format!(
            "time.gap_min_secs must be below time.gap_max_secs (got {}..{})",
            time.gap_min_secs, time.gap_max_secs
        )));
    }

    validate_region("coordinates.default", &config.coordinates.default)?;
    for (identity, region) in &config.coordinates.regions {
        validate_region(&format!("coordinates.regions.{}", identity), region)?;
    }

    Ok(())
}

fn validate_region(name: &str, region: &CoordinateConfig) -> Result<(), ConfigError> {
    if !(-90.0..=90.0).contains(&region.center_lat) {
        return Err(invalid(format!("{}: latitude out of range", name)));
    }
    if !(-180.0..=180.0).contains(&region.center_lon) {
        return Err(invalid(format!("{}: longitude out of range", name)));
    }
    if !region.radius_km.is_finite() || region.radius_km <= 0.0 {
        return Err(invalid(format!("{}: radius must be positive", name)));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}
