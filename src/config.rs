//! Runtime configuration parsed from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::claim::Claimant;
use crate::claim::http::ClaimTimeouts;
use crate::entity::{EntityError, Position};
use crate::map::{DEFAULT_STYLE, DEFAULT_ZOOM, MapOptions};

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_CLAIM_SERVICE_URL: &str = "http://localhost:3000";
pub const DEFAULT_QUEST_ID: &str = "12";
pub const DEFAULT_USER_SEED: &str = "user_123";
pub const DEFAULT_SECRET_NAME: &str = "test2";
pub const DEFAULT_CLAIM_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLAIM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Parse { key: &'static str, value: String },

    #[error("{present} is set but {missing} is not")]
    PartialLocation { present: &'static str, missing: &'static str },

    #[error("invalid viewer location: {0}")]
    Location(#[from] EntityError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub map: MapOptions,
    pub claim_service_url: String,
    pub claimant: Claimant,
    pub claim_timeouts: ClaimTimeouts,
    /// Fixed device position, when one is configured.
    pub viewer_location: Option<Position>,
}

impl AppConfig {
    /// Build config from environment variables.
    ///
    /// Optional, with defaults:
    /// - `MAP_ACCESS_TOKEN`: map engine credential; the map will not mount without it
    /// - `MAP_STYLE`, `MAP_ZOOM`
    /// - `CLAIM_SERVICE_URL`: claim service base URL
    /// - `CLAIM_QUEST_ID`, `CLAIM_USER_SEED`, `CLAIM_SECRET_NAME`
    /// - `CLAIM_REQUEST_TIMEOUT_SECS` (30), `CLAIM_CONNECT_TIMEOUT_SECS` (10)
    /// - `VIEWER_LATITUDE` + `VIEWER_LONGITUDE`: both or neither
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value does not parse or is out of range
    /// (a negative or non-finite zoom, a zero timeout), or the viewer
    /// location is incomplete or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let map = MapOptions {
            access_token: env_string("MAP_ACCESS_TOKEN"),
            style: env_string("MAP_STYLE").unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            zoom: env_parse_where("MAP_ZOOM", DEFAULT_ZOOM, |z: &f64| z.is_finite() && *z >= 0.0)?,
        };

        let claim_service_url = env_string("CLAIM_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_CLAIM_SERVICE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let claimant = Claimant {
            quest_id: env_string("CLAIM_QUEST_ID").unwrap_or_else(|| DEFAULT_QUEST_ID.into()),
            user_seed: env_string("CLAIM_USER_SEED").unwrap_or_else(|| DEFAULT_USER_SEED.into()),
            secret_name: env_string("CLAIM_SECRET_NAME").unwrap_or_else(|| DEFAULT_SECRET_NAME.into()),
        };

        let claim_timeouts = ClaimTimeouts {
            request_secs: env_parse_where("CLAIM_REQUEST_TIMEOUT_SECS", DEFAULT_CLAIM_REQUEST_TIMEOUT_SECS, |s: &u64| *s > 0)?,
            connect_secs: env_parse_where("CLAIM_CONNECT_TIMEOUT_SECS", DEFAULT_CLAIM_CONNECT_TIMEOUT_SECS, |s: &u64| *s > 0)?,
        };

        let viewer_location = parse_location(env_string("VIEWER_LATITUDE"), env_string("VIEWER_LONGITUDE"))?;

        Ok(Self { map, claim_service_url, claimant, claim_timeouts, viewer_location })
    }

    /// Upper bound on one claim attempt.
    #[must_use]
    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeouts.request_secs)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse `key` if set, rejecting values that fail `accept`.
fn env_parse_where<T: FromStr>(key: &'static str, default: T, accept: impl Fn(&T) -> bool) -> Result<T, ConfigError> {
    let Some(raw) = env_string(key) else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(value) if accept(&value) => Ok(value),
        _ => Err(ConfigError::Parse { key, value: raw }),
    }
}

fn parse_location(lat: Option<String>, lon: Option<String>) -> Result<Option<Position>, ConfigError> {
    let (lat, lon) = match (lat, lon) {
        (None, None) => return Ok(None),
        (Some(_), None) => return Err(ConfigError::PartialLocation { present: "VIEWER_LATITUDE", missing: "VIEWER_LONGITUDE" }),
        (None, Some(_)) => return Err(ConfigError::PartialLocation { present: "VIEWER_LONGITUDE", missing: "VIEWER_LATITUDE" }),
        (Some(lat), Some(lon)) => (lat, lon),
    };
    let latitude: f64 = lat.parse().map_err(|_| ConfigError::Parse { key: "VIEWER_LATITUDE", value: lat.clone() })?;
    let longitude: f64 = lon.parse().map_err(|_| ConfigError::Parse { key: "VIEWER_LONGITUDE", value: lon.clone() })?;
    Ok(Some(Position::new(latitude, longitude)?))
}
