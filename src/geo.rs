//! Geolocation provider seam.
//!
//! A one-shot read of the device position. Failures never reach the user:
//! the session logs them and leaves the viewer at its placeholder.

use async_trait::async_trait;

use crate::entity::{EntityError, Position};

#[cfg(test)]
#[path = "geo_test.rs"]
mod geo_test;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// The device exposes no position source.
    #[error("geolocation unavailable")]
    Unavailable,

    /// The user or platform refused access.
    #[error("geolocation permission denied")]
    Denied,

    /// The source produced an impossible coordinate.
    #[error("invalid position reading: {0}")]
    InvalidReading(#[from] EntityError),
}

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Read the current position once.
    ///
    /// # Errors
    ///
    /// Returns a `GeoError` if no position can be obtained.
    async fn current_position(&self) -> Result<Position, GeoError>;
}

/// Reports a configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Position);

#[async_trait]
impl GeolocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Position, GeoError> {
        Ok(self.0)
    }
}

/// A device without a position source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl GeolocationProvider for NoLocation {
    async fn current_position(&self) -> Result<Position, GeoError> {
        Err(GeoError::Unavailable)
    }
}

/// Build a provider from optional raw coordinates.
///
/// # Errors
///
/// Returns `GeoError::InvalidReading` if the coordinates are out of range.
pub fn provider_for(coords: Option<(f64, f64)>) -> Result<Box<dyn GeolocationProvider>, GeoError> {
    match coords {
        Some((lat, lon)) => Ok(Box::new(FixedLocation(Position::new(lat, lon)?))),
        None => Ok(Box::new(NoLocation)),
    }
}
