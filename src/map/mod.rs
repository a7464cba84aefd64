//! Map engine seam.
//!
//! DESIGN
//! ======
//! The rendering engine is an opaque collaborator. Everything the rest of
//! the crate needs from it fits in five calls on `MapEngine`; the
//! synchronizer in `sync` is the only caller. `headless` provides an
//! in-memory engine for the binary and for tests.

pub mod headless;
pub mod sync;

use crate::entity::{MapEntity, Position};

pub use sync::MarkerSync;

/// Default zoom level when the map is created.
pub const DEFAULT_ZOOM: f64 = 15.0;
/// Default engine style reference.
pub const DEFAULT_STYLE: &str = "mapbox://styles/mapbox/streets-v11";
/// Pin color for the viewer marker.
pub const VIEWER_PIN_COLOR: &str = "#FF0000";
/// Edge length in pixels of custom entity markers.
pub const MARKER_SIZE_PX: u32 = 120;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The engine access token is not configured.
    #[error("map engine credential is required")]
    MissingCredential,

    /// The engine refused an operation.
    #[error("map engine failure: {0}")]
    Engine(String),
}

// =============================================================================
// HANDLES
// =============================================================================

/// One live map-engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle(pub u64);

/// One placed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

// =============================================================================
// OPTIONS / VISUALS
// =============================================================================

/// Parameters for creating a map instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub access_token: Option<String>,
    pub style: String,
    pub zoom: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { access_token: None, style: DEFAULT_STYLE.into(), zoom: DEFAULT_ZOOM }
    }
}

/// How a marker is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerVisual {
    /// Engine-styled pin in a flat color.
    Pin { color: String },
    /// Custom circular element anchored at its center.
    Element { class: String, image_url: String, alt: String, size_px: u32 },
}

impl MarkerVisual {
    #[must_use]
    pub fn viewer() -> Self {
        Self::Pin { color: VIEWER_PIN_COLOR.into() }
    }

    /// Visual for a tracked entity.
    #[must_use]
    pub fn for_entity(entity: &MapEntity) -> Self {
        let (class, image_url, alt) = match entity {
            MapEntity::Token(t) => ("token-marker", t.logo_url.clone(), t.symbol.clone()),
            MapEntity::User(u) => ("user-marker", u.avatar_url.clone(), u.name.clone()),
            MapEntity::Crate(c) => ("crate-marker", "/game-assets/crate.png".to_string(), format!("crate {}", c.id)),
        };
        Self::Element { class: class.into(), image_url, alt, size_px: MARKER_SIZE_PX }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Operations consumed from the map engine.
pub trait MapEngine {
    /// Create a map in `container` centered on `center`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot create the instance.
    fn create_instance(
        &mut self,
        container: &str,
        access_token: &str,
        style: &str,
        center: Position,
        zoom: f64,
    ) -> Result<MapHandle, MapError>;

    /// Place a marker on `map`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot place the marker.
    fn place_marker(&mut self, map: MapHandle, position: Position, visual: &MarkerVisual)
    -> Result<MarkerHandle, MapError>;

    /// Move an existing marker.
    fn move_marker(&mut self, marker: MarkerHandle, position: Position);

    fn remove_marker(&mut self, marker: MarkerHandle);

    fn destroy_instance(&mut self, map: MapHandle);
}
