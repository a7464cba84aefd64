//! Entity model: positioned things rendered on the map.
//!
//! DESIGN
//! ======
//! Plain data. Fixture ids are only unique within a kind (token "1" and
//! user "1" coexist), so every marker-bearing entity is keyed by an
//! `EntityId` that carries its kind as well as its raw id.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "entity_test.rs"]
mod entity_test;

/// Sentinel id of the viewer entity.
pub const VIEWER_ID: &str = "current";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

// =============================================================================
// POSITION
// =============================================================================

/// A geographic coordinate. Immutable; replaced wholesale on update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    latitude: f64,
    longitude: f64,
}

impl Position {
    /// Placeholder used until geolocation resolves.
    pub const ORIGIN: Self = Self { latitude: 0.0, longitude: 0.0 };

    /// Build a validated position.
    ///
    /// # Errors
    ///
    /// Returns an error if either coordinate is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EntityError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(EntityError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(EntityError::Longitude(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    /// Build a position from literals known to be in range.
    pub(crate) const fn from_static(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Coordinate pair in the map engine's `(lon, lat)` order.
    #[must_use]
    pub fn lng_lat(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Token,
    User,
    Crate,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::User => "user",
            Self::Crate => "crate",
        }
    }
}

/// Kind-qualified entity identifier. Displays as `kind:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityId {
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    #[must_use]
    pub fn token(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Token, id)
    }

    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(EntityKind::User, id)
    }

    #[must_use]
    pub fn krate(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Crate, id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// The person using this session. Exactly one per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    pub position: Position,
    pub name: String,
    pub avatar_url: String,
}

impl Viewer {
    /// A viewer parked at the placeholder position.
    #[must_use]
    pub fn placeholder(name: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self { position: Position::ORIGIN, name: name.into(), avatar_url: avatar_url.into() }
    }

    #[must_use]
    pub fn id(&self) -> &'static str {
        VIEWER_ID
    }
}

/// A collectible token placed at a fixed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub position: Position,
    pub symbol: String,
    pub name: String,
    pub logo_url: String,
    /// Accent color as a hex string.
    pub background_color: String,
}

/// Another player shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherUser {
    pub id: String,
    pub position: Position,
    pub name: String,
    pub avatar_url: String,
}

/// A loot crate. Position only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crate {
    pub id: String,
    pub position: Position,
}

/// Any entity the synchronizer can place a marker for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MapEntity {
    Token(Token),
    User(OtherUser),
    Crate(Crate),
}

impl MapEntity {
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Token(t) => EntityId::token(t.id.clone()),
            Self::User(u) => EntityId::user(u.id.clone()),
            Self::Crate(c) => EntityId::krate(c.id.clone()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Token(_) => EntityKind::Token,
            Self::User(_) => EntityKind::User,
            Self::Crate(_) => EntityKind::Crate,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            Self::Token(t) => t.position,
            Self::User(u) => u.position,
            Self::Crate(c) => c.position,
        }
    }

    /// Name shown in the detail view.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Token(t) => t.name.clone(),
            Self::User(u) => u.name.clone(),
            Self::Crate(c) => format!("Crate {}", c.id),
        }
    }

    /// Only tokens can be claimed.
    #[must_use]
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Token(_))
    }
}

impl From<Token> for MapEntity {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

impl From<OtherUser> for MapEntity {
    fn from(user: OtherUser) -> Self {
        Self::User(user)
    }
}

impl From<Crate> for MapEntity {
    fn from(c: Crate) -> Self {
        Self::Crate(c)
    }
}
