//! Quest map: marker lifecycle synchronization and the token claim workflow.
//!
//! ARCHITECTURE
//! ============
//! - `entity` / `fixtures`: positioned entities and the static quest data.
//! - `map`: the map-engine seam and `MarkerSync`, which keeps one map
//!   instance and an id-indexed marker set consistent with the entities.
//! - `claim`: the claim-service wire contract, HTTP client and the
//!   `ClaimWorkflow` state machine.
//! - `session`: the session context wiring clicks, geolocation and claim
//!   outcomes through a single event queue.

pub mod claim;
pub mod config;
pub mod entity;
pub mod fixtures;
pub mod geo;
pub mod map;
pub mod notify;
pub mod session;
