//! In-memory map engine.
//!
//! Keeps live instances and markers in a shared table and logs every call.
//! Used by the driver binary where no rendering surface exists, and by
//! tests to observe exactly which engine operations were issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{MapEngine, MapError, MapHandle, MarkerHandle, MarkerVisual};
use crate::entity::Position;

#[cfg(test)]
#[path = "headless_test.rs"]
mod headless_test;

/// A marker as the engine sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub map: MapHandle,
    pub position: Position,
    pub visual: MarkerVisual,
}

/// Snapshot of engine state and call counters.
#[derive(Debug, Clone, Default)]
pub struct EngineLedger {
    pub instances: HashMap<MapHandle, (String, Position)>,
    pub markers: HashMap<MarkerHandle, PlacedMarker>,
    pub instances_created: usize,
    pub markers_placed: usize,
    pub markers_moved: usize,
    pub markers_removed: usize,
}

/// Cloneable engine; clones share one ledger.
#[derive(Debug, Clone, Default)]
pub struct HeadlessEngine {
    ledger: Arc<Mutex<EngineLedger>>,
    next_id: Arc<Mutex<u64>>,
    refuse_create: bool,
}

impl HeadlessEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose `create_instance` always fails.
    #[must_use]
    pub fn refusing() -> Self {
        Self { refuse_create: true, ..Self::default() }
    }

    #[must_use]
    pub fn ledger(&self) -> EngineLedger {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Position of a live marker.
    #[must_use]
    pub fn marker_position(&self, marker: MarkerHandle) -> Option<Position> {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .markers
            .get(&marker)
            .map(|m| m.position)
    }

    fn next(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        *id += 1;
        *id
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut EngineLedger) -> T) -> T {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ledger)
    }
}

impl MapEngine for HeadlessEngine {
    fn create_instance(
        &mut self,
        container: &str,
        _access_token: &str,
        style: &str,
        center: Position,
        zoom: f64,
    ) -> Result<MapHandle, MapError> {
        if self.refuse_create {
            return Err(MapError::Engine(format!("container {container} is not attached")));
        }
        let handle = MapHandle(self.next());
        self.with_ledger(|l| {
            l.instances.insert(handle, (container.to_string(), center));
            l.instances_created += 1;
        });
        debug!(map = handle.0, container, style, zoom, lng_lat = ?center.lng_lat(), "create map instance");
        Ok(handle)
    }

    fn place_marker(
        &mut self,
        map: MapHandle,
        position: Position,
        visual: &MarkerVisual,
    ) -> Result<MarkerHandle, MapError> {
        let live = self.with_ledger(|l| l.instances.contains_key(&map));
        if !live {
            return Err(MapError::Engine(format!("map {} is not live", map.0)));
        }
        let handle = MarkerHandle(self.next());
        self.with_ledger(|l| {
            l.markers.insert(handle, PlacedMarker { map, position, visual: visual.clone() });
            l.markers_placed += 1;
        });
        debug!(map = map.0, marker = handle.0, lng_lat = ?position.lng_lat(), "place marker");
        Ok(handle)
    }

    fn move_marker(&mut self, marker: MarkerHandle, position: Position) {
        self.with_ledger(|l| {
            if let Some(m) = l.markers.get_mut(&marker) {
                m.position = position;
                l.markers_moved += 1;
            }
        });
        debug!(marker = marker.0, lng_lat = ?position.lng_lat(), "move marker");
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        self.with_ledger(|l| {
            if l.markers.remove(&marker).is_some() {
                l.markers_removed += 1;
            }
        });
        debug!(marker = marker.0, "remove marker");
    }

    fn destroy_instance(&mut self, map: MapHandle) {
        self.with_ledger(|l| {
            l.instances.remove(&map);
            l.markers.retain(|_, m| m.map != map);
        });
        debug!(map = map.0, "destroy map instance");
    }
}
