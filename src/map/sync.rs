//! Marker lifecycle synchronizer.
//!
//! DESIGN
//! ======
//! `MarkerSync` exclusively owns the engine, the single live `MapHandle`
//! and an index from `EntityId` to the marker placed for it. Every change
//! to the entity set is applied as a diff against that index: departed ids
//! lose their marker, new ids get one, retained ids keep their handle and
//! are only moved if their position changed.
//!
//! Click handlers live in a table keyed by entity id, independent of marker
//! churn, and fire synchronously from `dispatch_click`.
//!
//! Handles are released on `unmount` and again (idempotently) on `Drop`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use super::{MapEngine, MapError, MapHandle, MapOptions, MarkerHandle, MarkerVisual};
use crate::entity::{EntityId, MapEntity, Position};

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

/// Callback fired when an entity's marker is activated.
pub type ClickHandler = Box<dyn FnMut(&MapEntity)>;

/// Engine operations issued by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub removed: usize,
    pub moved: usize,
}

struct Tracked {
    entity: MapEntity,
    marker: MarkerHandle,
}

struct Mounted {
    map: MapHandle,
    viewer: Position,
    viewer_marker: Option<MarkerHandle>,
    markers: HashMap<EntityId, Tracked>,
}

pub struct MarkerSync<E: MapEngine> {
    engine: E,
    options: MapOptions,
    mounted: Option<Mounted>,
    handlers: HashMap<EntityId, ClickHandler>,
}

impl<E: MapEngine> MarkerSync<E> {
    #[must_use]
    pub fn new(engine: E, options: MapOptions) -> Self {
        Self { engine, options, mounted: None, handlers: HashMap::new() }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    #[must_use]
    pub fn map_handle(&self) -> Option<MapHandle> {
        self.mounted.as_ref().map(|m| m.map)
    }

    #[must_use]
    pub fn viewer_marker(&self) -> Option<MarkerHandle> {
        self.mounted.as_ref().and_then(|m| m.viewer_marker)
    }

    #[must_use]
    pub fn marker_for(&self, id: &EntityId) -> Option<MarkerHandle> {
        self.mounted.as_ref()?.markers.get(id).map(|t| t.marker)
    }

    /// Ids currently backed by a marker, sorted.
    #[must_use]
    pub fn tracked_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> =
            self.mounted.as_ref().map(|m| m.markers.keys().cloned().collect()).unwrap_or_default();
        ids.sort();
        ids
    }

    // --- Lifecycle ---

    /// Create the map and place the initial markers.
    ///
    /// No-op when already mounted.
    ///
    /// # Errors
    ///
    /// Returns `MapError::MissingCredential` when no access token is
    /// configured, or the engine's error if the instance cannot be created.
    /// The synchronizer stays unmounted in both cases.
    pub fn mount(&mut self, container: &str, viewer: Position, entities: &[MapEntity]) -> Result<(), MapError> {
        if self.mounted.is_some() {
            debug!(container, "map already mounted; ignoring mount");
            return Ok(());
        }

        let Some(token) = self.options.access_token.as_deref().filter(|t| !t.is_empty()) else {
            error!(container, "map engine credential is required; map will not render");
            return Err(MapError::MissingCredential);
        };

        let map = self
            .engine
            .create_instance(container, token, &self.options.style, viewer, self.options.zoom)
            .inspect_err(|e| error!(container, error = %e, "map instance creation failed"))?;

        let viewer_marker = match self.engine.place_marker(map, viewer, &MarkerVisual::viewer()) {
            Ok(marker) => Some(marker),
            Err(e) => {
                warn!(error = %e, "viewer marker placement failed");
                None
            }
        };

        self.mounted = Some(Mounted { map, viewer, viewer_marker, markers: HashMap::new() });
        let stats = self.reconcile(entities);
        info!(container, map = map.0, markers = stats.created, "map mounted");
        Ok(())
    }

    /// Converge the marker set to `entities` by id.
    ///
    /// Ignored while unmounted. Duplicate ids keep their first occurrence.
    pub fn reconcile(&mut self, entities: &[MapEntity]) -> ReconcileStats {
        let Some(mounted) = self.mounted.as_mut() else {
            return ReconcileStats::default();
        };
        let engine = &mut self.engine;
        let mut stats = ReconcileStats::default();

        let mut desired: Vec<(EntityId, &MapEntity)> = Vec::with_capacity(entities.len());
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in entities {
            let id = entity.entity_id();
            if seen.insert(id.clone()) {
                desired.push((id, entity));
            } else {
                warn!(entity = %id, "duplicate entity id; keeping first");
            }
        }

        let mut departed: Vec<EntityId> = mounted.markers.keys().filter(|id| !seen.contains(*id)).cloned().collect();
        departed.sort();
        for id in departed {
            if let Some(tracked) = mounted.markers.remove(&id) {
                engine.remove_marker(tracked.marker);
                stats.removed += 1;
            }
        }

        for (id, entity) in desired {
            if let Some(tracked) = mounted.markers.get_mut(&id) {
                if tracked.entity.position() != entity.position() {
                    engine.move_marker(tracked.marker, entity.position());
                    stats.moved += 1;
                }
                tracked.entity = entity.clone();
                continue;
            }
            match engine.place_marker(mounted.map, entity.position(), &MarkerVisual::for_entity(entity)) {
                Ok(marker) => {
                    mounted.markers.insert(id, Tracked { entity: entity.clone(), marker });
                    stats.created += 1;
                }
                Err(e) => warn!(entity = %id, error = %e, "marker placement failed"),
            }
        }

        debug!(created = stats.created, removed = stats.removed, moved = stats.moved, "markers reconciled");
        stats
    }

    /// Move the viewer marker to `position`. The map instance is kept.
    pub fn update_viewer(&mut self, position: Position) {
        let Some(mounted) = self.mounted.as_mut() else {
            return;
        };
        if mounted.viewer == position && mounted.viewer_marker.is_some() {
            return;
        }
        mounted.viewer = position;
        match mounted.viewer_marker {
            Some(marker) => self.engine.move_marker(marker, position),
            None => match self.engine.place_marker(mounted.map, position, &MarkerVisual::viewer()) {
                Ok(marker) => mounted.viewer_marker = Some(marker),
                Err(e) => warn!(error = %e, "viewer marker placement failed"),
            },
        }
    }

    /// Apply a new viewer position and entity set in one pass.
    pub fn synchronize(&mut self, viewer: Position, entities: &[MapEntity]) -> ReconcileStats {
        self.update_viewer(viewer);
        self.reconcile(entities)
    }

    /// Destroy every marker and the map instance. Safe to repeat.
    pub fn unmount(&mut self) {
        self.handlers.clear();
        let Some(mounted) = self.mounted.take() else {
            return;
        };
        for tracked in mounted.markers.into_values() {
            self.engine.remove_marker(tracked.marker);
        }
        if let Some(marker) = mounted.viewer_marker {
            self.engine.remove_marker(marker);
        }
        self.engine.destroy_instance(mounted.map);
        info!(map = mounted.map.0, "map unmounted");
    }

    // --- Input ---

    /// Register `handler` for clicks on the marker of `id`, replacing any
    /// previous handler for that id.
    pub fn attach_click_handler(&mut self, id: EntityId, handler: ClickHandler) {
        self.handlers.insert(id, handler);
    }

    pub fn detach_click_handler(&mut self, id: &EntityId) {
        self.handlers.remove(id);
    }

    /// Number of registered click handlers.
    #[must_use]
    pub fn click_handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Fire the handler for `id`. Returns false if the entity is not on the
    /// map or has no handler.
    pub fn dispatch_click(&mut self, id: &EntityId) -> bool {
        let Some(mounted) = self.mounted.as_ref() else {
            return false;
        };
        let (Some(tracked), Some(handler)) = (mounted.markers.get(id), self.handlers.get_mut(id)) else {
            debug!(entity = %id, "click on untracked or unhandled marker");
            return false;
        };
        handler(&tracked.entity);
        true
    }
}

impl<E: MapEngine> Drop for MarkerSync<E> {
    fn drop(&mut self) {
        self.unmount();
    }
}
