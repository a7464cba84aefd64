//! Session context: one viewer, one map, one claim workflow.
//!
//! DESIGN
//! ======
//! `Session` owns the session-lifetime state (viewer, entity set) and wires
//! the synchronizer to the workflow. All inputs (marker clicks, close and
//! submit intents, geolocation results, claim outcomes) travel through one
//! unbounded queue and are applied in dispatch order by `handle`.
//!
//! The only suspension point is the claim request, which runs on a spawned
//! task and posts its outcome back onto the queue as `ClaimResolved`.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::claim::workflow::{ClaimTicket, Resolution, run_claim};
use crate::claim::{ClaimError, ClaimReceipt, ClaimService, ClaimStatus, ClaimWorkflow};
use crate::entity::{EntityId, EntityKind, MapEntity, Position, Viewer};
use crate::geo::{GeoError, GeolocationProvider};
use crate::map::{MapEngine, MapError, MarkerSync};

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

#[derive(Debug)]
pub enum SessionEvent {
    MarkerClicked(MapEntity),
    CloseRequested,
    ClaimRequested,
    RetryRequested,
    PositionResolved(Result<Position, GeoError>),
    ClaimResolved { ticket: ClaimTicket, outcome: Result<ClaimReceipt, ClaimError> },
}

pub struct Session<E: MapEngine> {
    viewer: Viewer,
    entities: Vec<MapEntity>,
    markers: MarkerSync<E>,
    workflow: ClaimWorkflow,
    service: Arc<dyn ClaimService>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<E: MapEngine> Session<E> {
    #[must_use]
    pub fn new(
        viewer: Viewer,
        entities: Vec<MapEntity>,
        markers: MarkerSync<E>,
        workflow: ClaimWorkflow,
        service: Arc<dyn ClaimService>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { viewer, entities, markers, workflow, service, tx, rx }
    }

    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    #[must_use]
    pub fn entities(&self) -> &[MapEntity] {
        &self.entities
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerSync<E> {
        &self.markers
    }

    #[must_use]
    pub fn workflow(&self) -> &ClaimWorkflow {
        &self.workflow
    }

    /// Handle for posting events from outside the session.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.tx.clone()
    }

    // --- Map lifecycle ---

    /// Mount the map and route token and user clicks into the workflow.
    ///
    /// # Errors
    ///
    /// The synchronizer's mount error. The session stays usable without a map.
    pub fn mount(&mut self, container: &str) -> Result<(), MapError> {
        self.markers.mount(container, self.viewer.position, &self.entities)?;
        self.attach_handlers();
        Ok(())
    }

    pub fn unmount(&mut self) {
        self.markers.unmount();
        self.workflow.close();
    }

    /// Replace the entity set and reconcile markers against it.
    pub fn set_entities(&mut self, entities: Vec<MapEntity>) {
        let incoming: HashSet<EntityId> = entities.iter().map(MapEntity::entity_id).collect();
        for id in self.entities.iter().map(MapEntity::entity_id).filter(|id| !incoming.contains(id)) {
            self.markers.detach_click_handler(&id);
        }
        self.entities = entities;
        let stats = self.markers.reconcile(&self.entities);
        debug!(created = stats.created, removed = stats.removed, "entity set replaced");
        self.attach_handlers();
    }

    fn attach_handlers(&mut self) {
        for entity in &self.entities {
            if !matches!(entity.kind(), EntityKind::Token | EntityKind::User) {
                continue;
            }
            let tx = self.tx.clone();
            self.markers.attach_click_handler(
                entity.entity_id(),
                Box::new(move |clicked| {
                    let _ = tx.send(SessionEvent::MarkerClicked(clicked.clone()));
                }),
            );
        }
    }

    // --- Inputs ---

    /// Activate the marker for `id` as the hosting UI would on tap.
    pub fn click(&mut self, id: &EntityId) -> bool {
        self.markers.dispatch_click(id)
    }

    /// Read the device position once and queue the result.
    pub async fn locate(&self, provider: &dyn GeolocationProvider) {
        let result = provider.current_position().await;
        let _ = self.tx.send(SessionEvent::PositionResolved(result));
    }

    /// Apply one event.
    ///
    /// Returns the workflow resolution when the event was a claim outcome.
    pub fn handle(&mut self, event: SessionEvent) -> Option<Resolution> {
        match event {
            SessionEvent::MarkerClicked(entity) => {
                if let Err(e) = self.workflow.select(entity) {
                    debug!(error = %e, "marker click ignored");
                }
            }
            SessionEvent::CloseRequested => self.workflow.close(),
            SessionEvent::RetryRequested => {
                if let Err(e) = self.workflow.retry() {
                    debug!(error = %e, "retry ignored");
                }
            }
            SessionEvent::ClaimRequested => self.start_claim(),
            SessionEvent::PositionResolved(Ok(position)) => {
                info!(lng_lat = ?position.lng_lat(), "viewer located");
                self.viewer.position = position;
                self.markers.update_viewer(position);
            }
            SessionEvent::PositionResolved(Err(e)) => {
                warn!(error = %e, "geolocation failed; keeping placeholder position");
            }
            SessionEvent::ClaimResolved { ticket, outcome } => {
                return Some(self.workflow.complete(ticket, outcome));
            }
        }
        None
    }

    fn start_claim(&mut self) {
        // Must precede `begin_submit`: without a runtime the workflow stays `selected`.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("claim request dropped: no async runtime to run it on");
            return;
        };
        let pending = match self.workflow.begin_submit(self.viewer.position) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "claim request ignored");
                return;
            }
        };
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let limit = self.workflow.timeout();
        runtime.spawn(async move {
            let outcome = run_claim(service.as_ref(), &pending.request, limit).await;
            let _ = tx.send(SessionEvent::ClaimResolved { ticket: pending.ticket, outcome });
        });
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
            applied += 1;
        }
        applied
    }

    /// Process events until the in-flight claim resolves.
    ///
    /// Returns `None` immediately when nothing is being submitted.
    pub async fn await_claim(&mut self) -> Option<Resolution> {
        while self.workflow.status() == ClaimStatus::Submitting {
            let event = self.rx.recv().await?;
            if let Some(resolution) = self.handle(event) {
                if resolution != Resolution::Stale {
                    return Some(resolution);
                }
            }
        }
        None
    }
}
