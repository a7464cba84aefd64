use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use proptest::prelude::*;

use super::*;
use crate::entity::{Crate, OtherUser, Token};
use crate::map::headless::HeadlessEngine;

// =============================================================================
// HELPERS
// =============================================================================

fn options() -> MapOptions {
    MapOptions { access_token: Some("pk.test".into()), ..MapOptions::default() }
}

fn token(id: &str, lat: f64, lon: f64) -> MapEntity {
    MapEntity::Token(Token {
        id: id.into(),
        position: Position::new(lat, lon).unwrap(),
        symbol: format!("T{id}"),
        name: format!("Token {id}"),
        logo_url: "/t.png".into(),
        background_color: "#8A2BE2".into(),
    })
}

fn mounted(entities: &[MapEntity]) -> (MarkerSync<HeadlessEngine>, HeadlessEngine) {
    let engine = HeadlessEngine::new();
    let observer = engine.clone();
    let mut sync = MarkerSync::new(engine, options());
    sync.mount("map", Position::ORIGIN, entities).unwrap();
    (sync, observer)
}

// =============================================================================
// MOUNT
// =============================================================================

#[test]
fn mount_places_viewer_and_entity_markers() {
    let (sync, engine) = mounted(&[token("1", 26.91, 75.78), token("2", 26.92, 75.79)]);
    let ledger = engine.ledger();

    assert_eq!(ledger.instances.len(), 1);
    assert_eq!(ledger.markers.len(), 3);
    assert!(sync.viewer_marker().is_some());
    assert_eq!(sync.tracked_ids(), vec![EntityId::token("1"), EntityId::token("2")]);
}

#[test]
fn mount_uses_pin_for_viewer_and_element_for_token() {
    let (sync, engine) = mounted(&[token("1", 26.91, 75.78)]);
    let ledger = engine.ledger();

    let viewer = &ledger.markers[&sync.viewer_marker().unwrap()];
    assert_eq!(viewer.visual, MarkerVisual::Pin { color: "#FF0000".into() });

    let tok = &ledger.markers[&sync.marker_for(&EntityId::token("1")).unwrap()];
    assert!(matches!(&tok.visual, MarkerVisual::Element { class, alt, size_px: 120, .. }
        if class == "token-marker" && alt == "T1"));
}

#[test]
fn mount_twice_keeps_one_map() {
    let (mut sync, engine) = mounted(&[token("1", 26.91, 75.78)]);
    let first = sync.map_handle();

    sync.mount("map", Position::ORIGIN, &[token("1", 26.91, 75.78)]).unwrap();

    assert_eq!(sync.map_handle(), first);
    assert_eq!(engine.ledger().instances_created, 1);
    assert_eq!(engine.ledger().instances.len(), 1);
}

#[test]
fn mount_without_credential_fails_and_stays_unmounted() {
    let engine = HeadlessEngine::new();
    let observer = engine.clone();
    let mut sync = MarkerSync::new(engine, MapOptions::default());

    let err = sync.mount("map", Position::ORIGIN, &[token("1", 1.0, 1.0)]).unwrap_err();

    assert_eq!(err, MapError::MissingCredential);
    assert!(!sync.is_mounted());
    assert_eq!(observer.ledger().instances_created, 0);
}

#[test]
fn mount_with_empty_credential_is_missing() {
    let mut sync =
        MarkerSync::new(HeadlessEngine::new(), MapOptions { access_token: Some(String::new()), ..options() });
    assert_eq!(sync.mount("map", Position::ORIGIN, &[]), Err(MapError::MissingCredential));
}

#[test]
fn mount_surfaces_engine_failure() {
    let mut sync = MarkerSync::new(HeadlessEngine::refusing(), options());
    assert!(matches!(sync.mount("map", Position::ORIGIN, &[]), Err(MapError::Engine(_))));
    assert!(!sync.is_mounted());
}

// =============================================================================
// RECONCILE
// =============================================================================

#[test]
fn reconcile_adding_one_entity_creates_exactly_one_marker() {
    let (mut sync, engine) = mounted(&[token("1", 26.91, 75.78)]);
    let before = sync.marker_for(&EntityId::token("1"));

    let stats = sync.reconcile(&[token("1", 26.91, 75.78), token("2", 26.92, 75.79)]);

    assert_eq!(stats, ReconcileStats { created: 1, removed: 0, moved: 0 });
    assert_eq!(sync.marker_for(&EntityId::token("1")), before);
    assert_eq!(engine.ledger().markers_removed, 0);
}

#[test]
fn reconcile_removes_departed_and_keeps_retained_handles() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0), token("2", 2.0, 2.0), token("3", 3.0, 3.0)]);
    let kept = sync.marker_for(&EntityId::token("2"));
    let gone = sync.marker_for(&EntityId::token("1")).unwrap();

    let stats = sync.reconcile(&[token("2", 2.0, 2.0), token("4", 4.0, 4.0)]);

    assert_eq!(stats.created, 1);
    assert_eq!(stats.removed, 2);
    assert_eq!(sync.tracked_ids(), vec![EntityId::token("2"), EntityId::token("4")]);
    assert_eq!(sync.marker_for(&EntityId::token("2")), kept);
    assert!(!engine.ledger().markers.contains_key(&gone));
}

#[test]
fn reconcile_marker_set_matches_input_ids() {
    let (mut sync, engine) = mounted(&[token("a", 1.0, 1.0), token("b", 2.0, 2.0)]);
    let next = [token("b", 2.0, 2.0), token("c", 3.0, 3.0), token("d", 4.0, 4.0)];

    sync.reconcile(&next);

    let expected: Vec<EntityId> = next.iter().map(MapEntity::entity_id).collect();
    assert_eq!(sync.tracked_ids(), expected);
    // three entity markers plus the viewer
    assert_eq!(engine.ledger().markers.len(), 4);
}

#[test]
fn reconcile_moves_retained_entity_in_place() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0)]);
    let handle = sync.marker_for(&EntityId::token("1")).unwrap();

    let stats = sync.reconcile(&[token("1", 5.0, 5.0)]);

    assert_eq!(stats, ReconcileStats { created: 0, removed: 0, moved: 1 });
    assert_eq!(sync.marker_for(&EntityId::token("1")), Some(handle));
    assert_eq!(engine.marker_position(handle), Some(Position::new(5.0, 5.0).unwrap()));
}

#[test]
fn reconcile_with_same_set_issues_no_engine_calls() {
    let entities = [token("1", 1.0, 1.0), token("2", 2.0, 2.0)];
    let (mut sync, engine) = mounted(&entities);
    let placed = engine.ledger().markers_placed;

    assert_eq!(sync.reconcile(&entities), ReconcileStats::default());
    assert_eq!(engine.ledger().markers_placed, placed);
}

#[test]
fn reconcile_distinguishes_kinds_with_same_raw_id() {
    let user = MapEntity::User(OtherUser {
        id: "1".into(),
        position: Position::new(2.0, 2.0).unwrap(),
        name: "Alice".into(),
        avatar_url: "/a.png".into(),
    });
    let krate = MapEntity::Crate(Crate { id: "1".into(), position: Position::new(3.0, 3.0).unwrap() });
    let (sync, _engine) = mounted(&[token("1", 1.0, 1.0), user, krate]);

    assert_eq!(sync.tracked_ids().len(), 3);
}

#[test]
fn reconcile_ignores_duplicate_ids() {
    let (sync, _engine) = mounted(&[token("1", 1.0, 1.0), token("1", 9.0, 9.0)]);
    assert_eq!(sync.tracked_ids(), vec![EntityId::token("1")]);
}

#[test]
fn reconcile_while_unmounted_is_noop() {
    let engine = HeadlessEngine::new();
    let observer = engine.clone();
    let mut sync = MarkerSync::new(engine, options());

    assert_eq!(sync.reconcile(&[token("1", 1.0, 1.0)]), ReconcileStats::default());
    assert_eq!(observer.ledger().markers_placed, 0);
}

// =============================================================================
// VIEWER
// =============================================================================

#[test]
fn viewer_update_moves_marker_without_new_map() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0)]);
    let map = sync.map_handle();
    let marker = sync.viewer_marker().unwrap();
    let jaipur = Position::new(26.92, 75.78).unwrap();

    sync.update_viewer(jaipur);

    assert_eq!(sync.map_handle(), map);
    assert_eq!(sync.viewer_marker(), Some(marker));
    assert_eq!(engine.marker_position(marker), Some(jaipur));
    assert_eq!(engine.ledger().instances_created, 1);
}

#[test]
fn synchronize_applies_viewer_and_entities() {
    let (mut sync, engine) = mounted(&[]);
    let jaipur = Position::new(26.92, 75.78).unwrap();

    let stats = sync.synchronize(jaipur, &[token("1", 1.0, 1.0)]);

    assert_eq!(stats.created, 1);
    assert_eq!(engine.marker_position(sync.viewer_marker().unwrap()), Some(jaipur));
}

// =============================================================================
// UNMOUNT
// =============================================================================

#[test]
fn unmount_releases_everything() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0), token("2", 2.0, 2.0)]);

    sync.unmount();

    let ledger = engine.ledger();
    assert!(ledger.instances.is_empty());
    assert!(ledger.markers.is_empty());
    assert!(!sync.is_mounted());
    assert!(sync.tracked_ids().is_empty());
}

#[test]
fn unmount_is_idempotent() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0)]);
    sync.unmount();
    sync.unmount();
    assert!(engine.ledger().instances.is_empty());
}

#[test]
fn unmount_without_mount_is_noop() {
    let engine = HeadlessEngine::new();
    let observer = engine.clone();
    let mut sync = MarkerSync::new(engine, options());
    sync.unmount();
    assert_eq!(observer.ledger().markers_removed, 0);
}

#[test]
fn drop_releases_handles() {
    let (sync, engine) = mounted(&[token("1", 1.0, 1.0)]);
    drop(sync);
    let ledger = engine.ledger();
    assert!(ledger.instances.is_empty());
    assert!(ledger.markers.is_empty());
}

#[test]
fn remount_after_unmount_creates_fresh_map() {
    let (mut sync, engine) = mounted(&[token("1", 1.0, 1.0)]);
    sync.unmount();
    sync.mount("map", Position::ORIGIN, &[token("1", 1.0, 1.0)]).unwrap();
    assert_eq!(engine.ledger().instances_created, 2);
    assert_eq!(engine.ledger().instances.len(), 1);
}

// =============================================================================
// CLICKS
// =============================================================================

#[test]
fn click_handler_receives_entity() {
    let (mut sync, _engine) = mounted(&[token("1", 1.0, 1.0)]);
    let clicked = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&clicked);
    sync.attach_click_handler(EntityId::token("1"), Box::new(move |e| sink.borrow_mut().push(e.entity_id())));

    assert!(sync.dispatch_click(&EntityId::token("1")));
    assert_eq!(*clicked.borrow(), vec![EntityId::token("1")]);
}

#[test]
fn click_handler_survives_unrelated_reconcile() {
    let (mut sync, _engine) = mounted(&[token("1", 1.0, 1.0)]);
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    sync.attach_click_handler(EntityId::token("1"), Box::new(move |_| *sink.borrow_mut() += 1));

    sync.reconcile(&[token("1", 1.0, 1.0), token("2", 2.0, 2.0)]);
    sync.dispatch_click(&EntityId::token("1"));

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn click_on_departed_entity_is_ignored() {
    let (mut sync, _engine) = mounted(&[token("1", 1.0, 1.0)]);
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    sync.attach_click_handler(EntityId::token("1"), Box::new(move |_| *sink.borrow_mut() += 1));

    sync.reconcile(&[]);

    assert!(!sync.dispatch_click(&EntityId::token("1")));
    assert_eq!(*count.borrow(), 0);
}

#[test]
fn click_without_handler_returns_false() {
    let (mut sync, _engine) = mounted(&[token("1", 1.0, 1.0)]);
    assert!(!sync.dispatch_click(&EntityId::token("1")));
}

#[test]
fn detach_click_handler_stops_dispatch() {
    let (mut sync, _engine) = mounted(&[token("1", 1.0, 1.0)]);
    sync.attach_click_handler(EntityId::token("1"), Box::new(|_| {}));
    sync.detach_click_handler(&EntityId::token("1"));
    assert!(!sync.dispatch_click(&EntityId::token("1")));
}

// =============================================================================
// PROPERTIES
// =============================================================================

prop_compose! {
    /// Entity sets as `id -> position slot`, so retained ids may also move.
    fn entity_set()(slots in prop::collection::btree_map(0u8..20, 0u8..4, 0..12)) -> BTreeMap<u8, u8> {
        slots
    }
}

fn tokens_at(set: &BTreeMap<u8, u8>) -> Vec<MapEntity> {
    set.iter().map(|(id, slot)| token(&id.to_string(), 26.9 + f64::from(*slot) / 100.0, 75.78)).collect()
}

proptest! {
    #[test]
    fn reconcile_converges_to_any_new_set(before in entity_set(), after in entity_set()) {
        let (mut sync, engine) = mounted(&tokens_at(&before));
        let handles: BTreeMap<u8, MarkerHandle> = before
            .keys()
            .map(|id| (*id, sync.marker_for(&EntityId::token(id.to_string())).unwrap()))
            .collect();

        let stats = sync.reconcile(&tokens_at(&after));

        let mut expected: Vec<EntityId> = after.keys().map(|id| EntityId::token(id.to_string())).collect();
        expected.sort();
        prop_assert_eq!(sync.tracked_ids(), expected);
        prop_assert_eq!(engine.ledger().markers.len(), after.len() + 1);
        prop_assert_eq!(stats.created, after.keys().filter(|id| !before.contains_key(id)).count());
        prop_assert_eq!(stats.removed, before.keys().filter(|id| !after.contains_key(id)).count());

        for (id, slot) in &after {
            let handle = sync.marker_for(&EntityId::token(id.to_string())).unwrap();
            if let Some(previous) = handles.get(id) {
                prop_assert_eq!(handle, *previous);
            }
            let lat = 26.9 + f64::from(*slot) / 100.0;
            prop_assert_eq!(engine.marker_position(handle), Some(Position::new(lat, 75.78).unwrap()));
        }
    }
}
