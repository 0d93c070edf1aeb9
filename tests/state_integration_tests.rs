//! Integration tests for ViewStore with view change events
//!
//! These tests verify that the ViewStore correctly:
//! - Emits change events on mutations
//! - Supports multiple subscribers, including async ones
//! - Keeps the error dialog and other dialogs mutually consistent

use bmodloader::models::Screen;
use bmodloader::{ErrorReport, ModData, ViewChange, ViewStore};
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_change_events_emitted() {
    let mut store = ViewStore::new();
    let mut rx = store.subscribe();

    store.show_loading("Loading mods sources...");

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(
        event,
        ViewChange::LoadingTextChanged {
            text: "Loading mods sources...".to_string()
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let mut store = ViewStore::new();
    let mut rx1 = store.subscribe();
    let mut rx2 = store.subscribe();
    let mut rx3 = store.subscribe();

    store.show_mods(vec![ModData::new("h1", "Cat")]);

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(
            event,
            ViewChange::ScreenChanged {
                screen: Screen::Mods
            }
        );
    }
}

#[tokio::test]
async fn test_install_cycle_events() {
    let mut store = ViewStore::new();
    store.show_mods(vec![ModData::new("h1", "Cat"), ModData::new("h2", "Dog")]);
    let mut rx = store.subscribe();

    store.update(|state| {
        state.progress.show("Installing mod 'Cat'...", "Loading mod...");
        state.progress.maximum = 2;
    });
    store.update(|state| state.progress.add_value());
    store.update(|state| state.progress.add_value());
    store.update(|state| state.progress.add_value());
    store.set_installed("h1", true);
    store.update(|state| state.progress.hide());

    let mut events = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        events.push(event);
    }

    let progress_values: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            ViewChange::ProgressUpdated { value, visible: true, .. } => Some(*value),
            _ => None,
        })
        .collect();
    // The third step is clamped to the maximum and emits nothing
    assert_eq!(progress_values, vec![0, 1, 2]);

    assert!(events.contains(&ViewChange::ModUpdated {
        mod_hash: "h1".to_string(),
        installed: true
    }));
    assert!(matches!(
        events.last(),
        Some(ViewChange::ProgressUpdated { visible: false, .. })
    ));
}

#[tokio::test]
async fn test_error_dialog_round_trip() {
    let mut store = ViewStore::new();
    let mut rx = store.subscribe();

    store.show_error(ErrorReport::fatal("Fatal Error:", "engine runtime unavailable"));
    assert!(store.state().error_report.as_ref().unwrap().terminate);

    store.dismiss_error();
    assert!(store.state().error_report.is_none());

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(matches!(
        first,
        ViewChange::ErrorReported {
            terminate: true,
            ..
        }
    ));
    assert_eq!(second, ViewChange::ErrorDismissed);
}

#[tokio::test]
async fn test_reload_replaces_mod_list() {
    let mut store = ViewStore::new();
    store.show_mods(vec![ModData::new("h1", "Cat")]);

    let changes = store.show_mods(vec![ModData::new("h2", "Dog"), ModData::new("h3", "Fox")]);

    assert!(changes.contains(&ViewChange::ModsChanged { count: 2 }));
    assert_eq!(store.state().mods.len(), 2);
    assert!(!store.state().mods.contains_key("h1"));
}
