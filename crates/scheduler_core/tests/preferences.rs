use chrono::{FixedOffset, NaiveDate};
use rusqlite::Connection;
use scheduler_core::db::{open_db, open_db_in_memory};
use scheduler_core::{
    PrefError, PreferenceService, PreferenceStore, SchedulerSession, SqlitePreferenceStore,
    ViewMode, ViewModeKind, ViewPreferences,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn store_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqlitePreferenceStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        PrefError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn store_overwrites_and_removes_per_page() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePreferenceStore::try_new(&conn).unwrap();

    store.set("board", "column_widths", "[100.0]").unwrap();
    store.set("board", "column_widths", "[140.0]").unwrap();
    store.set("other", "column_widths", "[90.0]").unwrap();

    assert_eq!(
        store.get("board", "column_widths").unwrap().as_deref(),
        Some("[140.0]")
    );
    store.remove("board", "column_widths").unwrap();
    store.remove("board", "column_widths").unwrap();
    assert_eq!(store.get("board", "column_widths").unwrap(), None);
    assert!(store.get("other", "column_widths").unwrap().is_some());
}

#[test]
fn blank_keys_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePreferenceStore::try_new(&conn).unwrap();
    assert!(matches!(
        store.set("  ", "column_widths", "[]"),
        Err(PrefError::InvalidKey(_))
    ));
}

#[test]
fn preferences_survive_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scheduler_prefs.db");
    let viewer = FixedOffset::east_opt(0).unwrap();

    {
        let conn = open_db(&path).unwrap();
        let store = SqlitePreferenceStore::try_new(&conn).unwrap();
        let service = PreferenceService::new(store, "board");
        let mut session = SchedulerSession::open(service, viewer, date(2024, 3, 14)).unwrap();
        session.set_view_mode(ViewModeKind::Day).unwrap();
        session.next().unwrap();
        session.collapse_node("floor-1").unwrap();
        session.set_column_widths(vec![220.0, 90.0]).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let store = SqlitePreferenceStore::try_new(&conn).unwrap();
    let service = PreferenceService::new(store, "board");
    let restored = service.load().unwrap();
    assert_eq!(restored.column_widths, vec![220.0, 90.0]);
    assert!(restored.is_collapsed("floor-1"));
    assert_eq!(restored.last_view_mode, Some(ViewModeKind::Day));
    assert_eq!(restored.last_anchor_date, Some(date(2024, 3, 15)));

    let session = SchedulerSession::open(service, viewer, date(2024, 6, 1)).unwrap();
    assert_eq!(session.mode(), ViewMode::Day);
    assert_eq!(session.anchor(), date(2024, 3, 15));
}

#[test]
fn unusable_widths_are_stored_as_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scheduler_prefs.db");
    let viewer = FixedOffset::east_opt(0).unwrap();

    {
        let conn = open_db(&path).unwrap();
        let store = SqlitePreferenceStore::try_new(&conn).unwrap();
        let service = PreferenceService::new(store, "board");
        let mut session = SchedulerSession::open(service, viewer, date(2024, 3, 14)).unwrap();
        session
            .set_column_widths(vec![f64::NAN, 120.0, -5.0, f64::INFINITY])
            .unwrap();
        assert_eq!(
            session.view_preferences().column_widths,
            vec![0.0, 120.0, 0.0, 0.0]
        );
    }

    let conn = open_db(&path).unwrap();
    let store = SqlitePreferenceStore::try_new(&conn).unwrap();
    let restored = PreferenceService::new(store, "board").load().unwrap();
    assert_eq!(restored.column_widths, vec![0.0, 120.0, 0.0, 0.0]);
}

#[test]
fn clear_resets_page_to_defaults() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePreferenceStore::try_new(&conn).unwrap();
    let service = PreferenceService::new(store, "board");
    service.save_column_widths(&[150.0]).unwrap();
    service.clear().unwrap();
    assert_eq!(service.load().unwrap(), ViewPreferences::default());
}
