use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use scheduler_core::{
    EditError, EventChange, FetchError, MemoryPreferenceStore, PreferenceService, RefreshOutcome,
    SchedulerPayload, SchedulerSession, SessionError, ViewMode, ViewModeKind,
};
use serde_json::{json, Value};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
}

fn viewer() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

fn payload(room_name: &str) -> SchedulerPayload {
    let value: Value = json!({
        "mapping": {
            "thn__Event_Start_Date_API_Field__c": "Arrival__c",
            "thn__Event_End_Date_API_Field__c": "Departure__c",
            "thn__Event_Parent_Resource_API_Field__c": "Room__c",
            "thn__Resource_Name_API_Field__c": "Name",
            "thn__Resource_Bookable_API_Field__c": "Bookable__c"
        },
        "resources": {
            "r1": {"Id": "r1", "Name": room_name, "Bookable__c": true},
            "r2": {"Id": "r2", "Name": "Storage", "Bookable__c": false}
        },
        "events": [],
        "timezoneOffset": 3
    });
    serde_json::from_value(value).unwrap()
}

fn open_session() -> SchedulerSession<MemoryPreferenceStore> {
    let preferences = PreferenceService::new(MemoryPreferenceStore::new(), "booking-board");
    SchedulerSession::open(preferences, viewer(), date(2024, 3, 14)).unwrap()
}

fn loaded_session() -> SchedulerSession<MemoryPreferenceStore> {
    let mut session = open_session();
    let ticket = session.begin_refresh();
    let outcome = session.complete_refresh(ticket, Ok(payload("Room 1"))).unwrap();
    assert_eq!(outcome, RefreshOutcome::Applied);
    session
}

#[test]
fn superseded_response_is_discarded() {
    let mut session = open_session();
    let first = session.begin_refresh();
    let second = session.next().unwrap();

    let stale = session.complete_refresh(first, Ok(payload("Old"))).unwrap();
    assert_eq!(stale, RefreshOutcome::Stale);
    assert!(session.snapshot().is_none());

    session.complete_refresh(second, Ok(payload("New"))).unwrap();
    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.find_resource("r1").unwrap().name, "New");
    assert_eq!(snapshot.window, second.window);
}

#[test]
fn failed_refresh_keeps_previous_snapshot() {
    let mut session = loaded_session();
    let ticket = session.begin_refresh();
    let err = session
        .complete_refresh(ticket, Err(FetchError::Transport("offline".to_string())))
        .unwrap_err();
    assert!(matches!(err, SessionError::Fetch(_)));
    assert_eq!(
        session.snapshot().unwrap().find_resource("r1").unwrap().name,
        "Room 1"
    );

    let mut broken = payload("Broken");
    broken.mapping.shift_remove("thn__Event_Start_Date_API_Field__c");
    let ticket = session.begin_refresh();
    let err = session.complete_refresh(ticket, Ok(broken)).unwrap_err();
    assert!(matches!(err, SessionError::Reshape(_)));
    assert_eq!(
        session.snapshot().unwrap().find_resource("r1").unwrap().name,
        "Room 1"
    );
}

#[test]
fn edit_on_unbookable_resource_is_rejected() {
    let mut session = loaded_session();
    let err = session
        .begin_event_edit(EventChange {
            event_id: None,
            resource_id: "r2".to_string(),
            start_date: at("2024-03-12T10:00:00Z"),
            end_date: at("2024-03-12T12:00:00Z"),
        })
        .unwrap_err();
    assert_eq!(err, EditError::NotBookable("r2".to_string()));
    assert_eq!(err.to_string(), "This resource isn't bookable");
    assert!(session.pending_saves().is_empty());
}

#[test]
fn save_request_reverts_display_shift() {
    let mut session = loaded_session();
    // source +3h, viewer +1h: displayed = stored + 2h
    let request = session
        .begin_event_edit(EventChange {
            event_id: Some("ev1".to_string()),
            resource_id: "r1".to_string(),
            start_date: at("2024-03-12T12:00:00Z"),
            end_date: at("2024-03-13T09:30:00Z"),
        })
        .unwrap();

    assert_eq!(request.record["Arrival__c"], json!("2024-03-12 10:00:00"));
    assert_eq!(request.record["Departure__c"], json!("2024-03-13 07:30:00"));
    assert_eq!(request.record["Room__c"], json!("r1"));
    assert_eq!(request.record["Id"], json!("ev1"));
    assert_eq!(session.pending_saves().len(), 1);

    assert!(session.confirm_save(request.request_id));
    assert!(!session.confirm_save(request.request_id));
}

#[test]
fn rejected_save_clears_pending_and_requests_refresh() {
    let mut session = loaded_session();
    let change = EventChange {
        event_id: None,
        resource_id: "r1".to_string(),
        start_date: at("2024-03-12T12:00:00Z"),
        end_date: at("2024-03-12T13:00:00Z"),
    };
    let request = session.begin_event_edit(change.clone()).unwrap();
    session.begin_event_edit(change).unwrap();
    let generation = session.generation();

    let error = FetchError::Business(
        "Upsert failed. First exception on row 0; first error: \
         FIELD_CUSTOM_VALIDATION_EXCEPTION, Guest already checked out: []"
            .to_string(),
    );
    let (message, ticket) = session.reject_save(request.request_id, &error);

    assert_eq!(message, "Guest already checked out");
    assert!(session.pending_saves().is_empty());
    assert_eq!(ticket.generation, generation + 1);
    assert_eq!(ticket.window, session.window());
}

#[test]
fn collapsed_nodes_survive_reopen() {
    let store = MemoryPreferenceStore::new();
    let preferences = PreferenceService::new(store, "board");
    let mut session = SchedulerSession::open(preferences, viewer(), date(2024, 3, 14)).unwrap();
    let ticket = session.begin_refresh();
    session.complete_refresh(ticket, Ok(payload("Room 1"))).unwrap();

    session.collapse_node("r1").unwrap();
    assert!(!session.snapshot().unwrap().find_resource("r1").unwrap().expanded);

    let ticket = session.begin_refresh();
    session.complete_refresh(ticket, Ok(payload("Room 1"))).unwrap();
    assert!(!session.snapshot().unwrap().find_resource("r1").unwrap().expanded);

    session.expand_node("r1").unwrap();
    assert!(session.view_preferences().collapsed_resource_ids.is_empty());
}

#[test]
fn view_mode_and_anchor_are_restored() {
    let preferences = PreferenceService::new(MemoryPreferenceStore::new(), "board");
    let mut session = SchedulerSession::open(preferences, viewer(), date(2024, 3, 14)).unwrap();
    session.set_view_mode(ViewModeKind::Month).unwrap();
    session.next().unwrap();
    let state = session.view_preferences().clone();

    assert_eq!(state.last_view_mode, Some(ViewModeKind::Month));
    assert_eq!(state.last_anchor_date, Some(date(2024, 4, 14)));
    assert_eq!(session.mode(), ViewMode::Month);
}

#[test]
fn custom_range_does_not_move_on_navigation() {
    let mut session = open_session();
    let start = date(2024, 3, 4).and_hms_opt(0, 0, 0).unwrap();
    let end = date(2024, 3, 20).and_hms_opt(0, 0, 0).unwrap();
    let custom = session.set_custom_range(start, end).unwrap();
    let moved = session.next().unwrap();

    assert_eq!(custom.window, moved.window);
    assert_eq!(moved.window.start, start);
    assert_eq!(session.view_preferences().custom_window, Some(custom.window));
}
