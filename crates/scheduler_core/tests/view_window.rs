use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Weekday};
use scheduler_core::view::week_start;
use scheduler_core::{compute_window, navigate, NavigationStep, ViewMode};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn offset_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap()
}

#[test]
fn sunday_anchor_belongs_to_week_started_previous_monday() {
    let sunday = date(2024, 3, 17);
    assert_eq!(sunday.weekday(), Weekday::Sun);

    let window = compute_window(sunday, ViewMode::Week, offset_hours(0));
    assert_eq!(window.start, date(2024, 3, 11).and_hms_opt(0, 0, 0).unwrap());
    assert_eq!(window.duration(), Duration::days(7));
    assert!(window.contains(sunday.and_hms_opt(23, 59, 59).unwrap()));
}

#[test]
fn monday_anchor_starts_its_own_week() {
    assert_eq!(week_start(date(2024, 3, 11)), date(2024, 3, 11));
}

#[test]
fn week_window_is_independent_of_viewer_offset() {
    let anchor = date(2024, 3, 14);
    assert_eq!(
        compute_window(anchor, ViewMode::Week, offset_hours(9)),
        compute_window(anchor, ViewMode::Week, offset_hours(-7))
    );
}

#[test]
fn month_start_hour_matches_absolute_offset_on_both_sides() {
    let anchor = date(2024, 5, 20);
    let east = compute_window(anchor, ViewMode::Month, offset_hours(3));
    let west = compute_window(anchor, ViewMode::Month, offset_hours(-3));
    assert_eq!(east.start, date(2024, 5, 1).and_hms_opt(3, 0, 0).unwrap());
    assert_eq!(east.start, west.start);
    assert_eq!(east.end, date(2024, 6, 1).and_hms_opt(0, 0, 0).unwrap());
}

#[test]
fn month_navigation_clamps_to_month_end() {
    let anchor = date(2024, 3, 31);
    assert_eq!(
        navigate(anchor, ViewMode::Month, NavigationStep::Previous),
        date(2024, 2, 29)
    );
}

#[test]
fn week_navigation_round_trips() {
    let anchor = date(2024, 12, 30);
    let forward = navigate(anchor, ViewMode::Week, NavigationStep::Next);
    assert_eq!(forward, date(2025, 1, 6));
    assert_eq!(navigate(forward, ViewMode::Week, NavigationStep::Previous), anchor);
}
