//! View window calculation and navigation.
//!
//! # Responsibility
//! - Derive the visible date range from an anchor date and a view mode.
//! - Move the anchor for next / previous navigation.
//!
//! # Invariants
//! - Pure functions: no hidden state, recomputed on every navigation.
//! - Window bounds are viewer-local wall-clock times.
//! - Week windows start on Monday; a Sunday anchor belongs to the week that
//!   started six days earlier.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Persistable view mode discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewModeKind {
    Day,
    Week,
    Month,
    Custom,
}

impl Display for ViewModeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Custom => "custom",
        };
        f.write_str(label)
    }
}

impl FromStr for ViewModeKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unsupported view mode `{other}`; expected day|week|month|custom"
            )),
        }
    }
}

/// View mode, carrying explicit bounds for custom windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Day,
    Week,
    Month,
    Custom {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl ViewMode {
    pub fn kind(&self) -> ViewModeKind {
        match self {
            Self::Day => ViewModeKind::Day,
            Self::Week => ViewModeKind::Week,
            Self::Month => ViewModeKind::Month,
            Self::Custom { .. } => ViewModeKind::Custom,
        }
    }
}

/// Visible range `[start, end)` in viewer-local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ViewWindow {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end
    }

    /// Converts the bounds to UTC instants for the backend query.
    pub fn to_utc(&self, viewer_offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_to_utc(self.start, viewer_offset),
            local_to_utc(self.end, viewer_offset),
        )
    }
}

/// Navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStep {
    Next,
    Previous,
}

/// Computes the visible window for an anchor date.
///
/// Month windows start at the hour equal to the absolute viewer UTC offset so
/// the start survives date-only truncation on either side of UTC.
pub fn compute_window(
    anchor: NaiveDate,
    mode: ViewMode,
    viewer_offset: FixedOffset,
) -> ViewWindow {
    match mode {
        ViewMode::Day => {
            let start = anchor.and_time(NaiveTime::MIN);
            ViewWindow {
                start,
                end: saturating_add_days(start, 1),
            }
        }
        ViewMode::Week => {
            let start = week_start(anchor).and_time(NaiveTime::MIN);
            ViewWindow {
                start,
                end: saturating_add_days(start, 7),
            }
        }
        ViewMode::Month => {
            let first = month_start(anchor);
            let shift_hours = viewer_offset.local_minus_utc().unsigned_abs() / 3600;
            let start_time = NaiveTime::from_hms_opt(shift_hours, 0, 0).unwrap_or(NaiveTime::MIN);
            let next_first = first
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX);
            ViewWindow {
                start: first.and_time(start_time),
                end: next_first.and_time(NaiveTime::MIN),
            }
        }
        ViewMode::Custom { start, end } => ViewWindow { start, end },
    }
}

/// Moves the anchor one window forward or backward.
///
/// Custom windows have no natural step and keep their anchor.
pub fn navigate(anchor: NaiveDate, mode: ViewMode, step: NavigationStep) -> NaiveDate {
    let moved = match (mode, step) {
        (ViewMode::Day, NavigationStep::Next) => anchor.checked_add_signed(Duration::days(1)),
        (ViewMode::Day, NavigationStep::Previous) => anchor.checked_sub_signed(Duration::days(1)),
        (ViewMode::Week, NavigationStep::Next) => anchor.checked_add_signed(Duration::days(7)),
        (ViewMode::Week, NavigationStep::Previous) => {
            anchor.checked_sub_signed(Duration::days(7))
        }
        (ViewMode::Month, NavigationStep::Next) => anchor.checked_add_months(Months::new(1)),
        (ViewMode::Month, NavigationStep::Previous) => anchor.checked_sub_months(Months::new(1)),
        (ViewMode::Custom { .. }, _) => None,
    };
    moved.unwrap_or(anchor)
}

/// Monday of the anchor's ISO week, clamped to the earliest supported date.
pub fn week_start(anchor: NaiveDate) -> NaiveDate {
    let days = Duration::days(i64::from(anchor.weekday().num_days_from_monday()));
    anchor.checked_sub_signed(days).unwrap_or(NaiveDate::MIN)
}

fn month_start(anchor: NaiveDate) -> NaiveDate {
    anchor.with_day0(0).unwrap_or(anchor)
}

/// Window ends clamp to the latest supported instant.
fn saturating_add_days(start: NaiveDateTime, days: i64) -> NaiveDateTime {
    start
        .checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDateTime::MAX)
}

fn local_to_utc(local: NaiveDateTime, viewer_offset: FixedOffset) -> DateTime<Utc> {
    viewer_offset
        .from_local_datetime(&local)
        .single()
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| local.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("valid offset")
    }

    #[test]
    fn day_window_spans_one_day_from_midnight() {
        let window = compute_window(date(2024, 3, 14), ViewMode::Day, utc());
        assert_eq!(window.start, date(2024, 3, 14).and_time(NaiveTime::MIN));
        assert_eq!(window.duration(), Duration::days(1));
    }

    #[test]
    fn week_window_starts_monday_for_midweek_anchor() {
        let window = compute_window(date(2024, 3, 14), ViewMode::Week, utc());
        assert_eq!(window.start.date(), date(2024, 3, 11));
        assert_eq!(window.start.date().weekday(), Weekday::Mon);
        assert_eq!(window.duration(), Duration::days(7));
    }

    #[test]
    fn month_window_shifts_start_by_absolute_offset_hours() {
        let west = FixedOffset::west_opt(5 * 3600).expect("valid offset");
        let window = compute_window(date(2024, 2, 17), ViewMode::Month, west);
        assert_eq!(
            window.start,
            date(2024, 2, 1).and_hms_opt(5, 0, 0).expect("valid time")
        );
        assert_eq!(window.end, date(2024, 3, 1).and_time(NaiveTime::MIN));
    }

    #[test]
    fn month_window_rolls_over_year_end() {
        let window = compute_window(date(2023, 12, 31), ViewMode::Month, utc());
        assert_eq!(window.start.date(), date(2023, 12, 1));
        assert_eq!(window.end.date(), date(2024, 1, 1));
    }

    #[test]
    fn custom_window_passes_through() {
        let start = date(2024, 1, 3).and_hms_opt(8, 30, 0).expect("valid time");
        let end = date(2024, 1, 9).and_hms_opt(17, 0, 0).expect("valid time");
        let window = compute_window(date(2020, 1, 1), ViewMode::Custom { start, end }, utc());
        assert_eq!(window, ViewWindow { start, end });
    }

    #[test]
    fn windows_clamp_at_calendar_limits() {
        let last = compute_window(NaiveDate::MAX, ViewMode::Day, utc());
        assert_eq!(last.start, NaiveDate::MAX.and_time(NaiveTime::MIN));
        assert_eq!(last.end, NaiveDateTime::MAX);

        let last_week = compute_window(NaiveDate::MAX, ViewMode::Week, utc());
        assert!(last_week.start <= last_week.end);
        assert_eq!(last_week.end, NaiveDateTime::MAX);

        let last_month = compute_window(NaiveDate::MAX, ViewMode::Month, utc());
        assert!(last_month.start <= last_month.end);

        let first = compute_window(NaiveDate::MIN, ViewMode::Week, utc());
        assert_eq!(first.start.date(), week_start(NaiveDate::MIN));
        assert_eq!(
            navigate(NaiveDate::MAX, ViewMode::Day, NavigationStep::Next),
            NaiveDate::MAX
        );
    }

    #[test]
    fn navigation_steps_by_mode() {
        let anchor = date(2024, 1, 31);
        assert_eq!(
            navigate(anchor, ViewMode::Day, NavigationStep::Next),
            date(2024, 2, 1)
        );
        assert_eq!(
            navigate(anchor, ViewMode::Week, NavigationStep::Previous),
            date(2024, 1, 24)
        );
        assert_eq!(
            navigate(anchor, ViewMode::Month, NavigationStep::Next),
            date(2024, 2, 29)
        );
        let custom = ViewMode::Custom {
            start: anchor.and_time(NaiveTime::MIN),
            end: anchor.and_time(NaiveTime::MIN),
        };
        assert_eq!(navigate(anchor, custom, NavigationStep::Next), anchor);
    }

    #[test]
    fn to_utc_applies_viewer_offset() {
        let east = FixedOffset::east_opt(2 * 3600).expect("valid offset");
        let window = compute_window(date(2024, 6, 1), ViewMode::Day, east);
        let (start, _) = window.to_utc(east);
        assert_eq!(start.to_rfc3339(), "2024-05-31T22:00:00+00:00");
    }

    #[test]
    fn view_mode_kind_parses_case_insensitively() {
        assert_eq!("Week".parse::<ViewModeKind>(), Ok(ViewModeKind::Week));
        assert!("year".parse::<ViewModeKind>().is_err());
    }
}
