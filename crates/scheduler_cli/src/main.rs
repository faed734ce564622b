//! Reshape a backend payload file and print the display model.
//!
//! Usage: `scheduler_cli <payload.json> [--mode day|week|month] [--date YYYY-MM-DD]
//! [--offset-minutes N]`

use chrono::{FixedOffset, NaiveDate, Utc};
use scheduler_core::{
    compute_window, reshape, ReshapeContext, SchedulerPayload, TimeAxisProjection, ViewMode,
    ViewModeKind, ViewPreferences,
};
use std::process::ExitCode;

struct Args {
    payload_path: String,
    mode: ViewModeKind,
    anchor: NaiveDate,
    offset_minutes: i32,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut payload_path = None;
    let mut mode = ViewModeKind::Week;
    let mut anchor = Utc::now().date_naive();
    let mut offset_minutes = 0;

    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| raw.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--mode" => mode = value("--mode")?.parse()?,
            "--date" => {
                let text = value("--date")?;
                anchor = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map_err(|err| format!("invalid --date `{text}`: {err}"))?;
            }
            "--offset-minutes" => {
                let text = value("--offset-minutes")?;
                offset_minutes = text
                    .parse()
                    .map_err(|err| format!("invalid --offset-minutes `{text}`: {err}"))?;
            }
            other if payload_path.is_none() => payload_path = Some(other.to_string()),
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    Ok(Args {
        payload_path: payload_path.ok_or("missing payload path")?,
        mode,
        anchor,
        offset_minutes,
    })
}

fn run(args: Args) -> Result<String, String> {
    let mode = match args.mode {
        ViewModeKind::Day => ViewMode::Day,
        ViewModeKind::Week => ViewMode::Week,
        ViewModeKind::Month => ViewMode::Month,
        ViewModeKind::Custom => return Err("custom mode is not available here".to_string()),
    };
    let viewer_offset = FixedOffset::east_opt(args.offset_minutes.saturating_mul(60))
        .ok_or_else(|| format!("invalid offset {} minutes", args.offset_minutes))?;

    let raw = std::fs::read_to_string(&args.payload_path)
        .map_err(|err| format!("cannot read `{}`: {err}", args.payload_path))?;
    let payload: SchedulerPayload =
        serde_json::from_str(&raw).map_err(|err| format!("invalid payload: {err}"))?;

    let window = compute_window(args.anchor, mode, viewer_offset);
    let projection = TimeAxisProjection::for_window(&window, viewer_offset, 1.0);
    let preferences = ViewPreferences::default();
    let model = reshape(
        &payload,
        &ReshapeContext {
            viewer_offset,
            window,
            projection: &projection,
            preferences: &preferences,
        },
    )
    .map_err(|err| err.to_string())?;
    serde_json::to_string_pretty(&model).map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    match parse_args(std::env::args().skip(1)).and_then(run) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("scheduler_cli: {message}");
            ExitCode::FAILURE
        }
    }
}
