//! Argument shaping for teacher capabilities.

use serde_json::{Map, Value};
use slate_core::error::{Result, SlateError};

use crate::capability::{ClockInArgs, RescheduleArgs};

pub const ACTION_CLOCK_IN: &str = "clock_in";
pub const ACTION_RESCHEDULE: &str = "reschedule_shift";
pub const ACTION_RESCHEDULE_FUTURE: &str = "reschedule_shift_future";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Single,
    Future,
}

impl Scope {
    pub fn parse(scope: &str) -> Option<Self> {
        match scope.trim().to_lowercase().as_str() {
            "today" | "today_only" | "one_time" | "single" => Some(Self::Single),
            "future" | "all_future" | "series" | "recurring" => Some(Self::Future),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Future => "future",
        }
    }
}

fn insert_trimmed(args: &mut Map<String, Value>, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        args.insert(key.to_string(), Value::String(value.to_string()));
    }
}

pub fn clock_in_request(args: &ClockInArgs) -> (&'static str, Map<String, Value>) {
    let mut out = Map::new();
    insert_trimmed(&mut out, "shiftId", &args.shift_id);
    (ACTION_CLOCK_IN, out)
}

/// Validate a reschedule call and build its action name and arguments.
/// `fallback_timezone` is used when the call names none.
pub fn reschedule_request(
    args: &RescheduleArgs,
    fallback_timezone: &str,
) -> Result<(&'static str, Map<String, Value>)> {
    let scope = Scope::parse(&args.scope).ok_or_else(|| {
        SlateError::Validation(
            "Before I reschedule, tell me if this is for today only or all future classes.".into(),
        )
    })?;
    if !args.confirmed {
        return Err(SlateError::Validation(
            "Please explicitly confirm before I make this schedule change.".into(),
        ));
    }

    let timezone = match args.timezone.trim() {
        "" => fallback_timezone,
        tz => tz,
    };

    let mut out = Map::new();
    out.insert("scope".into(), scope.as_str().into());
    out.insert("confirmed".into(), true.into());
    out.insert("newStartLocal".into(), args.new_start_local_iso.trim().into());
    out.insert("newEndLocal".into(), args.new_end_local_iso.trim().into());
    out.insert("timezone".into(), timezone.into());
    insert_trimmed(&mut out, "shiftId", &args.shift_id);
    insert_trimmed(&mut out, "studentName", &args.student_name);
    insert_trimmed(&mut out, "studentId", &args.student_id);
    insert_trimmed(&mut out, "applyFromDate", &args.apply_from_local_iso);
    insert_trimmed(&mut out, "reason", &args.reason);

    let action = match scope {
        Scope::Future => ACTION_RESCHEDULE_FUTURE,
        Scope::Single => ACTION_RESCHEDULE,
    };
    Ok((action, out))
}
