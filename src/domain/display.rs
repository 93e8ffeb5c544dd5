use crate::domain::models::{CycleItem, CycleItemType, TimerSnapshot};
use crate::domain::timer::remaining_seconds;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_ITEM_DURATION_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySlot {
    pub id: String,
    pub item_type: CycleItemType,
    pub label: String,
    pub duration_ms: u64,
}

pub fn rotation(
    items: &[CycleItem],
    timer: Option<&TimerSnapshot>,
    default_duration_ms: u64,
) -> Vec<DisplaySlot> {
    let show_pomodoro = timer.is_none_or(|snapshot| snapshot.settings.show_in_cycle);
    items
        .iter()
        .filter(|item| item.enabled)
        .filter(|item| show_pomodoro || item.item_type() != CycleItemType::Pomodoro)
        .map(|item| DisplaySlot {
            id: item.id.clone(),
            item_type: item.item_type(),
            label: item.label.clone(),
            duration_ms: if item.duration == 0 {
                default_duration_ms
            } else {
                item.duration
            },
        })
        .collect()
}

pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerFace {
    pub mode: &'static str,
    pub clock: String,
    pub paused: bool,
    pub active: bool,
}

pub fn timer_face(snapshot: &TimerSnapshot, now: DateTime<Utc>) -> TimerFace {
    TimerFace {
        mode: snapshot.session.mode.as_str(),
        clock: format_remaining(remaining_seconds(&snapshot.session, now)),
        paused: snapshot.session.is_paused,
        active: snapshot.session.active,
    }
}
