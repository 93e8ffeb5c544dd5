use crate::domain::cycle_list::{self, CycleListError};
use crate::domain::models::{CycleItem, CycleItemEdit, NewCycleItem, TimerSettings};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

pub const LIST_GRACE_MS: u64 = 5000;
pub const TIMER_SETTINGS_GRACE_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionReason {
    PushInFlight,
    GraceWindow,
    Interaction,
}

impl SuppressionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PushInFlight => "push_in_flight",
            Self::GraceWindow => "grace_window",
            Self::Interaction => "interaction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    Suppressed(SuppressionReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PushTicket {
    revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct InteractionState {
    focused_fields: HashSet<String>,
    pointer_down: bool,
}

impl InteractionState {
    fn is_active(&self) -> bool {
        self.pointer_down || !self.focused_fields.is_empty()
    }
}

/// Local mirror of one piece of server state plus the bookkeeping that decides whether an
/// authoritative read may overwrite it.
#[derive(Debug, Clone)]
pub struct EditQueue<T> {
    mirror: T,
    revision: u64,
    in_flight: u32,
    last_push_completed_at: Option<DateTime<Utc>>,
    grace: Duration,
    tracks_interaction: bool,
    interaction: InteractionState,
}

pub type CycleListEditor = EditQueue<Vec<CycleItem>>;
pub type TimerSettingsEditor = EditQueue<TimerSettings>;

impl<T: Clone> EditQueue<T> {
    pub fn new(initial: T, grace_ms: u64) -> Self {
        Self {
            mirror: initial,
            revision: 0,
            in_flight: 0,
            last_push_completed_at: None,
            grace: Duration::milliseconds(i64::try_from(grace_ms).unwrap_or(i64::MAX / 2)),
            tracks_interaction: false,
            interaction: InteractionState::default(),
        }
    }

    pub fn with_interaction_tracking(mut self) -> Self {
        self.tracks_interaction = true;
        self
    }

    pub fn mirror(&self) -> &T {
        &self.mirror
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn last_push_completed_at(&self) -> Option<DateTime<Utc>> {
        self.last_push_completed_at
    }

    pub fn apply_local(&mut self, next: T) -> PushTicket {
        self.mirror = next;
        self.revision += 1;
        self.in_flight += 1;
        PushTicket {
            revision: self.revision,
        }
    }

    pub fn is_latest(&self, ticket: PushTicket) -> bool {
        ticket.revision == self.revision
    }

    pub fn release(&mut self, _ticket: PushTicket) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn finish_push(&mut self, _ticket: PushTicket, result: PushResult, now: DateTime<Utc>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if result == PushResult::Succeeded {
            self.last_push_completed_at = Some(now);
        }
    }

    pub fn suppression(&self, now: DateTime<Utc>) -> Option<SuppressionReason> {
        if self.in_flight > 0 {
            return Some(SuppressionReason::PushInFlight);
        }
        if let Some(completed_at) = self.last_push_completed_at {
            let within_grace = match completed_at.checked_add_signed(self.grace) {
                Some(grace_ends_at) => now < grace_ends_at,
                None => true,
            };
            if within_grace {
                return Some(SuppressionReason::GraceWindow);
            }
        }
        if self.tracks_interaction && self.interaction.is_active() {
            return Some(SuppressionReason::Interaction);
        }
        None
    }

    pub fn apply_poll(&mut self, incoming: T, now: DateTime<Utc>) -> PollOutcome {
        if let Some(reason) = self.suppression(now) {
            return PollOutcome::Suppressed(reason);
        }
        self.mirror = incoming;
        PollOutcome::Applied
    }

    pub fn focus(&mut self, field: &str) {
        self.interaction.focused_fields.insert(field.to_string());
    }

    pub fn blur(&mut self, field: &str) {
        self.interaction.focused_fields.remove(field);
    }

    pub fn pointer_down(&mut self) {
        self.interaction.pointer_down = true;
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_down = false;
    }
}

impl EditQueue<Vec<CycleItem>> {
    pub fn for_cycle_list(grace_ms: u64) -> Self {
        Self::new(Vec::new(), grace_ms)
    }

    pub fn add(&mut self, new_item: NewCycleItem) -> Result<PushTicket, CycleListError> {
        let next = cycle_list::add(&self.mirror, new_item)?;
        Ok(self.apply_local(next))
    }

    pub fn toggle(&mut self, id: &str) -> Result<PushTicket, CycleListError> {
        let next = cycle_list::toggle(&self.mirror, id)?;
        Ok(self.apply_local(next))
    }

    pub fn delete(&mut self, id: &str) -> Result<PushTicket, CycleListError> {
        let next = cycle_list::delete(&self.mirror, id)?;
        Ok(self.apply_local(next))
    }

    pub fn reorder(&mut self, order: &[String]) -> PushTicket {
        let next = cycle_list::reorder(&self.mirror, order);
        self.apply_local(next)
    }

    pub fn edit(&mut self, id: &str, changes: &CycleItemEdit) -> Result<PushTicket, CycleListError> {
        let next = cycle_list::edit(&self.mirror, id, changes)?;
        Ok(self.apply_local(next))
    }
}

impl EditQueue<TimerSettings> {
    pub fn for_timer_settings(grace_ms: u64) -> Self {
        Self::new(TimerSettings::default(), grace_ms).with_interaction_tracking()
    }

    pub fn set(&mut self, settings: TimerSettings) -> Result<PushTicket, String> {
        settings.validate()?;
        Ok(self.apply_local(settings))
    }
}
