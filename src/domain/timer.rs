use crate::domain::models::{
    TimerAction, TimerMode, TimerSession, TimerSettings, TimerSnapshot,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("invalid timer transition: {0}")]
    InvalidTransition(String),
    #[error("{0}")]
    Validation(String),
}

fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let seconds = (now - started_at).num_seconds().max(0);
    u32::try_from(seconds).unwrap_or(u32::MAX)
}

pub fn remaining_seconds(session: &TimerSession, now: DateTime<Utc>) -> u32 {
    if !session.active {
        return session.time_remaining;
    }
    if session.is_paused {
        return session.paused_remaining;
    }
    match session.started_at {
        Some(started_at) => session
            .time_remaining
            .saturating_sub(elapsed_seconds(started_at, now)),
        None => session.time_remaining,
    }
}

fn next_phase(session: &TimerSession, settings: &TimerSettings, now: DateTime<Utc>) -> TimerSession {
    let mut cycles_completed = session.cycles_completed;
    let mode = match session.mode {
        TimerMode::Work => {
            cycles_completed = cycles_completed.saturating_add(1);
            if cycles_completed % settings.cycles_until_long_break.max(1) == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::Break
            }
        }
        TimerMode::Break | TimerMode::LongBreak => TimerMode::Work,
    };

    TimerSession {
        mode,
        active: true,
        is_paused: false,
        time_remaining: settings.duration_for(mode),
        started_at: Some(now),
        paused_remaining: 0,
        cycles_completed,
    }
}

/// Completes the running phase if its time is up. At most one phase transition is applied
/// per call; the new phase starts at `now`.
pub fn resolve(session: &TimerSession, settings: &TimerSettings, now: DateTime<Utc>) -> TimerSession {
    if !session.is_running() {
        return session.clone();
    }
    let Some(started_at) = session.started_at else {
        return session.clone();
    };
    if elapsed_seconds(started_at, now) >= session.time_remaining {
        next_phase(session, settings, now)
    } else {
        session.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStateMachine {
    session: TimerSession,
    settings: TimerSettings,
    reset_clears_cycles: bool,
}

impl TimerStateMachine {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            session: TimerSession::idle(&settings),
            settings,
            reset_clears_cycles: false,
        }
    }

    pub fn from_parts(session: TimerSession, settings: TimerSettings) -> Self {
        Self {
            session,
            settings,
            reset_clears_cycles: false,
        }
    }

    pub fn with_reset_clears_cycles(mut self, reset_clears_cycles: bool) -> Self {
        self.reset_clears_cycles = reset_clears_cycles;
        self
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn advance(&mut self, now: DateTime<Utc>) -> bool {
        let resolved = resolve(&self.session, &self.settings, now);
        let changed = resolved != self.session;
        self.session = resolved;
        changed
    }

    pub fn reported(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let mut session = self.session.clone();
        session.time_remaining = remaining_seconds(&self.session, now);
        TimerSnapshot {
            session,
            settings: self.settings.clone(),
        }
    }

    pub fn apply(&mut self, action: TimerAction, now: DateTime<Utc>) -> Result<(), TimerError> {
        match action {
            TimerAction::Start => self.start(now),
            TimerAction::Pause => self.pause(now),
            TimerAction::Resume => self.resume(now),
            TimerAction::Skip => self.skip(now),
            TimerAction::Reset => {
                self.reset();
                Ok(())
            }
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.advance(now);
        if self.session.active {
            return Err(TimerError::InvalidTransition(
                "start requires an idle timer".to_string(),
            ));
        }
        self.session = TimerSession {
            mode: TimerMode::Work,
            active: true,
            is_paused: false,
            time_remaining: self.settings.work_duration,
            started_at: Some(now),
            paused_remaining: 0,
            cycles_completed: self.session.cycles_completed,
        };
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.advance(now);
        if !self.session.is_running() {
            return Err(TimerError::InvalidTransition(
                "pause requires a running timer".to_string(),
            ));
        }
        let remaining = remaining_seconds(&self.session, now);
        self.session.is_paused = true;
        self.session.paused_remaining = remaining;
        self.session.time_remaining = remaining;
        self.session.started_at = None;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        if !(self.session.active && self.session.is_paused) {
            return Err(TimerError::InvalidTransition(
                "resume requires a paused timer".to_string(),
            ));
        }
        self.session.is_paused = false;
        self.session.time_remaining = self.session.paused_remaining;
        self.session.paused_remaining = 0;
        self.session.started_at = Some(now);
        Ok(())
    }

    /// Skipping a paused phase starts the next one running.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        if self.advance(now) {
            return Ok(());
        }
        if !self.session.active {
            return Err(TimerError::InvalidTransition(
                "skip requires an active timer".to_string(),
            ));
        }
        self.session = next_phase(&self.session, &self.settings, now);
        Ok(())
    }

    pub fn reset(&mut self) {
        let cycles_completed = if self.reset_clears_cycles {
            0
        } else {
            self.session.cycles_completed
        };
        self.session = TimerSession {
            cycles_completed,
            ..TimerSession::idle(&self.settings)
        };
    }

    /// The running phase keeps its length; idle picks up the new work duration.
    pub fn apply_settings(&mut self, settings: TimerSettings, now: DateTime<Utc>) -> Result<(), TimerError> {
        settings.validate().map_err(TimerError::Validation)?;
        self.advance(now);
        self.settings = settings;
        if !self.session.active {
            self.session.time_remaining = self.settings.work_duration;
        }
        Ok(())
    }
}
