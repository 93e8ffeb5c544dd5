use crate::application::bootstrap::bootstrap_workspace;
use crate::domain::cycle_list::{self, CycleListError};
use crate::domain::models::{
    CycleItem, DashboardSettings, NewCycleItem, SettingsPatch, TimerAction, TimerSettings,
    TimerSettingsUpdate, TimerSnapshot,
};
use crate::domain::timer::TimerStateMachine;
use crate::infrastructure::config::{load_app_config, TimerPolicy};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_repository::{SettingsRepository, SqliteSettingsRepository};
use crate::infrastructure::timer_repository::{SqliteTimerRepository, TimerRepository};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState {
    settings_repository: Arc<dyn SettingsRepository>,
    timer_repository: Arc<dyn TimerRepository>,
    settings: Mutex<DashboardSettings>,
    timer: Mutex<TimerStateMachine>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let app_config = load_app_config(&bootstrap.config_dir)?;

        Self::with_repositories(
            Arc::new(SqliteSettingsRepository::new(&bootstrap.database_path)),
            Arc::new(SqliteTimerRepository::new(&bootstrap.database_path)),
            &app_config.timer,
        )
    }

    pub fn with_repositories(
        settings_repository: Arc<dyn SettingsRepository>,
        timer_repository: Arc<dyn TimerRepository>,
        policy: &TimerPolicy,
    ) -> Result<Self, InfraError> {
        let settings = match settings_repository.load()? {
            Some(mut stored) => {
                stored.cycle_items = cycle_list::normalize(stored.cycle_items)?;
                stored
            }
            None => DashboardSettings {
                cycle_items: cycle_list::default_items(),
                other: serde_json::Map::new(),
            },
        };

        let timer = match timer_repository.load()? {
            Some(stored) => {
                stored
                    .settings
                    .validate()
                    .and_then(|_| stored.session.validate())
                    .map_err(|message| {
                        InfraError::InvalidConfig(format!("stored timer state rejected: {message}"))
                    })?;
                TimerStateMachine::from_parts(stored.session, stored.settings)
            }
            None => TimerStateMachine::new(TimerSettings::default()),
        }
        .with_reset_clears_cycles(policy.reset_clears_cycles);

        Ok(Self {
            settings_repository,
            timer_repository,
            settings: Mutex::new(settings),
            timer: Mutex::new(timer),
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }
}

pub fn get_settings_impl(state: &AppState) -> Result<DashboardSettings, InfraError> {
    let settings = lock_settings(state)?;
    Ok(settings.clone())
}

/// Key-by-key merge: `cycleItems` replaces the whole list, every other present key
/// overwrites its stored value.
pub fn update_settings_impl(
    state: &AppState,
    patch: SettingsPatch,
) -> Result<DashboardSettings, InfraError> {
    let mut settings = lock_settings(state)?;
    let mut next = settings.clone();

    if let Some(items) = patch.cycle_items {
        next.cycle_items = cycle_list::normalize(items)?;
    }
    let merged_keys: Vec<String> = patch.other.keys().cloned().collect();
    for (key, value) in patch.other {
        next.other.insert(key, value);
    }

    state.settings_repository.save(&next)?;
    *settings = next;

    info!(
        command = "update_settings",
        items = settings.cycle_items.len(),
        merged_keys = ?merged_keys,
        "settings updated"
    );
    Ok(settings.clone())
}

pub fn add_cycle_item_impl(
    state: &AppState,
    new_item: NewCycleItem,
) -> Result<DashboardSettings, InfraError> {
    let item_type = new_item.content.item_type();
    mutate_cycle_items(state, "add_cycle_item", |items| {
        cycle_list::add(items, new_item)
    })
    .inspect(|settings| {
        if let Some(item) = settings.cycle_items.last() {
            info!(command = "add_cycle_item", item_id = %item.id, item_type = item_type.as_str(), "cycle item added");
        }
    })
}

pub fn toggle_cycle_item_impl(state: &AppState, item_id: &str) -> Result<DashboardSettings, InfraError> {
    let item_id = required_id(item_id)?;
    mutate_cycle_items(state, "toggle_cycle_item", |items| {
        cycle_list::toggle(items, item_id)
    })
}

pub fn delete_cycle_item_impl(state: &AppState, item_id: &str) -> Result<DashboardSettings, InfraError> {
    let item_id = required_id(item_id)?;
    mutate_cycle_items(state, "delete_cycle_item", |items| {
        cycle_list::delete(items, item_id)
    })
}

pub fn reorder_cycle_items_impl(
    state: &AppState,
    order: Vec<String>,
) -> Result<DashboardSettings, InfraError> {
    mutate_cycle_items(state, "reorder_cycle_items", |items| {
        Ok(cycle_list::reorder(items, &order))
    })
}

pub fn get_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let now = state.now();
    let mut timer = lock_timer(state)?;
    if timer.advance(now) {
        state
            .timer_repository
            .save(timer.session(), timer.settings())?;
        info!(
            command = "get_timer",
            mode = timer.session().mode.as_str(),
            cycles_completed = timer.session().cycles_completed,
            "timer phase completed"
        );
    }
    Ok(timer.reported(now))
}

pub fn timer_action_impl(state: &AppState, action: TimerAction) -> Result<TimerSnapshot, InfraError> {
    let now = state.now();
    let mut timer = lock_timer(state)?;
    let mut next = timer.clone();
    next.apply(action, now)?;

    state
        .timer_repository
        .save(next.session(), next.settings())?;
    *timer = next;

    info!(
        command = "timer_action",
        action = action.as_str(),
        mode = timer.session().mode.as_str(),
        active = timer.session().active,
        paused = timer.session().is_paused,
        "timer action applied"
    );
    Ok(timer.reported(now))
}

pub fn update_timer_settings_impl(
    state: &AppState,
    update: TimerSettingsUpdate,
) -> Result<TimerSnapshot, InfraError> {
    let now = state.now();
    let mut timer = lock_timer(state)?;
    let mut next = timer.clone();
    next.apply_settings(TimerSettings::from(update), now)?;

    state
        .timer_repository
        .save(next.session(), next.settings())?;
    *timer = next;

    info!(
        command = "update_timer_settings",
        work_duration = timer.settings().work_duration,
        break_duration = timer.settings().break_duration,
        long_break_duration = timer.settings().long_break_duration,
        cycles_until_long_break = timer.settings().cycles_until_long_break,
        "timer settings updated"
    );
    Ok(timer.reported(now))
}

fn mutate_cycle_items<F>(
    state: &AppState,
    command: &str,
    mutation: F,
) -> Result<DashboardSettings, InfraError>
where
    F: FnOnce(&[CycleItem]) -> Result<Vec<CycleItem>, CycleListError>,
{
    let mut settings = lock_settings(state)?;
    let items = mutation(&settings.cycle_items)?;
    let next = DashboardSettings {
        cycle_items: items,
        other: settings.other.clone(),
    };

    state.settings_repository.save(&next)?;
    *settings = next;
    debug!(command, items = settings.cycle_items.len(), "cycle list persisted");
    Ok(settings.clone())
}

fn required_id(value: &str) -> Result<&str, InfraError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InfraError::Validation("item id must not be empty".to_string()));
    }
    Ok(value)
}

fn lock_settings(state: &AppState) -> Result<MutexGuard<'_, DashboardSettings>, InfraError> {
    state
        .settings
        .lock()
        .map_err(|error| InfraError::State(format!("settings lock poisoned: {error}")))
}

fn lock_timer(state: &AppState) -> Result<MutexGuard<'_, TimerStateMachine>, InfraError> {
    state
        .timer
        .lock()
        .map_err(|error| InfraError::State(format!("timer lock poisoned: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CycleContent, CycleItemType, TimerMode, TimerSession};
    use crate::infrastructure::settings_repository::InMemorySettingsRepository;
    use crate::infrastructure::timer_repository::InMemoryTimerRepository;
    use chrono::Duration;
    use std::fs;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "dashboard-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    struct ManualClock {
        offset_seconds: Arc<AtomicI64>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                offset_seconds: Arc::new(AtomicI64::new(0)),
            }
        }

        fn provider(&self) -> NowProvider {
            let offset = Arc::clone(&self.offset_seconds);
            let origin = DateTime::parse_from_rfc3339("2026-02-16T09:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc);
            Arc::new(move || origin + Duration::seconds(offset.load(Ordering::SeqCst)))
        }

        fn advance(&self, seconds: i64) {
            self.offset_seconds.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    fn in_memory_state(clock: &ManualClock) -> AppState {
        AppState::with_repositories(
            Arc::new(InMemorySettingsRepository::default()),
            Arc::new(InMemoryTimerRepository::default()),
            &TimerPolicy::default(),
        )
        .expect("initialize app state")
        .with_now_provider(clock.provider())
    }

    fn text(value: &str) -> NewCycleItem {
        NewCycleItem::new(CycleContent::Text {
            text: value.to_string(),
            style: "scroll".to_string(),
            size: 1,
        })
    }

    #[test]
    fn fresh_state_has_single_time_item() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let settings = get_settings_impl(&state).expect("get settings");

        assert_eq!(settings.cycle_items.len(), 1);
        assert_eq!(settings.cycle_items[0].item_type(), CycleItemType::Time);
    }

    #[test]
    fn cycle_list_survives_restart() {
        let workspace = TempWorkspace::new();
        let added_id = {
            let state = workspace.app_state();
            let settings = add_cycle_item_impl(&state, text("HELLO")).expect("add item");
            settings.cycle_items[1].id.clone()
        };

        let reopened = workspace.app_state();
        let settings = get_settings_impl(&reopened).expect("get settings");
        assert_eq!(settings.cycle_items.len(), 2);
        assert_eq!(settings.cycle_items[1].id, added_id);
    }

    #[test]
    fn timer_state_survives_restart() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state();
            timer_action_impl(&state, TimerAction::Start).expect("start");
            timer_action_impl(&state, TimerAction::Skip).expect("skip");
        }

        let reopened = workspace.app_state();
        let snapshot = get_timer_impl(&reopened).expect("get timer");
        assert_eq!(snapshot.session.mode, TimerMode::Break);
        assert_eq!(snapshot.session.cycles_completed, 1);
    }

    #[test]
    fn deleting_every_item_leaves_fallback() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let settings = get_settings_impl(&state).expect("get settings");
        let only_id = settings.cycle_items[0].id.clone();

        let after = delete_cycle_item_impl(&state, &only_id).expect("delete");
        assert_eq!(after.cycle_items.len(), 1);
        assert_ne!(after.cycle_items[0].id, only_id);
        assert_eq!(after.cycle_items[0].item_type(), CycleItemType::Time);
    }

    #[test]
    fn reorder_reads_back_exactly_and_ignores_unknown_ids() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        add_cycle_item_impl(&state, NewCycleItem::new(CycleContent::Weather)).expect("add");
        let settings =
            add_cycle_item_impl(&state, NewCycleItem::new(CycleContent::Analog)).expect("add");
        let ids: Vec<String> = settings.cycle_items.iter().map(|item| item.id.clone()).collect();

        let order = vec![
            ids[2].clone(),
            "ghost".to_string(),
            ids[0].clone(),
            ids[1].clone(),
        ];
        reorder_cycle_items_impl(&state, order).expect("reorder");
        let read_back = get_settings_impl(&state).expect("get settings");
        let read_ids: Vec<String> = read_back.cycle_items.iter().map(|item| item.id.clone()).collect();

        assert_eq!(read_ids, vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]);
    }

    #[test]
    fn toggle_unknown_item_is_not_found() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        assert!(matches!(
            toggle_cycle_item_impl(&state, "missing"),
            Err(InfraError::NotFound(_))
        ));
        assert!(matches!(
            toggle_cycle_item_impl(&state, "  "),
            Err(InfraError::Validation(_))
        ));
    }

    #[test]
    fn settings_merge_overwrites_present_keys_only() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let first: SettingsPatch =
            serde_json::from_str(r#"{"brightness":40,"cycleInterval":12000}"#).expect("patch");
        update_settings_impl(&state, first).expect("merge");

        let second: SettingsPatch = serde_json::from_str(r#"{"brightness":80}"#).expect("patch");
        let merged = update_settings_impl(&state, second).expect("merge");

        assert_eq!(merged.other.get("brightness"), Some(&serde_json::json!(80)));
        assert_eq!(merged.other.get("cycleInterval"), Some(&serde_json::json!(12000)));
        assert_eq!(merged.cycle_items.len(), 1);
    }

    #[test]
    fn full_list_push_rejects_invalid_items_without_mutation() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let before = get_settings_impl(&state).expect("get settings");
        let invalid = CycleItem {
            id: "qr-1".to_string(),
            label: "Wifi".to_string(),
            enabled: true,
            duration: 0,
            content: CycleContent::Qr {
                qr_data: String::new(),
            },
        };

        let result = update_settings_impl(&state, SettingsPatch::cycle_items(vec![invalid]));
        assert!(matches!(result, Err(InfraError::Validation(_))));
        assert_eq!(get_settings_impl(&state).expect("get settings"), before);
    }

    #[test]
    fn empty_full_list_push_is_repaired() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let settings =
            update_settings_impl(&state, SettingsPatch::cycle_items(Vec::new())).expect("push");
        assert_eq!(settings.cycle_items.len(), 1);
        assert_eq!(settings.cycle_items[0].item_type(), CycleItemType::Time);
    }

    #[test]
    fn pomodoro_flow_alternates_and_reaches_long_break() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);

        let started = timer_action_impl(&state, TimerAction::Start).expect("start");
        assert_eq!(started.session.mode, TimerMode::Work);
        assert_eq!(started.session.time_remaining, 1500);

        let skipped = timer_action_impl(&state, TimerAction::Skip).expect("skip");
        assert_eq!(skipped.session.mode, TimerMode::Break);
        assert_eq!(skipped.session.time_remaining, 300);
        assert_eq!(skipped.session.cycles_completed, 1);

        for _ in 0..2 {
            clock.advance(300);
            assert_eq!(get_timer_impl(&state).expect("read").session.mode, TimerMode::Work);
            clock.advance(1500);
            assert_eq!(get_timer_impl(&state).expect("read").session.mode, TimerMode::Break);
        }
        clock.advance(300);
        get_timer_impl(&state).expect("read");
        clock.advance(1500);
        let fourth = get_timer_impl(&state).expect("read");

        assert_eq!(fourth.session.cycles_completed, 4);
        assert_eq!(fourth.session.mode, TimerMode::LongBreak);
        assert_eq!(fourth.session.time_remaining, 900);
    }

    #[test]
    fn invalid_transition_leaves_timer_unchanged() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let before = get_timer_impl(&state).expect("read");

        let result = timer_action_impl(&state, TimerAction::Pause);
        assert!(matches!(result, Err(InfraError::InvalidTransition(_))));
        assert_eq!(get_timer_impl(&state).expect("read"), before);
    }

    #[test]
    fn pause_and_resume_preserve_remaining_time() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        timer_action_impl(&state, TimerAction::Start).expect("start");
        clock.advance(200);

        let paused = timer_action_impl(&state, TimerAction::Pause).expect("pause");
        assert_eq!(paused.session.paused_remaining, 1300);
        clock.advance(5_000);

        let resumed = timer_action_impl(&state, TimerAction::Resume).expect("resume");
        assert_eq!(resumed.session.time_remaining, 1300);
        assert!(!resumed.session.is_paused);
    }

    #[test]
    fn timer_settings_update_uses_short_wire_names() {
        let clock = ManualClock::new();
        let state = in_memory_state(&clock);
        let snapshot = update_timer_settings_impl(
            &state,
            TimerSettingsUpdate {
                work_duration: 1800,
                break_duration: 600,
                long_break: 1200,
                cycles_until_long: 3,
                show_in_cycle: false,
            },
        )
        .expect("update settings");

        assert_eq!(snapshot.settings.long_break_duration, 1200);
        assert_eq!(snapshot.settings.cycles_until_long_break, 3);
        assert_eq!(snapshot.session.time_remaining, 1800);
    }

    #[test]
    fn reset_can_be_configured_to_clear_cycles() {
        let clock = ManualClock::new();
        let state = AppState::with_repositories(
            Arc::new(InMemorySettingsRepository::default()),
            Arc::new(InMemoryTimerRepository::default()),
            &TimerPolicy {
                reset_clears_cycles: true,
            },
        )
        .expect("initialize app state")
        .with_now_provider(clock.provider());

        timer_action_impl(&state, TimerAction::Start).expect("start");
        timer_action_impl(&state, TimerAction::Skip).expect("skip");
        let reset = timer_action_impl(&state, TimerAction::Reset).expect("reset");

        assert!(!reset.session.active);
        assert_eq!(reset.session.cycles_completed, 0);
    }

    #[test]
    fn corrupted_stored_timer_is_rejected_on_load() {
        let settings = TimerSettings::default();
        let timer_repository = InMemoryTimerRepository::default();
        let paused_but_inactive = TimerSession {
            is_paused: true,
            paused_remaining: 600,
            ..TimerSession::idle(&settings)
        };
        timer_repository
            .save(&paused_but_inactive, &settings)
            .expect("seed timer");

        let result = AppState::with_repositories(
            Arc::new(InMemorySettingsRepository::default()),
            Arc::new(timer_repository),
            &TimerPolicy::default(),
        );
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn stored_timer_with_zero_cycles_is_rejected_on_load() {
        let settings = TimerSettings {
            cycles_until_long_break: 0,
            ..TimerSettings::default()
        };
        let timer_repository = InMemoryTimerRepository::default();
        timer_repository
            .save(&TimerSession::idle(&settings), &settings)
            .expect("seed timer");

        let result = AppState::with_repositories(
            Arc::new(InMemorySettingsRepository::default()),
            Arc::new(timer_repository),
            &TimerPolicy::default(),
        );
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }
}
