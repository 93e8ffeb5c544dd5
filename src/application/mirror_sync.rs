use crate::application::edit_queue::{
    CycleListEditor, EditQueue, PollOutcome, PushResult, PushTicket, TimerSettingsEditor,
};
use crate::domain::cycle_list::CycleListError;
use crate::domain::models::{
    CycleItem, CycleItemEdit, DashboardSettings, NewCycleItem, SettingsPatch, TimerAction,
    TimerSession, TimerSettings, TimerSettingsUpdate, TimerSnapshot,
};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::dashboard_client::DashboardApi;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration as TokioDuration, MissedTickBehavior};
use tracing::{debug, info, warn};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorView {
    pub cycle_items: Vec<CycleItem>,
    pub timer_settings: TimerSettings,
    pub timer_session: Option<TimerSession>,
}

impl MirrorView {
    pub fn timer_snapshot(&self) -> Option<TimerSnapshot> {
        self.timer_session.as_ref().map(|session| TimerSnapshot {
            session: session.clone(),
            settings: self.timer_settings.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Active,
    ReauthenticationRequired { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poller {
    CycleList,
    Timer,
}

impl Poller {
    fn as_str(self) -> &'static str {
        match self {
            Self::CycleList => "cycle_list",
            Self::Timer => "timer",
        }
    }
}

/// Client half of the dashboard. Edits spawn their pushes, so they need a tokio runtime.
pub struct DashboardSync<C, S>
where
    C: DashboardApi,
    S: CredentialStore,
{
    api: Arc<C>,
    credentials: Arc<S>,
    token: Arc<Mutex<Option<String>>>,
    config: Arc<ClientConfig>,
    list: Arc<Mutex<CycleListEditor>>,
    timer_settings: Arc<Mutex<TimerSettingsEditor>>,
    timer_session: Arc<Mutex<Option<TimerSession>>>,
    view_tx: Arc<watch::Sender<MirrorView>>,
    auth_tx: Arc<watch::Sender<AuthStatus>>,
    now_provider: NowProvider,
}

impl<C, S> Clone for DashboardSync<C, S>
where
    C: DashboardApi,
    S: CredentialStore,
{
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            credentials: Arc::clone(&self.credentials),
            token: Arc::clone(&self.token),
            config: Arc::clone(&self.config),
            list: Arc::clone(&self.list),
            timer_settings: Arc::clone(&self.timer_settings),
            timer_session: Arc::clone(&self.timer_session),
            view_tx: Arc::clone(&self.view_tx),
            auth_tx: Arc::clone(&self.auth_tx),
            now_provider: Arc::clone(&self.now_provider),
        }
    }
}

impl<C, S> DashboardSync<C, S>
where
    C: DashboardApi + 'static,
    S: CredentialStore + 'static,
{
    pub fn new(api: Arc<C>, credentials: Arc<S>, config: ClientConfig) -> Self {
        let list = CycleListEditor::for_cycle_list(config.list_grace_ms);
        let timer_settings = TimerSettingsEditor::for_timer_settings(config.timer_settings_grace_ms);
        let (view_tx, _) = watch::channel(MirrorView::default());
        let (auth_tx, _) = watch::channel(AuthStatus::Active);

        Self {
            api,
            credentials,
            token: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
            list: Arc::new(Mutex::new(list)),
            timer_settings: Arc::new(Mutex::new(timer_settings)),
            timer_session: Arc::new(Mutex::new(None)),
            view_tx: Arc::new(view_tx),
            auth_tx: Arc::new(auth_tx),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<MirrorView> {
        self.view_tx.subscribe()
    }

    pub fn auth_status(&self) -> watch::Receiver<AuthStatus> {
        self.auth_tx.subscribe()
    }

    pub fn view(&self) -> MirrorView {
        self.view_tx.borrow().clone()
    }

    pub fn pending_pushes(&self) -> Result<u32, InfraError> {
        let list = self.lock_list()?.in_flight();
        let timer_settings = self.lock_timer_settings()?.in_flight();
        Ok(list + timer_settings)
    }

    pub fn set_token(&self, token: &str) -> Result<(), InfraError> {
        self.credentials.save_token(token)?;
        *self.lock_token()? = Some(token.trim().to_string());
        self.auth_tx.send_replace(AuthStatus::Active);
        info!("api token stored");
        Ok(())
    }

    pub fn add_item(&self, new_item: NewCycleItem) -> Result<(), InfraError> {
        self.edit_list(|list| list.add(new_item))
    }

    pub fn toggle_item(&self, id: &str) -> Result<(), InfraError> {
        self.edit_list(|list| list.toggle(id))
    }

    pub fn delete_item(&self, id: &str) -> Result<(), InfraError> {
        self.edit_list(|list| list.delete(id))
    }

    pub fn reorder_items(&self, order: &[String]) -> Result<(), InfraError> {
        self.edit_list(|list| Ok(list.reorder(order)))
    }

    pub fn edit_item(&self, id: &str, changes: &CycleItemEdit) -> Result<(), InfraError> {
        self.edit_list(|list| list.edit(id, changes))
    }

    pub fn update_timer_settings(&self, settings: TimerSettings) -> Result<(), InfraError> {
        let ticket = {
            let mut editor = self.lock_timer_settings()?;
            editor.set(settings).map_err(InfraError::Validation)?
        };
        self.publish()?;

        let this = self.clone();
        tokio::spawn(async move {
            let debounce_ms = this.config.timer_settings_push_debounce_ms;
            let editor = Arc::clone(&this.timer_settings);
            this.run_push(editor, ticket, debounce_ms, "timer_settings", |api, token, settings| async move {
                api.push_timer_settings(&token, &TimerSettingsUpdate::from(&settings))
                    .await
                    .map(|_| ())
            })
            .await;
        });
        Ok(())
    }

    /// Writes one non-list setting straight through. The reply does not touch the mirror.
    pub async fn update_setting(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<DashboardSettings, InfraError> {
        let key = key.trim();
        if key.is_empty() || key == "cycleItems" {
            return Err(InfraError::Validation(format!(
                "'{key}' is not an individual setting"
            )));
        }
        let mut patch = SettingsPatch::default();
        patch.other.insert(key.to_string(), value);

        let result = match self.current_token().await {
            Ok(token) => self.api.push_settings(&token, &patch).await,
            Err(error) => Err(error),
        };
        let settings = result.inspect_err(|error| self.on_request_error("update_setting", error))?;
        info!(setting = key, "setting updated");
        Ok(settings)
    }

    pub fn focus_timer_field(&self, field: &str) -> Result<(), InfraError> {
        self.lock_timer_settings()?.focus(field);
        Ok(())
    }

    pub fn blur_timer_field(&self, field: &str) -> Result<(), InfraError> {
        self.lock_timer_settings()?.blur(field);
        Ok(())
    }

    pub fn timer_pointer_down(&self) -> Result<(), InfraError> {
        self.lock_timer_settings()?.pointer_down();
        Ok(())
    }

    pub fn timer_pointer_up(&self) -> Result<(), InfraError> {
        self.lock_timer_settings()?.pointer_up();
        Ok(())
    }

    pub async fn timer_action(&self, action: TimerAction) -> Result<TimerSnapshot, InfraError> {
        let result = match self.current_token().await {
            Ok(token) => self.api.send_timer_action(&token, action).await,
            Err(error) => Err(error),
        };
        let snapshot = result.inspect_err(|error| self.on_request_error("timer_action", error))?;

        *self.lock_timer_session()? = Some(snapshot.session.clone());
        self.publish()?;
        info!(
            action = action.as_str(),
            mode = snapshot.session.mode.as_str(),
            active = snapshot.session.active,
            "timer action acknowledged"
        );
        Ok(snapshot)
    }

    pub async fn poll_list_once(&self) -> Result<PollOutcome, InfraError> {
        let token = self.current_token().await?;
        let settings = self
            .api
            .fetch_settings(&token)
            .await
            .inspect_err(|error| self.on_request_error("poll_settings", error))?;

        let now = self.now();
        let outcome = self.lock_list()?.apply_poll(settings.cycle_items, now);
        match outcome {
            PollOutcome::Applied => self.publish()?,
            PollOutcome::Suppressed(reason) => {
                debug!(editor = "cycle_list", reason = reason.as_str(), "poll suppressed");
            }
        }
        Ok(outcome)
    }

    /// The session always follows the server; only the settings form is subject to
    /// suppression.
    pub async fn poll_timer_once(&self) -> Result<PollOutcome, InfraError> {
        let token = self.current_token().await?;
        let snapshot = self
            .api
            .fetch_timer(&token)
            .await
            .inspect_err(|error| self.on_request_error("poll_timer", error))?;

        let now = self.now();
        *self.lock_timer_session()? = Some(snapshot.session);
        let outcome = self.lock_timer_settings()?.apply_poll(snapshot.settings, now);
        if let PollOutcome::Suppressed(reason) = outcome {
            debug!(editor = "timer_settings", reason = reason.as_str(), "poll suppressed");
        }
        self.publish()?;
        Ok(outcome)
    }

    pub fn spawn_pollers(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let list = self.clone();
        let timer = self.clone();
        let list_shutdown = shutdown.clone();
        vec![
            tokio::spawn(async move { list.run_poll_loop(Poller::CycleList, list_shutdown).await }),
            tokio::spawn(async move { timer.run_poll_loop(Poller::Timer, shutdown).await }),
        ]
    }

    async fn run_poll_loop(self, poller: Poller, mut shutdown: watch::Receiver<bool>) {
        let period_ms = match poller {
            Poller::CycleList => self.config.list_poll_ms,
            Poller::Timer => self.config.timer_poll_ms,
        };
        let mut ticker = interval(TokioDuration::from_millis(period_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(poller = poller.as_str(), period_ms, "poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = match poller {
                        Poller::CycleList => self.poll_list_once().await,
                        Poller::Timer => self.poll_timer_once().await,
                    };
                    match result {
                        Ok(_) => {}
                        Err(InfraError::Unauthorized(message)) => {
                            debug!(poller = poller.as_str(), %message, "poll skipped without authorization");
                        }
                        Err(error) => warn!(poller = poller.as_str(), error = %error, "poll failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(poller = poller.as_str(), "poller stopped");
                        break;
                    }
                }
            }
        }
    }

    fn edit_list<F>(&self, edit: F) -> Result<(), InfraError>
    where
        F: FnOnce(&mut CycleListEditor) -> Result<PushTicket, CycleListError>,
    {
        let ticket = {
            let mut list = self.lock_list()?;
            edit(&mut list)?
        };
        self.publish()?;

        let this = self.clone();
        tokio::spawn(async move {
            let debounce_ms = this.config.list_push_debounce_ms;
            let editor = Arc::clone(&this.list);
            this.run_push(editor, ticket, debounce_ms, "cycle_list", |api, token, items| async move {
                api.push_settings(&token, &SettingsPatch::cycle_items(items))
                    .await
                    .map(|_| ())
            })
            .await;
        });
        Ok(())
    }

    async fn run_push<T, F, Fut>(
        &self,
        editor: Arc<Mutex<EditQueue<T>>>,
        ticket: PushTicket,
        debounce_ms: u64,
        label: &'static str,
        send: F,
    ) where
        T: Clone,
        F: FnOnce(Arc<C>, String, T) -> Fut,
        Fut: Future<Output = Result<(), InfraError>>,
    {
        if debounce_ms > 0 {
            sleep(TokioDuration::from_millis(debounce_ms)).await;
        }

        let Some(payload) = take_latest(&editor, ticket, label) else {
            return;
        };
        let result = match self.current_token().await {
            Ok(token) => send(Arc::clone(&self.api), token, payload).await,
            Err(error) => Err(error),
        };

        let push_result = if result.is_ok() {
            PushResult::Succeeded
        } else {
            PushResult::Failed
        };
        let now = self.now();
        match editor.lock() {
            Ok(mut queue) => queue.finish_push(ticket, push_result, now),
            Err(error) => warn!(editor = label, %error, "edit queue lock poisoned"),
        }

        match result {
            Ok(()) => info!(editor = label, "push completed"),
            Err(error) if error.is_unauthorized() => self.on_request_error(label, &error),
            Err(error) => warn!(editor = label, error = %error, "push dropped; local state kept"),
        }
    }

    fn on_request_error(&self, context: &str, error: &InfraError) {
        if !error.is_unauthorized() {
            return;
        }
        warn!(context, error = %error, "authorization rejected; re-authentication required");
        match self.lock_token() {
            Ok(mut cached) => *cached = None,
            Err(lock_error) => warn!(context, error = %lock_error, "token cache unavailable"),
        }
        let credentials = Arc::clone(&self.credentials);
        tokio::task::spawn_blocking(move || {
            if let Err(delete_error) = credentials.delete_token() {
                warn!(error = %delete_error, "failed to clear stored api token");
            }
        });
        let reason = error.to_string();
        self.auth_tx.send_if_modified(|status| {
            if matches!(status, AuthStatus::ReauthenticationRequired { .. }) {
                return false;
            }
            *status = AuthStatus::ReauthenticationRequired { reason };
            true
        });
    }

    async fn current_token(&self) -> Result<String, InfraError> {
        let cached = self.lock_token()?.clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let credentials = Arc::clone(&self.credentials);
        let stored = tokio::task::spawn_blocking(move || credentials.load_token())
            .await
            .map_err(|error| InfraError::State(format!("credential lookup failed: {error}")))??;
        let token =
            stored.ok_or_else(|| InfraError::Unauthorized("no api token stored".to_string()))?;
        *self.lock_token()? = Some(token.clone());
        Ok(token)
    }

    fn publish(&self) -> Result<(), InfraError> {
        let cycle_items = self.lock_list()?.mirror().clone();
        let timer_settings = self.lock_timer_settings()?.mirror().clone();
        let timer_session = self.lock_timer_session()?.clone();
        self.view_tx.send_replace(MirrorView {
            cycle_items,
            timer_settings,
            timer_session,
        });
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    fn lock_token(&self) -> Result<MutexGuard<'_, Option<String>>, InfraError> {
        self.token
            .lock()
            .map_err(|error| InfraError::State(format!("token cache lock poisoned: {error}")))
    }

    fn lock_list(&self) -> Result<MutexGuard<'_, CycleListEditor>, InfraError> {
        self.list
            .lock()
            .map_err(|error| InfraError::State(format!("cycle list editor lock poisoned: {error}")))
    }

    fn lock_timer_settings(&self) -> Result<MutexGuard<'_, TimerSettingsEditor>, InfraError> {
        self.timer_settings
            .lock()
            .map_err(|error| InfraError::State(format!("timer settings editor lock poisoned: {error}")))
    }

    fn lock_timer_session(&self) -> Result<MutexGuard<'_, Option<TimerSession>>, InfraError> {
        self.timer_session
            .lock()
            .map_err(|error| InfraError::State(format!("timer session lock poisoned: {error}")))
    }
}

fn take_latest<T: Clone>(
    editor: &Mutex<EditQueue<T>>,
    ticket: PushTicket,
    label: &'static str,
) -> Option<T> {
    let mut queue = match editor.lock() {
        Ok(queue) => queue,
        Err(error) => {
            warn!(editor = label, %error, "edit queue lock poisoned");
            return None;
        }
    };
    if !queue.is_latest(ticket) {
        queue.release(ticket);
        debug!(editor = label, "push superseded by a newer edit");
        return None;
    }
    Some(queue.mirror().clone())
}
