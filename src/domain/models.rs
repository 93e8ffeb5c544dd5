use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORK_SECONDS: u32 = 25 * 60;
pub const DEFAULT_BREAK_SECONDS: u32 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECONDS: u32 = 15 * 60;
pub const DEFAULT_CYCLES_UNTIL_LONG_BREAK: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CycleItemType {
    Time,
    Weather,
    Uptime,
    Text,
    Image,
    Qr,
    Countdown,
    Pomodoro,
    Spotify,
    Bcd,
    Analog,
    Moonphase,
    Wordclock,
}

impl CycleItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Weather => "weather",
            Self::Uptime => "uptime",
            Self::Text => "text",
            Self::Image => "image",
            Self::Qr => "qr",
            Self::Countdown => "countdown",
            Self::Pomodoro => "pomodoro",
            Self::Spotify => "spotify",
            Self::Bcd => "bcd",
            Self::Analog => "analog",
            Self::Moonphase => "moonphase",
            Self::Wordclock => "wordclock",
        }
    }

    pub fn default_label(self) -> &'static str {
        match self {
            Self::Time => "Clock",
            Self::Weather => "Weather",
            Self::Uptime => "Uptime",
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Qr => "QR Code",
            Self::Countdown => "Countdown",
            Self::Pomodoro => "Focus Timer",
            Self::Spotify => "Now Playing",
            Self::Bcd => "Binary Clock",
            Self::Analog => "Analog Clock",
            Self::Moonphase => "Moon Phase",
            Self::Wordclock => "Word Clock",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CycleContent {
    Time,
    Weather,
    Uptime,
    Text {
        text: String,
        #[serde(default = "default_text_style")]
        style: String,
        #[serde(default = "default_text_size")]
        size: u8,
    },
    Image {
        bitmap: String,
        width: u32,
        height: u32,
    },
    Qr {
        #[serde(rename = "qrData")]
        qr_data: String,
    },
    Countdown {
        #[serde(rename = "targetDate")]
        target_date: String,
        #[serde(rename = "targetLabel", default)]
        target_label: String,
    },
    Pomodoro,
    Spotify,
    Bcd,
    Analog,
    Moonphase,
    Wordclock,
}

fn default_text_style() -> String {
    "scroll".to_string()
}

fn default_text_size() -> u8 {
    1
}

impl CycleContent {
    pub fn item_type(&self) -> CycleItemType {
        match self {
            Self::Time => CycleItemType::Time,
            Self::Weather => CycleItemType::Weather,
            Self::Uptime => CycleItemType::Uptime,
            Self::Text { .. } => CycleItemType::Text,
            Self::Image { .. } => CycleItemType::Image,
            Self::Qr { .. } => CycleItemType::Qr,
            Self::Countdown { .. } => CycleItemType::Countdown,
            Self::Pomodoro => CycleItemType::Pomodoro,
            Self::Spotify => CycleItemType::Spotify,
            Self::Bcd => CycleItemType::Bcd,
            Self::Analog => CycleItemType::Analog,
            Self::Moonphase => CycleItemType::Moonphase,
            Self::Wordclock => CycleItemType::Wordclock,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Text { text, .. } => validate_non_empty(text, "cycle_item.text"),
            Self::Image {
                bitmap,
                width,
                height,
            } => {
                validate_non_empty(bitmap, "cycle_item.bitmap")?;
                if *width == 0 || *height == 0 {
                    return Err("cycle_item.width and cycle_item.height must be > 0".to_string());
                }
                Ok(())
            }
            Self::Qr { qr_data } => validate_non_empty(qr_data, "cycle_item.qrData"),
            Self::Countdown { target_date, .. } => {
                parse_target_date(target_date)
                    .map(|_| ())
                    .ok_or_else(|| "cycle_item.targetDate must be RFC3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Display time in milliseconds; 0 falls back to the dashboard default.
    #[serde(default)]
    pub duration: u64,
    #[serde(flatten)]
    pub content: CycleContent,
}

fn default_enabled() -> bool {
    true
}

impl CycleItem {
    pub fn item_type(&self) -> CycleItemType {
        self.content.item_type()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "cycle_item.id")?;
        self.content.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCycleItem {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(flatten)]
    pub content: CycleContent,
}

impl NewCycleItem {
    pub fn new(content: CycleContent) -> Self {
        Self {
            label: None,
            enabled: None,
            duration: None,
            content,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.content.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleItemEdit {
    pub label: Option<String>,
    pub enabled: Option<bool>,
    pub duration: Option<u64>,
    pub content: Option<CycleContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardSettings {
    #[serde(rename = "cycleItems")]
    pub cycle_items: Vec<CycleItem>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsPatch {
    #[serde(rename = "cycleItems", default, skip_serializing_if = "Option::is_none")]
    pub cycle_items: Option<Vec<CycleItem>>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl SettingsPatch {
    pub fn cycle_items(items: Vec<CycleItem>) -> Self {
        Self {
            cycle_items: Some(items),
            other: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Work,
    Break,
    LongBreak,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
            Self::LongBreak => "longBreak",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub mode: TimerMode,
    pub active: bool,
    pub is_paused: bool,
    /// Seconds. While running this is the phase length at `started_at`.
    pub time_remaining: u32,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub started_at: Option<DateTime<Utc>>,
    pub paused_remaining: u32,
    pub cycles_completed: u32,
}

impl TimerSession {
    pub fn idle(settings: &TimerSettings) -> Self {
        Self {
            mode: TimerMode::Work,
            active: false,
            is_paused: false,
            time_remaining: settings.work_duration,
            started_at: None,
            paused_remaining: 0,
            cycles_completed: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active && !self.is_paused
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.is_running() && self.started_at.is_none() {
            return Err("timer.started_at is required while running".to_string());
        }
        if !self.active && self.is_paused {
            return Err("timer.is_paused requires an active session".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    pub work_duration: u32,
    pub break_duration: u32,
    pub long_break_duration: u32,
    pub cycles_until_long_break: u32,
    pub show_in_cycle: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: DEFAULT_WORK_SECONDS,
            break_duration: DEFAULT_BREAK_SECONDS,
            long_break_duration: DEFAULT_LONG_BREAK_SECONDS,
            cycles_until_long_break: DEFAULT_CYCLES_UNTIL_LONG_BREAK,
            show_in_cycle: true,
        }
    }
}

impl TimerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.work_duration == 0 {
            return Err("timer.work_duration must be > 0".to_string());
        }
        if self.break_duration == 0 {
            return Err("timer.break_duration must be > 0".to_string());
        }
        if self.long_break_duration == 0 {
            return Err("timer.long_break_duration must be > 0".to_string());
        }
        if self.cycles_until_long_break == 0 {
            return Err("timer.cycles_until_long_break must be > 0".to_string());
        }
        Ok(())
    }

    pub fn duration_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_duration,
            TimerMode::Break => self.break_duration,
            TimerMode::LongBreak => self.long_break_duration,
        }
    }
}

/// Body of the timer settings endpoint; its field names differ from `TimerSettings`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettingsUpdate {
    pub work_duration: u32,
    pub break_duration: u32,
    pub long_break: u32,
    pub cycles_until_long: u32,
    pub show_in_cycle: bool,
}

impl From<&TimerSettings> for TimerSettingsUpdate {
    fn from(settings: &TimerSettings) -> Self {
        Self {
            work_duration: settings.work_duration,
            break_duration: settings.break_duration,
            long_break: settings.long_break_duration,
            cycles_until_long: settings.cycles_until_long_break,
            show_in_cycle: settings.show_in_cycle,
        }
    }
}

impl From<TimerSettingsUpdate> for TimerSettings {
    fn from(update: TimerSettingsUpdate) -> Self {
        Self {
            work_duration: update.work_duration,
            break_duration: update.break_duration,
            long_break_duration: update.long_break,
            cycles_until_long_break: update.cycles_until_long,
            show_in_cycle: update.show_in_cycle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub session: TimerSession,
    pub settings: TimerSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Reset,
    Skip,
}

impl TimerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
            Self::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerActionRequest {
    pub action: TimerAction,
}

pub fn parse_target_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
