// Widget data model
//
// A widget binds one JSON endpoint and a set of selected field paths to a
// display kind. The store owns every Widget; callers get clones.

use crate::fields::resolve_path;
use crate::probe::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Unique widget identity; never reused within a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(u64);

impl WidgetId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget-{}", self.0)
    }
}

/// Display kind. Only renderers care about it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    #[default]
    Card,
    Table,
    Chart,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Card => "card",
            WidgetKind::Table => "table",
            WidgetKind::Chart => "chart",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(WidgetKind::Card),
            "table" => Ok(WidgetKind::Table),
            "chart" => Ok(WidgetKind::Chart),
            other => Err(format!("unknown widget type: {}", other)),
        }
    }
}

/// Cosmetic theme; no effect on fetching
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetTheme {
    #[default]
    Default,
    Minimal,
    Glass,
    Neon,
    Aurora,
    Sunset,
    Midnight,
    Ocean,
}

impl WidgetTheme {
    pub const ALL: [WidgetTheme; 8] = [
        WidgetTheme::Default,
        WidgetTheme::Minimal,
        WidgetTheme::Glass,
        WidgetTheme::Neon,
        WidgetTheme::Aurora,
        WidgetTheme::Sunset,
        WidgetTheme::Midnight,
        WidgetTheme::Ocean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WidgetTheme::Default => "default",
            WidgetTheme::Minimal => "minimal",
            WidgetTheme::Glass => "glass",
            WidgetTheme::Neon => "neon",
            WidgetTheme::Aurora => "aurora",
            WidgetTheme::Sunset => "sunset",
            WidgetTheme::Midnight => "midnight",
            WidgetTheme::Ocean => "ocean",
        }
    }

    /// Lenient lookup; unknown names fall back to the default theme
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == name)
            .unwrap_or_default()
    }
}

impl From<String> for WidgetTheme {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<WidgetTheme> for String {
    fn from(theme: WidgetTheme) -> Self {
        theme.as_str().to_string()
    }
}

/// Per-widget refresh interval in seconds, clamped to sane bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshInterval(u64);

impl RefreshInterval {
    pub const MIN_SECS: u64 = 10;
    pub const MAX_SECS: u64 = 3600;
    pub const DEFAULT_SECS: u64 = 30;

    /// Apply the default to unset/zero values and clamp the rest
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            None | Some(0) => Self(Self::DEFAULT_SECS),
            Some(s) => Self(s.clamp(Self::MIN_SECS, Self::MAX_SECS)),
        }
    }

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_SECS)
    }
}

/// Widget configuration handed in by the presentation layer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: WidgetKind,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub selected_fields: Vec<String>,
    #[serde(default)]
    pub refresh_interval: Option<u64>,
    #[serde(default)]
    pub theme: WidgetTheme,
}

impl WidgetConfig {
    pub fn new(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: WidgetKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn refresh_every(mut self, secs: u64) -> Self {
        self.refresh_interval = Some(secs);
        self
    }

    pub fn theme(mut self, theme: WidgetTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Check required fields; every missing one is reported
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.api_url.trim().is_empty() {
            missing.push("apiUrl");
        }
        if !self.selected_fields.iter().any(|f| !f.trim().is_empty()) {
            missing.push("selectedFields");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }
}

/// Widget configuration rejected before it reached the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("widget configuration missing required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
}

/// Which of `last_data` / `last_error` reflects the latest attempt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    NeverFetched,
    Fresh,
    Failed,
}

/// A widget as held by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub api_url: String,
    pub selected_fields: Vec<String>,
    pub refresh_interval: RefreshInterval,
    pub theme: WidgetTheme,
    pub position: u64,
    pub is_loading: bool,
    pub last_data: Option<Value>,
    pub last_error: Option<FetchError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub status: FetchStatus,
}

impl Widget {
    pub(crate) fn from_config(config: WidgetConfig, id: WidgetId, position: u64) -> Self {
        let mut selected_fields: Vec<String> = Vec::with_capacity(config.selected_fields.len());
        for field in config.selected_fields {
            let field = field.trim().to_string();
            if !field.is_empty() && !selected_fields.contains(&field) {
                selected_fields.push(field);
            }
        }

        Self {
            id,
            name: config.name.trim().to_string(),
            kind: config.kind,
            api_url: config.api_url.trim().to_string(),
            selected_fields,
            refresh_interval: RefreshInterval::from_secs(config.refresh_interval),
            theme: config.theme,
            position,
            is_loading: false,
            last_data: None,
            last_error: None,
            last_fetched_at: None,
            status: FetchStatus::NeverFetched,
        }
    }

    /// Whether the widget's own interval has elapsed since the last attempt
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(at) => {
                let elapsed = now.signed_duration_since(at);
                elapsed.num_seconds() >= self.refresh_interval.secs() as i64
            }
        }
    }

    /// Showing data from an earlier success after a later failure
    pub fn is_stale(&self) -> bool {
        self.status == FetchStatus::Failed && self.last_data.is_some()
    }

    /// Selected paths paired with their value in the latest data.
    ///
    /// A path missing from the payload (schema drift) yields `None`.
    pub fn selected_values(&self) -> Vec<(&str, Option<&Value>)> {
        self.selected_fields
            .iter()
            .map(|path| {
                let value = self
                    .last_data
                    .as_ref()
                    .and_then(|data| resolve_path(data, path));
                (path.as_str(), value)
            })
            .collect()
    }
}
