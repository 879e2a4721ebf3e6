use std::fs;
use std::path::Path;
use std::time::Duration;

use gridwatch_core::{
    GridwatchError, ProbeConfig, RefreshCadence, SchedulerConfig, WidgetConfig, WidgetKind,
    WidgetTheme,
};

/// High-level configuration for the dashboard agent demo
#[derive(Clone, Debug)]
pub struct DashboardAgentConfig {
    pub probe: ProbeConfig,
    pub scheduler: SchedulerConfig,
    pub widgets: Vec<WidgetConfig>,
}

impl Default for DashboardAgentConfig {
    fn default() -> Self {
        // Core defaults already consider GRIDWATCH_* env vars
        Self {
            probe: ProbeConfig::default(),
            scheduler: SchedulerConfig::default(),
            widgets: Vec::new(),
        }
    }
}

impl DashboardAgentConfig {
    /// Load configuration from a TOML file (path via DASHBOARD_AGENT_CONFIG or
    /// ./dashboard_agent.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("DASHBOARD_AGENT_CONFIG")
            .unwrap_or_else(|_| "dashboard_agent.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "dashboard_agent", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "dashboard_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "dashboard_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, GridwatchError> {
        let t = toml::from_str::<DashboardAgentToml>(s)
            .map_err(|e| GridwatchError::Config(e.to_string()))?;
        Ok(t.overlay(Self::default()))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DashboardAgentToml {
    pub probe: Option<ProbeToml>,
    pub scheduler: Option<SchedulerToml>,
    #[serde(default)]
    pub widgets: Vec<WidgetToml>,
}

impl DashboardAgentToml {
    fn overlay(self, mut base: DashboardAgentConfig) -> DashboardAgentConfig {
        if let Some(p) = self.probe {
            p.apply(&mut base.probe);
        }
        if let Some(s) = self.scheduler {
            s.apply(&mut base.scheduler);
        }
        base.widgets
            .extend(self.widgets.into_iter().map(WidgetToml::into_config));
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ProbeToml {
    pub timeout_ms: Option<u64>,
    pub max_payload_bytes: Option<usize>,
    pub user_agent: Option<String>,
}
impl ProbeToml {
    fn apply(self, p: &mut ProbeConfig) {
        if let Some(v) = self.timeout_ms.filter(|v| *v > 0) {
            p.timeout_ms = v;
        }
        if let Some(v) = self.max_payload_bytes.filter(|v| *v > 0) {
            p.max_payload_bytes = v;
        }
        if let Some(v) = self.user_agent.filter(|v| !v.trim().is_empty()) {
            p.user_agent = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SchedulerToml {
    pub tick_secs: Option<u64>,
    pub per_widget: Option<bool>,
}
impl SchedulerToml {
    fn apply(self, s: &mut SchedulerConfig) {
        if let Some(v) = self.tick_secs.filter(|v| *v > 0) {
            s.tick_interval = Duration::from_secs(v);
        }
        if let Some(per_widget) = self.per_widget {
            s.cadence = if per_widget {
                RefreshCadence::PerWidget
            } else {
                RefreshCadence::GlobalTick
            };
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct WidgetToml {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub api_url: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub refresh_secs: Option<u64>,
    pub theme: Option<String>,
}
impl WidgetToml {
    fn into_config(self) -> WidgetConfig {
        let kind = match self.kind.as_deref().map(str::parse::<WidgetKind>) {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                tracing::warn!(target: "dashboard_agent", widget = %self.name, error = %e, "Using card");
                WidgetKind::Card
            }
            None => WidgetKind::Card,
        };
        let mut cfg = WidgetConfig::new(self.name, self.api_url)
            .kind(kind)
            .fields(self.fields)
            .theme(
                self.theme
                    .as_deref()
                    .map(WidgetTheme::from_name)
                    .unwrap_or_default(),
            );
        cfg.refresh_interval = self.refresh_secs;
        cfg
    }
}
