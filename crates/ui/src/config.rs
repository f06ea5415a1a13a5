use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use parley_backend::{DEFAULT_ENDPOINT, normalize_endpoint};

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Client settings. There is no in-app surface for these; the JSON file in
/// the platform config directory is the only override point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Optional hard deadline for agent calls, in seconds. Unset keeps the
    /// original wait-indefinitely behavior.
    #[serde(default)]
    pub agent_deadline_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            agent_deadline_secs: None,
        }
    }
}

impl ClientSettings {
    fn normalized(mut self) -> Self {
        self.endpoint = normalize_endpoint(&self.endpoint);
        self
    }

    pub fn agent_deadline(&self) -> Option<Duration> {
        self.agent_deadline_secs
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to parse settings from {path:?} on `{stage}`: {source}"))]
    ParseSettings {
        stage: &'static str,
        path: PathBuf,
        source: figment::Error,
    },
}

/// Read-only settings holder, loaded once at startup.
pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
}

impl SettingsStore {
    pub fn new(config_path: PathBuf) -> Self {
        let settings = match Self::load_from_disk(&config_path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(error = %error, "using default settings");
                ClientSettings::default()
            }
        };

        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    fn load_from_disk(path: &PathBuf) -> Result<ClientSettings, SettingsError> {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            return Ok(ClientSettings::default());
        }

        let figment = Figment::from(Serialized::defaults(ClientSettings::default()))
            .merge(Json::file(path));

        let settings = figment
            .extract::<ClientSettings>()
            .context(ParseSettingsSnafu {
                stage: "extract-settings",
                path: path.clone(),
            })?;

        Ok(settings.normalized())
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_DIRECTORY_NAME)
            .join(SETTINGS_FILE_NAME)
    }
}
