use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use finscribe_answer::{
    DEFAULT_ANSWER_ENDPOINT, DEFAULT_BACKEND_ENDPOINT, RetryPolicy, ServiceConfig,
};
use finscribe_chat::{SessionContext, SessionSeed};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "finscribe";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "FINSCRIBE_";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "chat_export.txt";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_answer_endpoint")]
    pub answer_endpoint: String,
    #[serde(default = "default_backend_endpoint")]
    pub backend_endpoint: String,
    /// Signed-in user; blank means every request-issuing command is rejected.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_export_file_name")]
    pub export_file_name: String,
    /// Processing run the session is seeded from; blank starts an unseeded session.
    #[serde(default)]
    pub processing_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            answer_endpoint: default_answer_endpoint(),
            backend_endpoint: default_backend_endpoint(),
            user_id: String::new(),
            username: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            export_file_name: default_export_file_name(),
            processing_id: String::new(),
        }
    }
}

impl Settings {
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig::new(&self.answer_endpoint, &self.backend_endpoint)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_retry(RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_backoff_ms),
            ))
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(&self.user_id).with_username(&self.username)
    }

    pub fn session_seed(&self) -> SessionSeed {
        let processing_id = self.processing_id.trim();
        if processing_id.is_empty() {
            SessionSeed::default()
        } else {
            SessionSeed::new(processing_id)
        }
    }

    pub fn normalized(mut self) -> Self {
        self.answer_endpoint = non_blank_or(self.answer_endpoint, default_answer_endpoint);
        self.backend_endpoint = non_blank_or(self.backend_endpoint, default_backend_endpoint);
        self.user_id = self.user_id.trim().to_string();
        self.username = self.username.trim().to_string();
        self.processing_id = self.processing_id.trim().to_string();
        self.export_file_name = non_blank_or(self.export_file_name, default_export_file_name);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self
    }
}

pub struct SettingsStore {
    settings: ArcSwap<Settings>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".finscribe"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: ArcSwap::from_pointee(settings),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Normalizes `settings`, writes them to the settings file and then publishes them.
    ///
    /// The in-memory copy is left alone when the write fails.
    pub fn update(&self, settings: Settings) -> Result<Arc<Settings>, SettingsError> {
        let settings = Arc::new(settings.normalized());
        self.write_to_disk(&settings)?;
        self.settings.store(Arc::clone(&settings));
        Ok(settings)
    }

    fn load_from_disk(path: &Path) -> Settings {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file; starting from defaults");
        }

        let extracted = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract::<Settings>();
        match extracted {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "ignoring unreadable settings; starting from defaults"
                );
                Settings::default()
            }
        }
    }

    fn write_to_disk(&self, settings: &Settings) -> Result<(), SettingsError> {
        const STAGE: &str = "persist-settings";
        let path = &self.config_path;
        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory).context(CreateSettingsDirSnafu {
                stage: STAGE,
                directory,
            })?;
        }

        let json =
            serde_json::to_vec_pretty(settings).context(EncodeSettingsSnafu { stage: STAGE })?;

        // Written next to the target, then renamed over it in one step.
        let partial = path.with_extension("json.partial");
        std::fs::write(&partial, json).context(WriteSettingsSnafu {
            stage: STAGE,
            path: &partial,
        })?;
        std::fs::rename(&partial, path).context(ReplaceSettingsSnafu { stage: STAGE, path })?;

        tracing::info!(
            path = %path.display(),
            signed_in = !settings.user_id.is_empty(),
            "saved settings"
        );
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create settings directory {directory:?} (`{stage}`): {source}"))]
    CreateSettingsDir {
        stage: &'static str,
        directory: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode settings (`{stage}`): {source}"))]
    EncodeSettings {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot write settings to {path:?} (`{stage}`): {source}"))]
    WriteSettings {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot move new settings into {path:?} (`{stage}`): {source}"))]
    ReplaceSettings {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: String, default: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_string()
    }
}

fn default_answer_endpoint() -> String {
    DEFAULT_ANSWER_ENDPOINT.to_string()
}

fn default_backend_endpoint() -> String {
    DEFAULT_BACKEND_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_export_file_name() -> String {
    DEFAULT_EXPORT_FILE_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        Jail::expect_with(|jail| {
            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(*store.settings(), Settings::default());
            assert!(!store.settings().session_context().is_authenticated());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{
                    "answer_endpoint": "http://answers.internal:5001/",
                    "user_id": "file-user",
                    "retry_attempts": 4
                }"#,
            )?;
            jail.set_env("FINSCRIBE_RETRY_ATTEMPTS", "6");

            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            let settings = store.settings();
            assert_eq!(settings.answer_endpoint, "http://answers.internal:5001/");
            assert_eq!(settings.user_id, "file-user");
            assert_eq!(settings.retry_attempts, 6);
            assert_eq!(settings.backend_endpoint, DEFAULT_BACKEND_ENDPOINT);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, r#"{"retry_attempts": "many"}"#)?;
            let store = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME));
            assert_eq!(*store.settings(), Settings::default());
            Ok(())
        });
    }

    #[test]
    fn update_persists_normalized_settings() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path.clone());

            store
                .update(Settings {
                    answer_endpoint: "   ".to_string(),
                    user_id: " user-7 ".to_string(),
                    export_file_name: String::new(),
                    ..Settings::default()
                })
                .expect("settings persist");

            let settings = store.settings();
            assert_eq!(settings.answer_endpoint, DEFAULT_ANSWER_ENDPOINT);
            assert_eq!(settings.user_id, "user-7");
            assert_eq!(settings.export_file_name, DEFAULT_EXPORT_FILE_NAME);

            let reloaded = SettingsStore::new(path);
            assert_eq!(*reloaded.settings(), *settings);
            Ok(())
        });
    }

    #[test]
    fn failed_write_keeps_current_settings() {
        Jail::expect_with(|jail| {
            jail.create_file("occupied", "not a directory")?;
            let path = jail.directory().join("occupied").join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path);

            let error = store
                .update(Settings {
                    user_id: "user-7".to_string(),
                    ..Settings::default()
                })
                .unwrap_err();
            assert!(matches!(
                error,
                SettingsError::CreateSettingsDir {
                    stage: "persist-settings",
                    ..
                }
            ));
            assert!(store.settings().user_id.is_empty());
            Ok(())
        });
    }

    #[test]
    fn service_config_carries_timeout_and_retry() {
        let settings = Settings {
            request_timeout_secs: 5,
            retry_attempts: 3,
            retry_backoff_ms: 10,
            ..Settings::default()
        };
        let config = settings.to_service_config();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.retry,
            RetryPolicy::new(3, Duration::from_millis(10))
        );
        assert_eq!(config.answer_endpoint, DEFAULT_ANSWER_ENDPOINT);
    }

    #[test]
    fn blank_processing_id_means_unseeded_session() {
        assert_eq!(Settings::default().session_seed(), SessionSeed::default());
        let settings = Settings {
            processing_id: "run-42".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            settings.session_seed().processing_id.as_deref(),
            Some("run-42")
        );
    }
}
