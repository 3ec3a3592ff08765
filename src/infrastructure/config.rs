use crate::domain::curve::ChartLayout;
use crate::domain::sync::RemainingStrategy;
use crate::domain::video::NetworkTransport;
use crate::infrastructure::retry_scheduler::DEFAULT_MAX_ATTEMPTS;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

const ENV_PREFIX: &str = "REHAB";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub store: StoreSettings,
    #[serde(default)]
    pub user: UserSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub chart: ChartLayout,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub history_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserSettings {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncSettings {
    pub remaining_strategy: RemainingStrategy,
    /// Run pending videos as a third "sync now" channel
    pub include_videos: bool,
    pub worker_threads: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remaining_strategy: RemainingStrategy::default(),
            include_videos: false,
            worker_threads: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NetworkSettings {
    pub transport: NetworkTransport,
    pub metered_consent: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    pub firestore: FirestoreSettings,
    pub supabase: SupabaseSettings,
    pub video: VideoSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirestoreSettings {
    #[serde(default = "default_firestore_url")]
    pub base_url: String,
    pub project_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub api_key: String,
    pub bucket: String,
    pub csv_dir: PathBuf,
    /// Delay before the first background retry of a failed file; 0 retries right away
    #[serde(default)]
    pub retry_interval_minutes: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoSettings {
    pub base_url: String,
    pub remote_dir: String,
    pub video_dir: PathBuf,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_minutes: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_retry_interval() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load(config::File::with_name("config/app"))
}

pub fn load_uploads_config() -> anyhow::Result<UploadsConfig> {
    load(config::File::with_name("config/uploads"))
}

/// Layer `REHAB__SECTION__KEY` environment overrides over one file source
fn load<T, S>(file: S) -> anyhow::Result<T>
where
    T: DeserializeOwned,
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_app_config_defaults() {
        let toml = r#"
            [store]
            history_path = "data/history.json"

            [sync]
            remaining_strategy = "fail_counts"

            [chart]
            margin = 40.0
        "#;
        let cfg: AppConfig = load(File::from_str(toml, FileFormat::Toml)).unwrap();

        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.user.id, None);
        assert_eq!(cfg.sync.remaining_strategy, RemainingStrategy::FailCounts);
        assert_eq!(cfg.sync.worker_threads, 4);
        assert!(!cfg.sync.include_videos);
        assert_eq!(cfg.network.transport, NetworkTransport::Unmetered);
        assert_eq!(cfg.chart.margin, 40.0);
        assert_eq!(cfg.chart.tick_length, 8.0);
    }

    #[test]
    fn test_uploads_config() {
        let toml = r#"
            [firestore]
            project_id = "rehab-demo"

            [supabase]
            url = "https://example.supabase.co"
            api_key = "anon"
            bucket = "training"
            csv_dir = "data/csv"

            [video]
            base_url = "https://files.example.com"
            remote_dir = "videos"
            video_dir = "data/videos"
        "#;
        let cfg: UploadsConfig = load(File::from_str(toml, FileFormat::Toml)).unwrap();

        assert_eq!(cfg.firestore.base_url, "https://firestore.googleapis.com/v1");
        assert_eq!(cfg.firestore.concurrency, 4);
        assert_eq!(cfg.video.retry_interval_minutes, 15);
        assert_eq!(cfg.video.max_attempts, 5);
        assert_eq!(cfg.supabase.csv_dir, PathBuf::from("data/csv"));
        assert_eq!(cfg.supabase.retry_interval_minutes, 0);
        assert_eq!(cfg.supabase.max_attempts, 5);
    }
}
