use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub session: SessionSettings,
    pub resources: ResourceConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    pub websocket: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-asr".to_string(),
            http: HttpConfig {
                bind: "0.0.0.0".to_string(),
                port: 10096,
            },
            websocket: HttpConfig {
                bind: "0.0.0.0".to_string(),
                port: 10095,
            },
        }
    }
}

/// Where the inference services live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    /// Subjects are `{subject_prefix}.{collaborator}.generate`
    pub subject_prefix: String,
    pub punctuation: bool,
    pub speaker: bool,
    pub file_model: bool,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_timeout_ms: 30_000,
            subject_prefix: "asr".to_string(),
            punctuation: true,
            speaker: false,
            file_model: true,
        }
    }
}

/// Per-connection limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Default chunks per online pass (clients may override)
    pub chunk_interval: u32,
    pub buffer_capacity_mb: usize,
    /// Upload sessions run an offline pass every time this much is waiting
    pub upload_flush_mb: usize,
    pub offline_split_mb: usize,
    /// Unconsumed audio above this clears the accelerator cache
    pub pressure_clear_mb: usize,
    /// Chunks of history kept after an interim segment
    pub history_frames: usize,
    pub max_lookback_frames: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunk_interval: 10,
            buffer_capacity_mb: 100,
            upload_flush_mb: 5,
            offline_split_mb: 8,
            pressure_clear_mb: 50,
            history_frames: 20,
            max_lookback_frames: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub safety_factor: f64,
    pub relaxed_factor: f64,
    pub max_concurrent_inference: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            safety_factor: 2.0,
            relaxed_factor: 1.5,
            max_concurrent_inference: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub continuity_threshold_ms: i64,
    pub speaker_label_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            continuity_threshold_ms: 1000,
            speaker_label_prefix: "Speaker ".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
