use super::messages::Mode;
use crate::error::{AsrError, Result};
use crate::recognition::GenerateOptions;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// Client-controlled settings of one connection
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub mode: Mode,

    /// Chunks queued per online pass
    pub chunk_interval: u32,

    /// Echoed back on every message
    pub wav_name: String,

    /// Online recognizer look-ahead configuration
    pub chunk_size: [u32; 3],

    pub hotwords: Option<String>,
    pub encoder_chunk_look_back: Option<u32>,
    pub decoder_chunk_look_back: Option<u32>,
    pub is_speaking: bool,
    pub is_file_upload: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::TwoPass,
            chunk_interval: 10,
            wav_name: "microphone".to_string(),
            chunk_size: [5, 10, 5],
            hotwords: None,
            encoder_chunk_look_back: None,
            decoder_chunk_look_back: None,
            is_speaking: true,
            is_file_upload: false,
        }
    }
}

/// What changed when a control message was applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlEffects {
    pub speaking_started: bool,
    pub speaking_stopped: bool,
    pub upload_complete: bool,
}

impl SessionConfig {
    pub fn with_chunk_interval(chunk_interval: u32) -> Self {
        Self {
            chunk_interval: chunk_interval.max(1),
            ..Default::default()
        }
    }

    /// Apply the keys present in `control`; absent keys keep their values
    pub fn apply(&mut self, control: &ControlMessage) -> ControlEffects {
        let mut effects = ControlEffects::default();

        if let Some(is_speaking) = control.is_speaking {
            effects.speaking_started = is_speaking;
            effects.speaking_stopped = !is_speaking;
            self.is_speaking = is_speaking;
        }
        if let Some(chunk_interval) = control.chunk_interval {
            self.chunk_interval = chunk_interval;
        }
        if let Some(wav_name) = &control.wav_name {
            self.wav_name = wav_name.clone();
        }
        if let Some(chunk_size) = control.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(hotwords) = &control.hotwords {
            self.hotwords = Some(hotwords.clone());
        }
        if let Some(look_back) = control.encoder_chunk_look_back {
            self.encoder_chunk_look_back = Some(look_back);
        }
        if let Some(look_back) = control.decoder_chunk_look_back {
            self.decoder_chunk_look_back = Some(look_back);
        }
        if let Some(mode) = control.mode {
            self.mode = mode;
        }
        if let Some(is_file_upload) = control.is_file_upload {
            self.is_file_upload = is_file_upload;
        }
        effects.upload_complete = control.upload_complete;

        effects
    }

    /// Options for an online pass
    pub fn online_options(&self, is_final: bool) -> GenerateOptions {
        GenerateOptions {
            is_final,
            hotword: None,
            chunk_size: Some(self.chunk_size),
            encoder_chunk_look_back: self.encoder_chunk_look_back,
            decoder_chunk_look_back: self.decoder_chunk_look_back,
            batch_size_s: None,
        }
    }

    /// VAD window: `chunk_size[1] * 60 / chunk_interval` milliseconds
    pub fn vad_chunk_ms(&self) -> u32 {
        self.chunk_size[1] * 60 / self.chunk_interval.max(1)
    }
}

/// A parsed client control frame. Every field is optional and parsed on
/// its own, so one bad value never discards the rest of the frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlMessage {
    pub is_speaking: Option<bool>,
    pub chunk_interval: Option<u32>,
    pub wav_name: Option<String>,
    pub chunk_size: Option<[u32; 3]>,
    pub hotwords: Option<String>,
    pub encoder_chunk_look_back: Option<u32>,
    pub decoder_chunk_look_back: Option<u32>,
    pub mode: Option<Mode>,
    pub is_file_upload: Option<bool>,
    pub upload_complete: bool,
}

impl ControlMessage {
    /// Parse a text frame. Only a frame that is not a JSON object is an
    /// error; bad values are logged and dropped key by key.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AsrError::ProtocolViolation(format!("control frame is not JSON: {}", e)))?;

        let Value::Object(map) = value else {
            return Err(AsrError::ProtocolViolation(
                "control frame is not a JSON object".to_string(),
            ));
        };

        Ok(Self {
            is_speaking: field(&map, "is_speaking"),
            chunk_interval: field::<u32>(&map, "chunk_interval").filter(|interval| {
                if *interval == 0 {
                    warn!("Ignoring chunk_interval 0");
                }
                *interval > 0
            }),
            wav_name: field(&map, "wav_name"),
            chunk_size: map.get("chunk_size").and_then(parse_chunk_size),
            hotwords: map.get("hotwords").and_then(parse_hotwords),
            encoder_chunk_look_back: field(&map, "encoder_chunk_look_back"),
            decoder_chunk_look_back: field(&map, "decoder_chunk_look_back"),
            mode: field(&map, "mode"),
            is_file_upload: field(&map, "is_file_upload"),
            upload_complete: map
                .get("upload_complete")
                .is_some_and(|v| !matches!(v, Value::Bool(false) | Value::Null)),
        })
    }
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring control key {}={}: {}", key, value, e);
            None
        }
    }
}

/// `[5, 10, 5]` or `"5,10,5"`
fn parse_chunk_size(value: &Value) -> Option<[u32; 3]> {
    let parts: Option<Vec<u32>> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|n| u32::try_from(n).ok()))
            .collect(),
        Value::String(text) => text.split(',').map(|part| part.trim().parse().ok()).collect(),
        _ => None,
    };

    match parts.as_deref() {
        Some(&[a, b, c]) => Some([a, b, c]),
        _ => {
            warn!("Ignoring control key chunk_size={}", value);
            None
        }
    }
}

/// Hotwords are forwarded verbatim; structured values keep their JSON form
fn parse_hotwords(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
