use crate::recognition::{MemoryInfo, SentenceFragment};
use serde::{Deserialize, Serialize};

/// Recognizer request (online, offline, file)
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub pcm: String, // Base64-encoded 16 kHz 16-bit PCM
    pub sample_rate: u32,
    pub cache: serde_json::Value,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hotword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chunk_size: Option<[u32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encoder_chunk_look_back: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decoder_chunk_look_back: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub batch_size_s: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sentence_info: Vec<SentenceFragment>,
    /// Replaces the caller's cache
    #[serde(default)]
    pub cache: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VadRequest {
    pub pcm: String,
    pub sample_rate: u32,
    pub cache: serde_json::Value,
    pub chunk_size: u32, // milliseconds
    pub is_final: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VadReply {
    /// `[start_ms, end_ms]` pairs, `-1` where not observed
    #[serde(default)]
    pub segments: Vec<[i64; 2]>,
    #[serde(default)]
    pub cache: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PunctuationRequest {
    pub text: String,
    pub cache: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PunctuationReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub cache: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakerRequest {
    pub pcm: String,
    pub sample_rate: u32,
    pub sentences: Vec<SentenceFragment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakerReply {
    #[serde(default)]
    pub sentences: Vec<SentenceFragment>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryRequest {}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryReply {
    /// Absent when the service has no accelerator
    #[serde(default)]
    pub memory: Option<MemoryInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearReply {
    #[serde(default)]
    pub error: Option<String>,
}
