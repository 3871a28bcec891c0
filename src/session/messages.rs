use crate::recognition::MergedTurn;
use serde::{Deserialize, Serialize};

/// Which recognition passes a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "2pass")]
    TwoPass,
}

impl Mode {
    pub fn runs_online(self) -> bool {
        matches!(self, Mode::Online | Mode::TwoPass)
    }

    pub fn runs_offline(self) -> bool {
        matches!(self, Mode::Offline | Mode::TwoPass)
    }

    pub fn online_label(self) -> OutboundMode {
        match self {
            Mode::TwoPass => OutboundMode::TwoPassOnline,
            _ => OutboundMode::Online,
        }
    }

    pub fn offline_label(self) -> OutboundMode {
        match self {
            Mode::TwoPass => OutboundMode::TwoPassOffline,
            _ => OutboundMode::Offline,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Mode::Online => "online",
            Mode::Offline => "offline",
            Mode::TwoPass => "2pass",
        };
        f.write_str(label)
    }
}

/// `mode` field of a server-to-client message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundMode {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "2pass-online")]
    TwoPassOnline,
    #[serde(rename = "2pass-offline")]
    TwoPassOffline,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "final")]
    Final,
    #[serde(rename = "upload-complete")]
    UploadComplete,
    #[serde(rename = "stream-final")]
    StreamFinal,
}

/// Server-to-client JSON message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub mode: OutboundMode,
    pub text: String,
    pub wav_name: String,
    pub is_final: bool,

    /// Unix seconds; only on upload-complete and stream-final
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<f64>,

    /// Speaker turns of an offline result, when sentence timings exist
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub turns: Option<Vec<MergedTurn>>,
}

impl OutboundMessage {
    pub fn new(mode: OutboundMode, text: impl Into<String>, wav_name: &str, is_final: bool) -> Self {
        Self {
            mode,
            text: text.into(),
            wav_name: wav_name.to_string(),
            is_final,
            timestamp: None,
            turns: None,
        }
    }

    pub fn error(text: impl Into<String>, wav_name: &str) -> Self {
        Self::new(OutboundMode::Error, text, wav_name, true)
    }

    /// A consolidated result stamped with the current time
    pub fn final_result(mode: OutboundMode, text: impl Into<String>, wav_name: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: Some(now.timestamp_millis() as f64 / 1000.0),
            ..Self::new(mode, text, wav_name, true)
        }
    }

    pub fn with_turns(mut self, turns: Option<Vec<MergedTurn>>) -> Self {
        self.turns = turns;
        self
    }
}
