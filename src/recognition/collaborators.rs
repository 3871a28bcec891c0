use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

// ============================================================================
// Recognition state and results
// ============================================================================

/// Opaque recognition state threaded through every call to a collaborator.
///
/// The session owns one per collaborator and passes it back by reference on
/// each call; the contents are never inspected here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecognitionCache(Option<serde_json::Value>);

impl RecognitionCache {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// State to hand to the collaborator (an empty object when fresh)
    pub fn state(&self) -> serde_json::Value {
        self.0
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }

    /// Replace the state with what the collaborator returned; `null` resets
    pub fn replace(&mut self, state: serde_json::Value) {
        self.0 = match state {
            serde_json::Value::Null => None,
            state => Some(state),
        };
    }
}

/// Voice activity boundary pair; `-1` means "not observed in this call"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl SpeechSegment {
    pub const fn none() -> Self {
        Self {
            start_ms: -1,
            end_ms: -1,
        }
    }

    pub fn has_start(&self) -> bool {
        self.start_ms != -1
    }

    pub fn has_end(&self) -> bool {
        self.end_ms != -1
    }
}

/// A sentence produced by an offline or file pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceFragment {
    #[serde(rename = "start", default)]
    pub start_ms: i64,
    #[serde(rename = "end", default)]
    pub end_ms: i64,
    #[serde(rename = "spk", default)]
    pub speaker_id: u32,
    #[serde(default)]
    pub text: String,
}

/// Output of a speech recognizer call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    #[serde(default)]
    pub sentence_info: Vec<SentenceFragment>,
}

impl Recognition {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sentence_info: Vec::new(),
        }
    }
}

/// Per-call options for a speech recognizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub is_final: bool,
    pub hotword: Option<String>,
    pub chunk_size: Option<[u32; 3]>,
    pub encoder_chunk_look_back: Option<u32>,
    pub decoder_chunk_look_back: Option<u32>,
    pub batch_size_s: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VadOptions {
    pub chunk_size_ms: u32,
    pub is_final: bool,
}

/// Accelerator memory snapshot in bytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub allocated_bytes: u64,
    pub cached_bytes: u64,
}

impl MemoryInfo {
    /// Memory not reserved by the accelerator's caching allocator
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.cached_bytes)
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Speech recognizer (online, offline, or one-shot file model)
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize 16 kHz 16-bit PCM audio
    ///
    /// An empty `text` in the result means "nothing recognized", not an error.
    async fn generate(
        &self,
        audio: &[u8],
        cache: &mut RecognitionCache,
        options: &GenerateOptions,
    ) -> Result<Recognition>;

    /// Name for logging
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait VoiceActivityDetector: Send + Sync {
    /// Returns every boundary pair reported for this chunk
    async fn detect(
        &self,
        audio: &[u8],
        cache: &mut RecognitionCache,
        options: &VadOptions,
    ) -> Result<Vec<SpeechSegment>>;
}

#[async_trait::async_trait]
pub trait Punctuator: Send + Sync {
    async fn punctuate(&self, text: &str, cache: &mut RecognitionCache) -> Result<String>;
}

#[async_trait::async_trait]
pub trait SpeakerDiarizer: Send + Sync {
    /// Assign speaker ids to the sentences of a recognized segment
    async fn label(
        &self,
        audio: &[u8],
        sentences: Vec<SentenceFragment>,
    ) -> Result<Vec<SentenceFragment>>;
}

/// Accelerator memory probe
#[async_trait::async_trait]
pub trait AcceleratorMemory: Send + Sync {
    /// `None` when there is no accelerator to report on
    async fn snapshot(&self) -> Result<Option<MemoryInfo>>;

    /// Release cached allocations (idempotent)
    async fn clear_cache(&self) -> Result<()>;
}

/// Memory probe for hosts without an accelerator
pub struct NoAccelerator;

#[async_trait::async_trait]
impl AcceleratorMemory for NoAccelerator {
    async fn snapshot(&self) -> Result<Option<MemoryInfo>> {
        Ok(None)
    }

    async fn clear_cache(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Injected collaborator bundle
// ============================================================================

/// Every inference collaborator the sessions and the upload API call through.
///
/// Constructed once at startup and cloned into each session; clones share
/// the same handles and the same inference semaphore.
#[derive(Clone)]
pub struct RecognitionCollaborators {
    pub online: Arc<dyn SpeechRecognizer>,
    pub offline: Arc<dyn SpeechRecognizer>,
    pub vad: Arc<dyn VoiceActivityDetector>,
    pub punctuation: Option<Arc<dyn Punctuator>>,
    pub speaker: Option<Arc<dyn SpeakerDiarizer>>,
    pub file: Option<Arc<dyn SpeechRecognizer>>,
    pub accelerator: Arc<dyn AcceleratorMemory>,
    inference: Arc<Semaphore>,
}

impl RecognitionCollaborators {
    pub fn new(
        online: Arc<dyn SpeechRecognizer>,
        offline: Arc<dyn SpeechRecognizer>,
        vad: Arc<dyn VoiceActivityDetector>,
    ) -> Self {
        Self {
            online,
            offline,
            vad,
            punctuation: None,
            speaker: None,
            file: None,
            accelerator: Arc::new(NoAccelerator),
            inference: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn with_punctuation(mut self, punctuation: Arc<dyn Punctuator>) -> Self {
        self.punctuation = Some(punctuation);
        self
    }

    pub fn with_speaker(mut self, speaker: Arc<dyn SpeakerDiarizer>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_file_model(mut self, file: Arc<dyn SpeechRecognizer>) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_accelerator(mut self, accelerator: Arc<dyn AcceleratorMemory>) -> Self {
        self.accelerator = accelerator;
        self
    }

    /// Number of collaborator calls allowed in flight process-wide
    pub fn with_max_concurrent_inference(mut self, permits: usize) -> Self {
        self.inference = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    /// Wait for a slot on the accelerator
    pub async fn inference_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.inference.acquire().await.ok()
    }
}
