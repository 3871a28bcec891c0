// Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use loqa_asr::error::{AsrError, Result};
use loqa_asr::recognition::{
    AcceleratorMemory, GenerateOptions, MemoryInfo, Punctuator, Recognition, RecognitionCache,
    RecognitionCollaborators, SentenceFragment, SpeakerDiarizer, SpeechRecognizer, SpeechSegment,
    VadOptions, VoiceActivityDetector,
};
use loqa_asr::session::{MessageSink, OutboundMessage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 60 ms of 16 kHz 16-bit PCM
pub const FRAME_BYTES: usize = 1920;

pub fn frame() -> Vec<u8> {
    vec![1u8; FRAME_BYTES]
}

#[derive(Debug, Clone)]
pub struct RecognizerCall {
    pub audio_len: usize,
    pub cache_was_empty: bool,
    pub is_final: bool,
    pub hotword: Option<String>,
}

/// Replies from a script, then falls back to a fixed text
pub struct ScriptedRecognizer {
    name: String,
    replies: Mutex<VecDeque<Result<Recognition>>>,
    fallback: Recognition,
    calls: Mutex<Vec<RecognizerCall>>,
}

impl ScriptedRecognizer {
    pub fn new(name: &str, fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            fallback: Recognition::text(fallback),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn with_texts(name: &str, texts: &[&str]) -> Arc<Self> {
        let recognizer = Self::new(name, "");
        for text in texts {
            recognizer.push(Ok(Recognition::text(*text)));
        }
        recognizer
    }

    pub fn push(&self, reply: Result<Recognition>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecognizerCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn generate(
        &self,
        audio: &[u8],
        cache: &mut RecognitionCache,
        options: &GenerateOptions,
    ) -> Result<Recognition> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecognizerCall {
                audio_len: audio.len(),
                cache_was_empty: cache.is_empty(),
                is_final: options.is_final,
                hotword: options.hotword.clone(),
            });
            calls.len()
        };
        cache.replace(serde_json::json!({ "calls": count }));

        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One scripted reply per call, then "no speech"
#[derive(Default)]
pub struct ScriptedVad {
    replies: Mutex<VecDeque<Result<Vec<SpeechSegment>>>>,
    calls: AtomicUsize,
}

impl ScriptedVad {
    pub fn new(replies: Vec<Vec<SpeechSegment>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn push_error(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(AsrError::collaborator("vad", "scripted failure")));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VoiceActivityDetector for ScriptedVad {
    async fn detect(
        &self,
        _audio: &[u8],
        cache: &mut RecognitionCache,
        _options: &VadOptions,
    ) -> Result<Vec<SpeechSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cache.replace(serde_json::json!({ "vad": true }));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn start(ms: i64) -> Vec<SpeechSegment> {
    vec![SpeechSegment { start_ms: ms, end_ms: -1 }]
}

pub fn end(ms: i64) -> Vec<SpeechSegment> {
    vec![SpeechSegment { start_ms: -1, end_ms: ms }]
}

pub fn silence() -> Vec<SpeechSegment> {
    Vec::new()
}

/// Appends a full stop
pub struct FullStop;

#[async_trait::async_trait]
impl Punctuator for FullStop {
    async fn punctuate(&self, text: &str, cache: &mut RecognitionCache) -> Result<String> {
        cache.replace(serde_json::json!({ "punc": true }));
        Ok(format!("{}.", text))
    }
}

/// Alternates speakers by sentence index
pub struct AlternatingSpeakers;

#[async_trait::async_trait]
impl SpeakerDiarizer for AlternatingSpeakers {
    async fn label(
        &self,
        _audio: &[u8],
        sentences: Vec<SentenceFragment>,
    ) -> Result<Vec<SentenceFragment>> {
        Ok(sentences
            .into_iter()
            .enumerate()
            .map(|(i, mut sentence)| {
                sentence.speaker_id = (i % 2) as u32;
                sentence
            })
            .collect())
    }
}

/// Reports `before` until the cache is cleared, then `after`
pub struct FakeAccelerator {
    before: MemoryInfo,
    after: MemoryInfo,
    clears: AtomicUsize,
}

impl FakeAccelerator {
    pub fn new(before: MemoryInfo, after: MemoryInfo) -> Arc<Self> {
        Arc::new(Self {
            before,
            after,
            clears: AtomicUsize::new(0),
        })
    }

    /// Never enough memory for anything
    pub fn exhausted() -> Arc<Self> {
        let full = gib(1.0, 1.0);
        Self::new(full, full)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AcceleratorMemory for FakeAccelerator {
    async fn snapshot(&self) -> Result<Option<MemoryInfo>> {
        if self.clears() == 0 {
            Ok(Some(self.before))
        } else {
            Ok(Some(self.after))
        }
    }

    async fn clear_cache(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Memory snapshot in GiB: `total` with `cached` reserved
pub fn gib(total: f64, cached: f64) -> MemoryInfo {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    MemoryInfo {
        total_bytes: (total * GIB) as u64,
        allocated_bytes: 0,
        cached_bytes: (cached * GIB) as u64,
    }
}

pub struct Fakes {
    pub online: Arc<ScriptedRecognizer>,
    pub offline: Arc<ScriptedRecognizer>,
    pub vad: Arc<ScriptedVad>,
}

impl Fakes {
    pub fn new(online: Arc<ScriptedRecognizer>, offline: Arc<ScriptedRecognizer>, vad: Arc<ScriptedVad>) -> Self {
        Self { online, offline, vad }
    }

    pub fn collaborators(&self) -> RecognitionCollaborators {
        RecognitionCollaborators::new(self.online.clone(), self.offline.clone(), self.vad.clone())
    }
}

/// A sink whose peer has already gone away
pub struct ClosedSink;

#[async_trait::async_trait]
impl MessageSink for ClosedSink {
    async fn send(&mut self, _message: OutboundMessage) -> Result<()> {
        Err(AsrError::ConnectionLost("peer closed".to_string()))
    }
}
