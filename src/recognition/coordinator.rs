//! Online and offline recognition passes for one session.
//!
//! The coordinator owns the per-session recognition caches and the text
//! emitter. All calls for a session go through `&mut self`, so a session
//! never has two passes in flight.

use super::collaborators::{GenerateOptions, RecognitionCache, RecognitionCollaborators, SentenceFragment};
use super::emitter::IncrementalTextEmitter;
use super::guard::ResourceGuard;
use super::merger::{MergedTurn, ResultMerger};
use crate::error::{AsrError, Result};
use tracing::{debug, info, warn};

/// Result of one offline pass
#[derive(Debug, Clone, PartialEq)]
pub enum OfflineOutcome {
    /// No audio was collected; the client still gets an empty result
    EmptyAudio,
    Recognized {
        text: String,
        turns: Option<Vec<MergedTurn>>,
    },
}

pub struct TwoPassCoordinator {
    collaborators: RecognitionCollaborators,
    guard: ResourceGuard,
    merger: ResultMerger,
    online_cache: RecognitionCache,
    punc_cache: RecognitionCache,
    emitter: IncrementalTextEmitter,
    pending_online: Vec<Vec<u8>>,
    offline_split_bytes: usize,
}

impl TwoPassCoordinator {
    pub fn new(
        collaborators: RecognitionCollaborators,
        guard: ResourceGuard,
        merger: ResultMerger,
        offline_split_bytes: usize,
    ) -> Self {
        Self {
            collaborators,
            guard,
            merger,
            online_cache: RecognitionCache::new(),
            punc_cache: RecognitionCache::new(),
            emitter: IncrementalTextEmitter::new(),
            pending_online: Vec::new(),
            // Keep the split sample-aligned
            offline_split_bytes: (offline_split_bytes.max(2) / 2) * 2,
        }
    }

    // ========================================================================
    // Online pass
    // ========================================================================

    pub fn queue_online(&mut self, chunk: &[u8]) {
        self.pending_online.push(chunk.to_vec());
    }

    /// True once `chunk_interval` chunks are waiting
    pub fn online_due(&self, chunk_interval: u32) -> bool {
        !self.pending_online.is_empty() && self.pending_online.len() >= chunk_interval.max(1) as usize
    }

    pub fn has_pending_online(&self) -> bool {
        !self.pending_online.is_empty()
    }

    /// Run the online recognizer over the queued chunks.
    ///
    /// Returns the unsent delta, if any. When `final_superseded` is set and
    /// this is the final call for a segment, the recognizer still runs (to
    /// flush its cache) but nothing is emitted because the offline result
    /// replaces it.
    pub async fn online_pass(
        &mut self,
        options: &GenerateOptions,
        final_superseded: bool,
    ) -> Result<Option<String>> {
        let audio = std::mem::take(&mut self.pending_online).concat();
        if audio.is_empty() {
            return Ok(None);
        }

        let recognition = {
            let _permit = self.collaborators.inference_permit().await;
            self.collaborators
                .online
                .generate(&audio, &mut self.online_cache, options)
                .await?
        };

        if options.is_final && final_superseded {
            debug!("Final online result superseded by offline pass");
            return Ok(None);
        }

        if recognition.text.is_empty() {
            return Ok(None);
        }

        Ok(self.emitter.advance(&recognition.text))
    }

    pub fn discard_pending_online(&mut self) {
        self.pending_online.clear();
    }

    pub fn reset_online_cache(&mut self) {
        self.online_cache.clear();
    }

    pub fn reset_emitter(&mut self) {
        self.emitter.reset();
    }

    // ========================================================================
    // Offline pass
    // ========================================================================

    /// Recognize a completed segment (or upload flush).
    ///
    /// Refused by the resource guard → `ResourceExhausted`, and the audio is
    /// dropped. Every recognizer call starts from an empty cache. Above the
    /// split size each chunk is recognized on its own and a failing chunk is
    /// skipped; if every chunk fails the last error is returned.
    pub async fn offline_pass(&mut self, audio: &[u8], hotword: Option<&str>) -> Result<OfflineOutcome> {
        if audio.is_empty() {
            return Ok(OfflineOutcome::EmptyAudio);
        }

        if !self.guard.admit(audio.len() as u64).await {
            return Err(AsrError::ResourceExhausted { bytes: audio.len() });
        }

        let options = GenerateOptions {
            is_final: true,
            hotword: hotword.map(str::to_string),
            ..Default::default()
        };

        let result = if audio.len() > self.offline_split_bytes {
            self.recognize_split(audio, &options).await
        } else {
            self.recognize_whole(audio, &options).await
        };
        self.guard.relieve().await;
        let (mut text, sentences) = result?;

        if !text.is_empty() {
            if let Some(punctuation) = self.collaborators.punctuation.clone() {
                let _permit = self.collaborators.inference_permit().await;
                text = punctuation.punctuate(&text, &mut self.punc_cache).await?;
            }
        }

        let turns = match sentences {
            Some(sentences) if !sentences.is_empty() => {
                let sentences = self.label_speakers(audio, sentences).await?;
                Some(self.merger.merge(&sentences))
            }
            _ => None,
        };

        Ok(OfflineOutcome::Recognized { text, turns })
    }

    async fn recognize_whole(
        &self,
        audio: &[u8],
        options: &GenerateOptions,
    ) -> Result<(String, Option<Vec<SentenceFragment>>)> {
        let _permit = self.collaborators.inference_permit().await;
        let recognition = self
            .collaborators
            .offline
            .generate(audio, &mut RecognitionCache::new(), options)
            .await?;

        Ok((recognition.text, Some(recognition.sentence_info)))
    }

    async fn recognize_split(
        &self,
        audio: &[u8],
        options: &GenerateOptions,
    ) -> Result<(String, Option<Vec<SentenceFragment>>)> {
        let chunks: Vec<&[u8]> = audio.chunks(self.offline_split_bytes).collect();
        info!(
            "Splitting {} bytes of audio into {} chunks for offline recognition",
            audio.len(),
            chunks.len()
        );

        let mut texts = Vec::new();
        let mut last_error = None;
        for (i, chunk) in chunks.iter().enumerate() {
            self.guard.relieve().await;

            let _permit = self.collaborators.inference_permit().await;
            match self
                .collaborators
                .offline
                .generate(chunk, &mut RecognitionCache::new(), options)
                .await
            {
                Ok(recognition) if !recognition.text.is_empty() => texts.push(recognition.text),
                Ok(_) => {}
                Err(e) => {
                    warn!("Offline chunk {}/{} failed, skipping: {}", i + 1, chunks.len(), e);
                    last_error = Some(e);
                }
            }
        }

        // Nothing recognized and at least one chunk failed
        if texts.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        // Chunk-local sentence timings do not line up, so no turns
        Ok((texts.join(" "), None))
    }

    async fn label_speakers(
        &self,
        audio: &[u8],
        sentences: Vec<SentenceFragment>,
    ) -> Result<Vec<SentenceFragment>> {
        match &self.collaborators.speaker {
            Some(speaker) => {
                let _permit = self.collaborators.inference_permit().await;
                speaker.label(audio, sentences).await
            }
            None => Ok(sentences),
        }
    }

    /// Relieve accelerator pressure without running a pass
    pub async fn relieve_pressure(&self) {
        self.guard.relieve().await;
    }

    /// Drop every cache and all queued audio
    pub fn reset(&mut self) {
        self.online_cache.clear();
        self.punc_cache.clear();
        self.emitter.reset();
        self.pending_online.clear();
    }

    pub fn online_cache(&self) -> &RecognitionCache {
        &self.online_cache
    }

    pub fn punc_cache(&self) -> &RecognitionCache {
        &self.punc_cache
    }
}
