//! Speech segment boundary tracking.
//!
//! Every incoming chunk goes to the voice activity detector. A reported
//! start opens a segment and splices the look-back chunks that preceded it
//! from the history; a reported end closes it. The caller decides what to
//! do with the closed segment (normally an offline pass).

use crate::error::Result;
use crate::recognition::{RecognitionCache, RecognitionCollaborators, SpeechSegment, VadOptions};
use std::collections::VecDeque;
use tracing::debug;

/// 16 kHz, 16-bit mono
pub const BYTES_PER_MS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Idle,
    Active,
}

/// What one VAD call decided for one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boundary {
    pub started: bool,
    pub ended: bool,
}

pub struct SegmentDetector {
    collaborators: RecognitionCollaborators,
    vad_cache: RecognitionCache,
    history: VecDeque<Vec<u8>>,
    segment: Vec<Vec<u8>>,
    state: SegmentState,
    processed_ms: u64,
    max_lookback_frames: usize,
}

impl SegmentDetector {
    pub fn new(collaborators: RecognitionCollaborators, max_lookback_frames: usize) -> Self {
        Self {
            collaborators,
            vad_cache: RecognitionCache::new(),
            history: VecDeque::new(),
            segment: Vec::new(),
            state: SegmentState::Idle,
            processed_ms: 0,
            max_lookback_frames: max_lookback_frames.max(1),
        }
    }

    /// Record a chunk and ask the VAD about it.
    ///
    /// The chunk is kept in the history and, while a segment is open, in
    /// the segment. A VAD error leaves the detector as it was after
    /// recording the chunk; the caller treats it as "no boundary".
    pub async fn feed(&mut self, chunk: &[u8], options: &VadOptions) -> Result<Boundary> {
        let chunk_ms = (chunk.len() / BYTES_PER_MS) as u64;
        self.processed_ms += chunk_ms;

        self.history.push_back(chunk.to_vec());
        while self.history.len() > self.max_lookback_frames {
            self.history.pop_front();
        }

        if self.state == SegmentState::Active {
            self.segment.push(chunk.to_vec());
        }

        let segments = {
            let _permit = self.collaborators.inference_permit().await;
            self.collaborators
                .vad
                .detect(chunk, &mut self.vad_cache, options)
                .await?
        };

        let Some(decisive) = Self::decisive(&segments) else {
            return Ok(Boundary::default());
        };

        let mut boundary = Boundary::default();

        if decisive.has_start() {
            self.open_segment(decisive.start_ms, chunk_ms);
            boundary.started = true;
        }

        if decisive.has_end() {
            boundary.ended = true;
        }

        Ok(boundary)
    }

    /// Exactly one reported pair is decisive; none or several is ambiguous
    fn decisive(segments: &[SpeechSegment]) -> Option<SpeechSegment> {
        match segments {
            [single] => Some(*single),
            [] => None,
            _ => {
                debug!("VAD reported {} segments for one chunk, ignoring", segments.len());
                None
            }
        }
    }

    fn open_segment(&mut self, start_ms: i64, chunk_ms: u64) {
        let behind_ms = (self.processed_ms as i64 - start_ms).max(0) as u64;
        let frames_back = behind_ms.div_ceil(chunk_ms.max(1)) as usize;
        let frames_back = frames_back.clamp(1, self.history.len().max(1));

        let skip = self.history.len().saturating_sub(frames_back);
        self.segment = self.history.iter().skip(skip).cloned().collect();
        self.state = SegmentState::Active;

        debug!(
            "Speech start at {}ms ({}ms processed), spliced {} look-back chunks",
            start_ms, self.processed_ms, frames_back
        );
    }

    /// Close the current segment and hand back its audio
    pub fn take_segment(&mut self) -> Vec<u8> {
        self.state = SegmentState::Idle;
        std::mem::take(&mut self.segment).concat()
    }

    /// Keep only the newest `frames` chunks of history
    pub fn trim_history(&mut self, frames: usize) {
        while self.history.len() > frames {
            self.history.pop_front();
        }
    }

    /// Full stop: forget the timeline and the VAD state
    pub fn reset_for_pause(&mut self) {
        self.processed_ms = 0;
        self.history.clear();
        self.segment.clear();
        self.state = SegmentState::Idle;
        self.vad_cache.clear();
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn processed_ms(&self) -> u64 {
        self.processed_ms
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn segment_len(&self) -> usize {
        self.segment.iter().map(Vec::len).sum()
    }

    pub fn vad_cache(&self) -> &RecognitionCache {
        &self.vad_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AsrError;
    use crate::recognition::{
        GenerateOptions, Recognition, SpeechRecognizer, VoiceActivityDetector,
    };
    use std::sync::{Arc, Mutex};

    struct Silent;

    #[async_trait::async_trait]
    impl SpeechRecognizer for Silent {
        async fn generate(
            &self,
            _audio: &[u8],
            _cache: &mut RecognitionCache,
            _options: &GenerateOptions,
        ) -> Result<Recognition> {
            Ok(Recognition::default())
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    /// Pops one scripted reply per call, then reports nothing
    struct ScriptedVad(Mutex<VecDeque<Result<Vec<SpeechSegment>>>>);

    #[async_trait::async_trait]
    impl VoiceActivityDetector for ScriptedVad {
        async fn detect(
            &self,
            _audio: &[u8],
            cache: &mut RecognitionCache,
            _options: &VadOptions,
        ) -> Result<Vec<SpeechSegment>> {
            cache.replace(serde_json::json!({"seen": true}));
            self.0.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn detector(script: Vec<Result<Vec<SpeechSegment>>>) -> SegmentDetector {
        let collaborators = RecognitionCollaborators::new(
            Arc::new(Silent),
            Arc::new(Silent),
            Arc::new(ScriptedVad(Mutex::new(script.into()))),
        );
        SegmentDetector::new(collaborators, 100)
    }

    fn seg(start_ms: i64, end_ms: i64) -> SpeechSegment {
        SpeechSegment { start_ms, end_ms }
    }

    // 60ms chunks: 1920 bytes, each filled with its index
    fn chunk(index: u8) -> Vec<u8> {
        vec![index; 60 * BYTES_PER_MS]
    }

    #[tokio::test]
    async fn test_no_report_keeps_idle() {
        let mut detector = detector(vec![Ok(vec![])]);
        let boundary = detector.feed(&chunk(0), &VadOptions::default()).await.unwrap();

        assert_eq!(boundary, Boundary::default());
        assert_eq!(detector.state(), SegmentState::Idle);
        assert_eq!(detector.processed_ms(), 60);
    }

    #[tokio::test]
    async fn test_multiple_segments_are_not_decisive() {
        let mut detector = detector(vec![Ok(vec![seg(0, -1), seg(30, -1)])]);
        let boundary = detector.feed(&chunk(0), &VadOptions::default()).await.unwrap();

        assert!(!boundary.started);
        assert_eq!(detector.state(), SegmentState::Idle);
    }

    #[tokio::test]
    async fn test_start_splices_look_back_chunks() {
        // Start reported at 100ms while processing the 4th chunk (240ms):
        // ceil(140 / 60) = 3 chunks go to the front of the segment
        let mut detector = detector(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![seg(100, -1)]),
        ]);
        for i in 0..4 {
            detector.feed(&chunk(i), &VadOptions::default()).await.unwrap();
        }

        assert_eq!(detector.state(), SegmentState::Active);
        let audio = detector.take_segment();
        assert_eq!(audio.len(), 3 * chunk(0).len());
        assert_eq!(audio[0], 1);
        assert_eq!(*audio.last().unwrap(), 3);
        assert_eq!(detector.state(), SegmentState::Idle);
    }

    #[tokio::test]
    async fn test_look_back_is_clamped_to_history() {
        let mut detector = detector(vec![Ok(vec![]), Ok(vec![seg(-5000, -1)])]);
        detector.feed(&chunk(0), &VadOptions::default()).await.unwrap();
        // Start far in the past: start_ms -5000 is not the sentinel
        detector.feed(&chunk(1), &VadOptions::default()).await.unwrap();

        assert_eq!(detector.take_segment().len(), 2 * chunk(0).len());
    }

    #[tokio::test]
    async fn test_look_back_includes_at_least_current_chunk() {
        let mut detector = detector(vec![Ok(vec![seg(60, -1)])]);
        detector.feed(&chunk(7), &VadOptions::default()).await.unwrap();

        assert_eq!(detector.take_segment(), chunk(7));
    }

    #[tokio::test]
    async fn test_active_segment_collects_following_chunks_until_end() {
        let mut detector = detector(vec![Ok(vec![seg(0, -1)]), Ok(vec![]), Ok(vec![seg(-1, 170)])]);
        detector.feed(&chunk(0), &VadOptions::default()).await.unwrap();
        detector.feed(&chunk(1), &VadOptions::default()).await.unwrap();
        let boundary = detector.feed(&chunk(2), &VadOptions::default()).await.unwrap();

        assert!(boundary.ended);
        assert_eq!(detector.take_segment().len(), 3 * chunk(0).len());
    }

    #[tokio::test]
    async fn test_vad_error_propagates_without_state_change() {
        let mut detector = detector(vec![Err(AsrError::collaborator("vad", "boom"))]);
        let result = detector.feed(&chunk(0), &VadOptions::default()).await;

        assert!(result.is_err());
        assert_eq!(detector.state(), SegmentState::Idle);
        assert_eq!(detector.history_len(), 1);
    }

    #[tokio::test]
    async fn test_reset_for_pause_clears_timeline_and_cache() {
        let mut detector = detector(vec![Ok(vec![seg(0, -1)])]);
        detector.feed(&chunk(0), &VadOptions::default()).await.unwrap();
        assert!(!detector.vad_cache().is_empty());

        detector.reset_for_pause();

        assert_eq!(detector.processed_ms(), 0);
        assert_eq!(detector.history_len(), 0);
        assert_eq!(detector.segment_len(), 0);
        assert!(detector.vad_cache().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped_and_trimmed() {
        let collaborators = RecognitionCollaborators::new(
            Arc::new(Silent),
            Arc::new(Silent),
            Arc::new(ScriptedVad(Mutex::new(VecDeque::new()))),
        );
        let mut detector = SegmentDetector::new(collaborators, 5);
        for i in 0..10 {
            detector.feed(&chunk(i), &VadOptions::default()).await.unwrap();
        }
        assert_eq!(detector.history_len(), 5);

        detector.trim_history(2);
        assert_eq!(detector.history_len(), 2);
    }
}
