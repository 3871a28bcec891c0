//! Per-connection protocol state machine.
//!
//! One handler per connection. Frames are handled one at a time to
//! completion, including every collaborator call they trigger, so the
//! session's caches are never touched by two calls at once.

use super::config::{ControlMessage, SessionConfig};
use super::messages::{Mode, OutboundMessage, OutboundMode};
use super::stats::SessionStats;
use crate::audio::{AudioBuffer, SegmentDetector, MB};
use crate::config::{Config, SessionSettings};
use crate::error::Result;
use crate::recognition::{
    merge_stream_results, OfflineOutcome, RecognitionCollaborators, ResourceGuard, ResultMerger,
    TwoPassCoordinator, VadOptions,
};
use tracing::{debug, error, info, warn};

/// A frame received from the client
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Where outbound messages go. A failed send means the peer is gone.
#[async_trait::async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: OutboundMessage) -> Result<()>;
}

#[async_trait::async_trait]
impl MessageSink for Vec<OutboundMessage> {
    async fn send(&mut self, message: OutboundMessage) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

pub struct SessionProtocolHandler {
    id: String,
    config: SessionConfig,
    settings: SessionSettings,
    buffer: AudioBuffer,
    detector: SegmentDetector,
    coordinator: TwoPassCoordinator,
    /// Online deltas of an upload session, merged at completion
    stream_results: Vec<String>,
    stats: SessionStats,
}

impl SessionProtocolHandler {
    pub fn new(id: impl Into<String>, collaborators: RecognitionCollaborators, app: &Config) -> Self {
        let id = id.into();
        let settings = app.session.clone();

        let guard = ResourceGuard::new(
            collaborators.accelerator.clone(),
            app.resources.safety_factor,
            app.resources.relaxed_factor,
        );
        let merger = ResultMerger::new(
            app.merge.continuity_threshold_ms,
            app.merge.speaker_label_prefix.clone(),
        );

        let detector = SegmentDetector::new(collaborators.clone(), settings.max_lookback_frames);
        let coordinator =
            TwoPassCoordinator::new(collaborators, guard, merger, settings.offline_split_mb * MB);

        info!("New session {}", id);

        Self {
            stats: SessionStats::new(id.clone()),
            id,
            config: SessionConfig::with_chunk_interval(settings.chunk_interval),
            buffer: AudioBuffer::with_capacity_mb(settings.buffer_capacity_mb),
            settings,
            detector,
            coordinator,
            stream_results: Vec::new(),
        }
    }

    /// Handle one inbound frame.
    ///
    /// Recognition failures are reported to the client as error messages;
    /// the only error returned here is a failed send.
    pub async fn handle_frame<S: MessageSink + ?Sized>(&mut self, frame: InboundFrame, sink: &mut S) -> Result<()> {
        match frame {
            InboundFrame::Text(text) => self.handle_control(&text, sink).await,
            InboundFrame::Binary(audio) => {
                self.stats.record_frame(audio.len());
                if self.config.is_file_upload {
                    self.handle_upload_audio(&audio, sink).await
                } else {
                    self.handle_live_audio(&audio, sink).await
                }
            }
        }
    }

    // ========================================================================
    // Control frames
    // ========================================================================

    async fn handle_control<S: MessageSink + ?Sized>(&mut self, text: &str, sink: &mut S) -> Result<()> {
        let control = match ControlMessage::parse(text) {
            Ok(control) => control,
            Err(e) => {
                warn!("Session {}: ignoring control frame: {}", self.id, e);
                return Ok(());
            }
        };

        let effects = self.config.apply(&control);
        debug!("Session {} config: {:?}", self.id, self.config);

        if effects.speaking_started {
            self.coordinator.reset_emitter();
        }

        if effects.speaking_stopped && !self.config.is_file_upload {
            self.close_segment(sink).await?;
        }

        if effects.upload_complete {
            self.complete_upload(sink).await?;
        }

        Ok(())
    }

    // ========================================================================
    // Live audio
    // ========================================================================

    async fn handle_live_audio<S: MessageSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<()> {
        self.buffer.append(chunk);
        self.relieve_if_pressured().await;

        let mode = self.config.mode;
        if mode.runs_online() {
            self.coordinator.queue_online(chunk);
        }

        let options = VadOptions {
            chunk_size_ms: self.config.vad_chunk_ms(),
            is_final: false,
        };
        let boundary = match self.detector.feed(chunk, &options).await {
            Ok(boundary) => boundary,
            Err(e) => {
                warn!("Session {}: VAD failed, treating as no boundary: {}", self.id, e);
                Default::default()
            }
        };
        // The detector holds the chunk from here on
        self.buffer.mark_consumed(chunk.len());

        if boundary.ended {
            self.close_segment(sink).await
        } else if mode.runs_online() && self.coordinator.online_due(self.config.chunk_interval) {
            self.run_online(false, sink).await
        } else {
            Ok(())
        }
    }

    /// End the current segment: final online pass, then the offline pass
    async fn close_segment<S: MessageSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let mode = self.config.mode;

        if mode.runs_online() && self.coordinator.has_pending_online() {
            self.run_online(true, sink).await?;
        }

        let audio = self.detector.take_segment();
        if mode.runs_offline() {
            self.run_offline(&audio, sink).await?;
        }

        self.coordinator.discard_pending_online();
        self.stats.segments_completed += 1;

        if self.config.is_speaking {
            self.detector.trim_history(self.settings.history_frames);
        } else {
            self.detector.reset_for_pause();
            self.coordinator.reset_online_cache();
            self.buffer.reset();
        }

        Ok(())
    }

    // ========================================================================
    // File upload
    // ========================================================================

    async fn handle_upload_audio<S: MessageSink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> Result<()> {
        self.buffer.append(chunk);
        self.relieve_if_pressured().await;

        if self.config.mode.runs_online() {
            self.coordinator.queue_online(chunk);
            if self.coordinator.online_due(self.config.chunk_interval) {
                self.run_online(false, sink).await?;
            }
        }

        if self.buffer.unconsumed_len() >= self.settings.upload_flush_mb * MB {
            let audio = self.drain_unconsumed();
            debug!("Session {}: flushing {} bytes of upload", self.id, audio.len());
            self.run_offline(&audio, sink).await?;
        }

        Ok(())
    }

    async fn complete_upload<S: MessageSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        if !self.config.is_file_upload {
            warn!("Session {}: upload_complete outside of a file upload, ignoring", self.id);
            return Ok(());
        }

        let remaining = self.drain_unconsumed();
        if !remaining.is_empty() {
            self.run_offline(&remaining, sink).await?;
        }
        self.coordinator.discard_pending_online();

        if let Some(text) = merge_stream_results(&self.stream_results) {
            info!("Session {}: upload complete ({} chars)", self.id, text.chars().count());
            let message = OutboundMessage::final_result(OutboundMode::UploadComplete, text, &self.config.wav_name);
            sink.send(message).await?;
        }

        self.buffer.reset();
        self.stream_results.clear();
        Ok(())
    }

    fn drain_unconsumed(&mut self) -> Vec<u8> {
        let audio = self.buffer.unconsumed().to_vec();
        self.buffer.mark_consumed(audio.len());
        audio
    }

    // ========================================================================
    // Passes
    // ========================================================================

    async fn run_online<S: MessageSink + ?Sized>(&mut self, is_final: bool, sink: &mut S) -> Result<()> {
        let mode = self.config.mode;
        let options = self.config.online_options(is_final);

        match self.coordinator.online_pass(&options, mode == Mode::TwoPass).await {
            Ok(Some(delta)) => {
                if self.config.is_file_upload {
                    self.stream_results.push(delta.clone());
                }
                let message = OutboundMessage::new(mode.online_label(), delta, &self.config.wav_name, false);
                sink.send(message).await
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!("Session {}: online recognition failed: {}", self.id, e);
                sink.send(OutboundMessage::error(e.to_string(), &self.config.wav_name)).await
            }
        }
    }

    async fn run_offline<S: MessageSink + ?Sized>(&mut self, audio: &[u8], sink: &mut S) -> Result<()> {
        let label = self.config.mode.offline_label();
        let hotword = self.config.hotwords.clone();

        match self.coordinator.offline_pass(audio, hotword.as_deref()).await {
            Ok(OfflineOutcome::EmptyAudio) => {
                debug!("Session {}: empty segment, sending empty result", self.id);
                sink.send(OutboundMessage::new(label, "", &self.config.wav_name, false)).await
            }
            Ok(OfflineOutcome::Recognized { text, turns }) => {
                if text.is_empty() {
                    debug!("Session {}: empty recognition result", self.id);
                    return Ok(());
                }
                let message = OutboundMessage::new(label, text, &self.config.wav_name, false).with_turns(turns);
                sink.send(message).await
            }
            Err(e) => {
                error!("Session {}: offline recognition failed: {}", self.id, e);
                sink.send(OutboundMessage::error(e.to_string(), &self.config.wav_name)).await
            }
        }
    }

    async fn relieve_if_pressured(&self) {
        if self.buffer.len() > self.settings.pressure_clear_mb * MB {
            self.coordinator.relieve_pressure().await;
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Connection closed: best-effort `stream-final` flush, then release
    /// everything. Teardown happens even when the flush fails.
    pub async fn finish<S: MessageSink + ?Sized>(mut self, sink: &mut S) -> SessionStats {
        if let Some(text) = merge_stream_results(&self.stream_results) {
            let message = OutboundMessage::final_result(OutboundMode::StreamFinal, text, &self.config.wav_name);
            if let Err(e) = sink.send(message).await {
                warn!("Session {}: failed to send final stream result: {}", self.id, e);
            }
        }

        let stats = self.snapshot();

        self.buffer.reset();
        self.coordinator.reset();
        self.detector.reset_for_pause();
        self.stream_results.clear();

        info!(
            "Session {} closed after {:.1}s ({} frames, {} segments)",
            self.id, stats.duration_secs, stats.frames_received, stats.segments_completed
        );

        stats
    }

    pub fn snapshot(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        stats.touch();
        stats.buffered_bytes = self.buffer.len();
        stats.mode = self.config.mode.to_string();
        stats.wav_name = self.config.wav_name.clone();
        stats
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn stream_results(&self) -> &[String] {
        &self.stream_results
    }

    pub fn online_cache_is_empty(&self) -> bool {
        self.coordinator.online_cache().is_empty()
    }

    pub fn vad_cache_is_empty(&self) -> bool {
        self.detector.vad_cache().is_empty()
    }
}
