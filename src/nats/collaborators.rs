//! Collaborator implementations backed by NATS request/reply.

use super::client::NatsClient;
use super::messages::{
    ClearReply, GenerateReply, GenerateRequest, MemoryReply, MemoryRequest, PunctuationReply,
    PunctuationRequest, SpeakerReply, SpeakerRequest, VadReply, VadRequest,
};
use crate::audio::file::TARGET_SAMPLE_RATE;
use crate::config::Config;
use crate::error::{AsrError, Result};
use crate::recognition::{
    AcceleratorMemory, GenerateOptions, MemoryInfo, Punctuator, Recognition, RecognitionCache,
    RecognitionCollaborators, SentenceFragment, SpeakerDiarizer, SpeechRecognizer, SpeechSegment,
    VadOptions, VoiceActivityDetector,
};
use base64::Engine;
use std::sync::Arc;
use tracing::info;

fn encode_pcm(audio: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(audio)
}

fn transport_error(collaborator: &str, error: anyhow::Error) -> AsrError {
    AsrError::collaborator(collaborator, format!("{:#}", error))
}

fn check_reply(collaborator: &str, error: Option<String>) -> Result<()> {
    match error {
        Some(message) => Err(AsrError::collaborator(collaborator, message)),
        None => Ok(()),
    }
}

/// Speech recognizer reached at `{prefix}.{service}.generate`
pub struct NatsRecognizer {
    client: NatsClient,
    name: String,
}

impl NatsRecognizer {
    /// `service` is `online`, `offline` or `file`
    pub fn new(client: NatsClient, service: &str) -> Self {
        Self {
            client,
            name: service.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for NatsRecognizer {
    async fn generate(
        &self,
        audio: &[u8],
        cache: &mut RecognitionCache,
        options: &GenerateOptions,
    ) -> Result<Recognition> {
        let request = GenerateRequest {
            pcm: encode_pcm(audio),
            sample_rate: TARGET_SAMPLE_RATE,
            cache: cache.state(),
            is_final: options.is_final,
            hotword: options.hotword.clone(),
            chunk_size: options.chunk_size,
            encoder_chunk_look_back: options.encoder_chunk_look_back,
            decoder_chunk_look_back: options.decoder_chunk_look_back,
            batch_size_s: options.batch_size_s,
        };

        let reply: GenerateReply = self
            .client
            .request(self.client.subject(&self.name, "generate"), &request)
            .await
            .map_err(|e| transport_error(&self.name, e))?;
        check_reply(&self.name, reply.error)?;

        cache.replace(reply.cache);

        Ok(Recognition {
            text: reply.text,
            sentence_info: reply.sentence_info,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct NatsVad {
    client: NatsClient,
}

impl NatsVad {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl VoiceActivityDetector for NatsVad {
    async fn detect(
        &self,
        audio: &[u8],
        cache: &mut RecognitionCache,
        options: &VadOptions,
    ) -> Result<Vec<SpeechSegment>> {
        let request = VadRequest {
            pcm: encode_pcm(audio),
            sample_rate: TARGET_SAMPLE_RATE,
            cache: cache.state(),
            chunk_size: options.chunk_size_ms,
            is_final: options.is_final,
        };

        let reply: VadReply = self
            .client
            .request(self.client.subject("vad", "generate"), &request)
            .await
            .map_err(|e| transport_error("vad", e))?;
        check_reply("vad", reply.error)?;

        cache.replace(reply.cache);

        Ok(reply
            .segments
            .into_iter()
            .map(|[start_ms, end_ms]| SpeechSegment { start_ms, end_ms })
            .collect())
    }
}

pub struct NatsPunctuator {
    client: NatsClient,
}

impl NatsPunctuator {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Punctuator for NatsPunctuator {
    async fn punctuate(&self, text: &str, cache: &mut RecognitionCache) -> Result<String> {
        let request = PunctuationRequest {
            text: text.to_string(),
            cache: cache.state(),
        };

        let reply: PunctuationReply = self
            .client
            .request(self.client.subject("punc", "generate"), &request)
            .await
            .map_err(|e| transport_error("punc", e))?;
        check_reply("punc", reply.error)?;

        cache.replace(reply.cache);
        Ok(reply.text)
    }
}

pub struct NatsSpeakerDiarizer {
    client: NatsClient,
}

impl NatsSpeakerDiarizer {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SpeakerDiarizer for NatsSpeakerDiarizer {
    async fn label(
        &self,
        audio: &[u8],
        sentences: Vec<SentenceFragment>,
    ) -> Result<Vec<SentenceFragment>> {
        let request = SpeakerRequest {
            pcm: encode_pcm(audio),
            sample_rate: TARGET_SAMPLE_RATE,
            sentences,
        };

        let reply: SpeakerReply = self
            .client
            .request(self.client.subject("spk", "generate"), &request)
            .await
            .map_err(|e| transport_error("spk", e))?;
        check_reply("spk", reply.error)?;

        Ok(reply.sentences)
    }
}

/// Memory probe of the inference host
pub struct NatsAccelerator {
    client: NatsClient,
}

impl NatsAccelerator {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AcceleratorMemory for NatsAccelerator {
    async fn snapshot(&self) -> Result<Option<MemoryInfo>> {
        let reply: MemoryReply = self
            .client
            .request(self.client.subject("accelerator", "memory"), &MemoryRequest::default())
            .await
            .map_err(|e| transport_error("accelerator", e))?;
        check_reply("accelerator", reply.error)?;

        Ok(reply.memory)
    }

    async fn clear_cache(&self) -> Result<()> {
        let reply: ClearReply = self
            .client
            .request(self.client.subject("accelerator", "clear"), &MemoryRequest::default())
            .await
            .map_err(|e| transport_error("accelerator", e))?;

        check_reply("accelerator", reply.error)
    }
}

/// Wire every configured collaborator to NATS
pub fn build_collaborators(client: &NatsClient, config: &Config) -> RecognitionCollaborators {
    let mut collaborators = RecognitionCollaborators::new(
        Arc::new(NatsRecognizer::new(client.clone(), "online")),
        Arc::new(NatsRecognizer::new(client.clone(), "offline")),
        Arc::new(NatsVad::new(client.clone())),
    )
    .with_accelerator(Arc::new(NatsAccelerator::new(client.clone())))
    .with_max_concurrent_inference(config.resources.max_concurrent_inference);

    if config.nats.punctuation {
        collaborators = collaborators.with_punctuation(Arc::new(NatsPunctuator::new(client.clone())));
    }
    if config.nats.speaker {
        collaborators = collaborators.with_speaker(Arc::new(NatsSpeakerDiarizer::new(client.clone())));
    }
    if config.nats.file_model {
        collaborators = collaborators.with_file_model(Arc::new(NatsRecognizer::new(client.clone(), "file")));
    }

    info!(
        "Collaborators ready (punctuation: {}, speaker: {}, file model: {})",
        config.nats.punctuation, config.nats.speaker, config.nats.file_model
    );

    collaborators
}
