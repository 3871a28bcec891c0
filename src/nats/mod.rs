pub mod client;
pub mod collaborators;
pub mod messages;

pub use client::NatsClient;
pub use collaborators::{
    build_collaborators, NatsAccelerator, NatsPunctuator, NatsRecognizer, NatsSpeakerDiarizer, NatsVad,
};
pub use messages::{GenerateReply, GenerateRequest, VadReply, VadRequest};
