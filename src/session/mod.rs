//! Transcription session management
//!
//! This module provides the per-connection protocol:
//! - Control frame parsing and per-session settings
//! - Live audio: VAD segmentation, online partials, offline results
//! - File upload: periodic offline flushes and a merged final result
//! - Outbound message shapes and session statistics

mod config;
mod handler;
mod messages;
mod stats;

pub use config::{ControlEffects, ControlMessage, SessionConfig};
pub use handler::{InboundFrame, MessageSink, SessionProtocolHandler};
pub use messages::{Mode, OutboundMessage, OutboundMode};
pub use stats::{ConnectionInfo, SessionStats};
