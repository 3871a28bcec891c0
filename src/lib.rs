pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod recognition;
pub mod session;

pub use audio::{AudioBuffer, AudioFile, SegmentDetector};
pub use config::Config;
pub use error::{AsrError, Result};
pub use http::{create_api_router, create_ws_router, AppState};
pub use nats::{build_collaborators, NatsClient};
pub use recognition::{
    IncrementalTextEmitter, MergedTurn, RecognitionCollaborators, ResourceGuard, ResultMerger,
    TwoPassCoordinator,
};
pub use session::{
    ControlMessage, InboundFrame, MessageSink, Mode, OutboundMessage, OutboundMode, SessionConfig,
    SessionProtocolHandler, SessionStats,
};
