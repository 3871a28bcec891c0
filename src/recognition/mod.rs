//! Recognition passes and their collaborators
//!
//! - `collaborators` - inference call contracts and the injected bundle
//! - `guard` - accelerator memory admission
//! - `coordinator` - online and offline passes for one session
//! - `emitter` - unsent-suffix tracking for partial text
//! - `merger` - folding sentences into speaker turns

pub mod collaborators;
pub mod coordinator;
pub mod emitter;
pub mod guard;
pub mod merger;

pub use collaborators::{
    AcceleratorMemory, GenerateOptions, MemoryInfo, NoAccelerator, Punctuator, Recognition,
    RecognitionCache, RecognitionCollaborators, SentenceFragment, SpeakerDiarizer, SpeechRecognizer,
    SpeechSegment, VadOptions, VoiceActivityDetector,
};
pub use coordinator::{OfflineOutcome, TwoPassCoordinator};
pub use emitter::IncrementalTextEmitter;
pub use guard::ResourceGuard;
pub use merger::{merge_stream_results, MergedTurn, ResultMerger};
