pub mod buffer;
pub mod file;
pub mod segment;

pub use buffer::{AudioBuffer, MB};
pub use file::AudioFile;
pub use segment::{Boundary, SegmentDetector, SegmentState, BYTES_PER_MS};
