use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the connection was accepted
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Binary frames received
    pub frames_received: usize,

    pub bytes_received: usize,

    /// Speech segments closed (each one triggered an offline pass)
    pub segments_completed: usize,

    /// Audio still held in the buffer at the time of the snapshot
    pub buffered_bytes: usize,

    pub mode: String,
    pub wav_name: String,
}

impl SessionStats {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            duration_secs: 0.0,
            frames_received: 0,
            bytes_received: 0,
            segments_completed: 0,
            buffered_bytes: 0,
            mode: String::new(),
            wav_name: String::new(),
        }
    }

    pub fn record_frame(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes;
    }

    /// Refresh the duration from the start time
    pub fn touch(&mut self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_secs = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    }
}

/// Registry entry for a live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
    pub peer: Option<String>,
}

impl ConnectionInfo {
    pub fn new(session_id: impl Into<String>, peer: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            connected_at: Utc::now(),
            peer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_frame_accumulates() {
        let mut stats = SessionStats::new("session-1");
        stats.record_frame(1920);
        stats.record_frame(80);

        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 2000);
    }

    #[test]
    fn test_touch_never_goes_negative() {
        let mut stats = SessionStats::new("session-1");
        stats.touch();
        assert!(stats.duration_secs >= 0.0);
    }
}
