//! Folding of per-sentence results into speaker turns.

use super::collaborators::SentenceFragment;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTINUITY_THRESHOLD_MS: i64 = 1000;
pub const DEFAULT_SPEAKER_LABEL_PREFIX: &str = "Speaker ";

/// Consecutive same-speaker sentences folded into one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTurn {
    /// Display label, e.g. "Speaker 0"
    pub speaker: String,

    /// Numeric speaker id from the diarizer
    pub speaker_id: u32,

    /// Turn start in seconds
    pub start_time: f64,

    /// Turn end in seconds
    pub end_time: f64,

    pub text: String,

    /// "m:ss.s-m:ss.s"
    pub time_range: String,
}

impl MergedTurn {
    /// Back to millisecond sentence form
    pub fn as_fragment(&self) -> SentenceFragment {
        SentenceFragment {
            start_ms: (self.start_time * 1000.0).round() as i64,
            end_ms: (self.end_time * 1000.0).round() as i64,
            speaker_id: self.speaker_id,
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultMerger {
    continuity_threshold_ms: i64,
    label_prefix: String,
}

impl Default for ResultMerger {
    fn default() -> Self {
        Self::new(DEFAULT_CONTINUITY_THRESHOLD_MS, DEFAULT_SPEAKER_LABEL_PREFIX)
    }
}

impl ResultMerger {
    pub fn new(continuity_threshold_ms: i64, label_prefix: impl Into<String>) -> Self {
        Self {
            continuity_threshold_ms,
            label_prefix: label_prefix.into(),
        }
    }

    /// Fold sentences in order.
    ///
    /// A sentence joins the current turn when it has the same speaker and
    /// starts no later than `threshold` after the turn's last end.
    pub fn merge(&self, fragments: &[SentenceFragment]) -> Vec<MergedTurn> {
        let mut turns = Vec::new();
        let mut current: Option<(u32, i64, i64, String)> = None;

        for fragment in fragments {
            match current.as_mut() {
                Some((speaker, _, last_end, text))
                    if *speaker == fragment.speaker_id
                        && fragment.start_ms <= *last_end + self.continuity_threshold_ms =>
                {
                    text.push_str(&fragment.text);
                    *last_end = fragment.end_ms;
                }
                _ => {
                    if let Some(turn) = current.take() {
                        turns.push(self.finish_turn(turn));
                    }
                    current = Some((
                        fragment.speaker_id,
                        fragment.start_ms,
                        fragment.end_ms,
                        fragment.text.clone(),
                    ));
                }
            }
        }

        if let Some(turn) = current {
            turns.push(self.finish_turn(turn));
        }

        turns
    }

    fn finish_turn(&self, (speaker_id, start_ms, end_ms, text): (u32, i64, i64, String)) -> MergedTurn {
        let start_time = start_ms as f64 / 1000.0;
        let end_time = end_ms as f64 / 1000.0;

        MergedTurn {
            speaker: format!("{}{}", self.label_prefix, speaker_id),
            speaker_id,
            start_time,
            end_time,
            text,
            time_range: format!("{}-{}", format_clock(start_time), format_clock(end_time)),
        }
    }
}

/// Join the partial results of an upload session into one text
pub fn merge_stream_results(results: &[String]) -> Option<String> {
    let merged: String = results
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();

    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

fn format_clock(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:04.1}", minutes as u64, seconds - minutes * 60.0)
}
