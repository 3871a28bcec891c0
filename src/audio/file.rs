use crate::error::{AsrError, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

/// Sample rate every recognizer expects
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// A decoded WAV upload
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .map_err(|e| AsrError::InvalidUpload(format!("Failed to open WAV file: {}", e)))?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(AsrError::InvalidUpload(format!(
                "Unsupported WAV format: {} bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AsrError::InvalidUpload(format!("Failed to read audio samples: {}", e)))?;

        let duration_seconds = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels.max(1) as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// 16 kHz mono little-endian PCM bytes, ready for a recognizer
    pub fn to_pcm_16khz_mono(&self) -> Result<Vec<u8>> {
        if self.channels > 2 {
            return Err(AsrError::InvalidUpload(format!(
                "Unsupported channel count: {}",
                self.channels
            )));
        }
        if self.sample_rate < TARGET_SAMPLE_RATE || self.sample_rate % TARGET_SAMPLE_RATE != 0 {
            return Err(AsrError::InvalidUpload(format!(
                "Unsupported sample rate: {}Hz (expected a multiple of {}Hz)",
                self.sample_rate, TARGET_SAMPLE_RATE
            )));
        }

        let mono = stereo_to_mono(&self.samples, self.channels);
        let resampled = downsample(&mono, self.sample_rate, TARGET_SAMPLE_RATE);

        Ok(resampled.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

/// Decimate by an integer ratio (take every Nth sample)
fn downsample(samples: &[i16], sample_rate: u32, target_rate: u32) -> Vec<i16> {
    let ratio = sample_rate / target_rate;
    if ratio <= 1 {
        return samples.to_vec();
    }

    samples.iter().step_by(ratio as usize).copied().collect()
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels != 2 {
        return samples.to_vec();
    }

    // Sum left and right channels (no division to preserve volume)
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] as i32 + pair[1] as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        .collect()
}
