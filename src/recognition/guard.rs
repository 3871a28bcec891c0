use super::collaborators::{AcceleratorMemory, MemoryInfo};
use std::sync::Arc;
use tracing::{debug, warn};

/// Admission check run before every offline pass.
///
/// Free memory is `total - cached`. When it is below
/// `estimate * safety_factor` the accelerator cache is cleared and the
/// check is repeated against `estimate * relaxed_factor`.
#[derive(Clone)]
pub struct ResourceGuard {
    accelerator: Arc<dyn AcceleratorMemory>,
    safety_factor: f64,
    relaxed_factor: f64,
}

impl ResourceGuard {
    pub fn new(accelerator: Arc<dyn AcceleratorMemory>, safety_factor: f64, relaxed_factor: f64) -> Self {
        Self {
            accelerator,
            safety_factor,
            relaxed_factor,
        }
    }

    pub fn with_defaults(accelerator: Arc<dyn AcceleratorMemory>) -> Self {
        Self::new(accelerator, 2.0, 1.5)
    }

    /// Decide whether `estimated_bytes` of work may run now. Never fails:
    /// unknown memory admits.
    pub async fn admit(&self, estimated_bytes: u64) -> bool {
        let Some(info) = self.snapshot().await else {
            return true;
        };

        let estimate = estimated_bytes as f64;
        if info.free_bytes() as f64 >= estimate * self.safety_factor {
            return true;
        }

        debug!(
            "Accelerator memory low ({} free, {} requested), clearing cache",
            info.free_bytes(),
            estimated_bytes
        );
        self.relieve().await;

        let Some(info) = self.snapshot().await else {
            return true;
        };

        let admitted = info.free_bytes() as f64 >= estimate * self.relaxed_factor;
        if !admitted {
            warn!(
                "Refusing {} bytes of audio: only {} bytes of accelerator memory free",
                estimated_bytes,
                info.free_bytes()
            );
        }
        admitted
    }

    /// Clear the accelerator cache, ignoring failures
    pub async fn relieve(&self) {
        if let Err(e) = self.accelerator.clear_cache().await {
            warn!("Failed to clear accelerator cache: {}", e);
        }
    }

    async fn snapshot(&self) -> Option<MemoryInfo> {
        match self.accelerator.snapshot().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Accelerator memory probe failed, admitting: {}", e);
                None
            }
        }
    }
}
