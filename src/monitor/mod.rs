//! The capture, analyze and notify loop that runs while a session is ON.

mod batch;
mod controller;
mod loop_worker;
mod phash;
mod status;

#[cfg(test)]
pub(crate) mod testing;

use std::{sync::Arc, time::Duration};

use crate::{analysis::VisionModel, archive::ResultsArchive, capture::FrameSource, speech::Speaker};

pub use batch::CaptureBatch;
pub use controller::MonitorController;
pub use status::{MonitorStatus, SharedStatus, VerdictRecord};

pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_ENCOURAGEMENT_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub capture_interval: Duration,
    pub capture_timeout: Duration,
    pub batch_size: usize,
    pub encouragement_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            encouragement_interval: DEFAULT_ENCOURAGEMENT_INTERVAL,
        }
    }
}

/// The outside world as seen by the loop.
#[derive(Clone)]
pub struct MonitorDeps {
    pub source: Arc<dyn FrameSource>,
    pub model: Arc<dyn VisionModel>,
    pub speaker: Arc<dyn Speaker>,
    pub archive: Option<ResultsArchive>,
}
