pub mod command;
pub mod compose;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use command::CommandCapture;

/// One composed capture: every monitor top to bottom, webcam last when available.
#[derive(Debug, Clone)]
pub struct Frame {
    pub png: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    /// Labels of the stacked parts, top to bottom.
    pub labels: Vec<String>,
}

/// Produces frames for the monitor loop. Dropping a pending capture must
/// stop whatever it started.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Frame>;
}
