//! Fakes for exercising the loop without cameras, models or speakers.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::{
    analysis::VisionModel,
    archive::ResultsArchive,
    capture::{compose::solid_png, Frame, FrameSource},
    speech::Speaker,
};

use super::MonitorDeps;

#[derive(Clone)]
pub struct FakeSource {
    captures: Arc<AtomicUsize>,
    png: Arc<Vec<u8>>,
    stalls: bool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            captures: Arc::new(AtomicUsize::new(0)),
            png: Arc::new(solid_png(32, 24, 90)),
            stalls: false,
        }
    }

    /// A source whose captures never finish.
    pub fn stalling() -> Self {
        Self {
            stalls: true,
            ..Self::new()
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn capture(&self) -> Result<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.stalls {
            std::future::pending::<()>().await;
        }
        Ok(Frame {
            png: self.png.as_ref().clone(),
            captured_at: Utc::now(),
            labels: vec!["Monitor 1".into()],
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub prompt: String,
    pub image_count: usize,
}

#[derive(Clone)]
pub struct FakeModel {
    reply: Option<String>,
    calls: Arc<Mutex<Vec<ModelCall>>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn describe(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String> {
        self.calls.lock().unwrap().push(ModelCall {
            prompt: prompt.to_string(),
            image_count: images.len(),
        });
        self.reply.clone().ok_or_else(|| anyhow!("model unavailable"))
    }
}

pub struct RecordingSpeaker {
    tx: mpsc::UnboundedSender<String>,
}

impl RecordingSpeaker {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let _ = self.tx.send(text.to_string());
        Ok(())
    }
}

pub fn deps(
    source: FakeSource,
    model: FakeModel,
    speaker: Arc<RecordingSpeaker>,
    archive: Option<ResultsArchive>,
) -> MonitorDeps {
    MonitorDeps {
        source: Arc::new(source),
        model: Arc::new(model),
        speaker,
        archive,
    }
}
