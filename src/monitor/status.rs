use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    analysis::Verdict,
    speech::{EncouragementPolicy, Utterance},
};

/// A verdict together with what it was computed from.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerdictRecord {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub analyzed_at: DateTime<Utc>,
    pub frame_count: usize,
    pub change_score: Option<u32>,
}

/// What the monitor loop has observed. Written only by the loop; read by
/// status snapshots.
#[derive(Debug)]
pub struct MonitorStatus {
    pub last_verdict: Option<VerdictRecord>,
    pub frames_batched: usize,
    pub last_error: Option<String>,
    policy: EncouragementPolicy,
}

pub type SharedStatus = Arc<Mutex<MonitorStatus>>;

impl MonitorStatus {
    pub fn new(encouragement_interval: Duration) -> Self {
        Self {
            last_verdict: None,
            frames_batched: 0,
            last_error: None,
            policy: EncouragementPolicy::new(encouragement_interval, Instant::now()),
        }
    }

    pub fn shared(encouragement_interval: Duration) -> SharedStatus {
        Arc::new(Mutex::new(Self::new(encouragement_interval)))
    }

    /// Called when a monitoring run starts: the productive streak starts now.
    pub fn begin(&mut self, now: Instant) {
        self.frames_batched = 0;
        self.last_error = None;
        self.policy = EncouragementPolicy::new(self.policy.interval(), now);
    }

    /// Stores the verdict and decides what, if anything, to say about it.
    pub fn record(&mut self, record: VerdictRecord, now: Instant) -> Option<Utterance> {
        let utterance = self.policy.on_verdict(&record.verdict, now);
        self.last_verdict = Some(record);
        self.last_error = None;
        utterance
    }

    pub fn until_encouragement(&self, now: Instant) -> Duration {
        self.policy.remaining(now)
    }
}
