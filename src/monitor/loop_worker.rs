use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    analysis::{parse_verdict, productivity_prompt},
    archive::AnalysisRecord,
    capture::Frame,
    error::DeepWorkError,
    session::{SessionMode, SessionView},
};

use super::{
    batch::CaptureBatch,
    phash::change_score,
    status::{SharedStatus, VerdictRecord},
    MonitorDeps, MonitorSettings,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub(super) struct LoopContext {
    pub deps: MonitorDeps,
    pub settings: MonitorSettings,
    pub status: SharedStatus,
}

pub(super) async fn monitor_loop(
    ctx: LoopContext,
    view_rx: watch::Receiver<SessionView>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(ctx.settings.capture_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut batch = CaptureBatch::new(ctx.settings.batch_size);
    ctx.status.lock().await.begin(Instant::now());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let view = view_rx.borrow().clone();
                if view.mode != SessionMode::On {
                    log_debug!("monitor tick skipped, mode is {}", view.mode);
                    continue;
                }

                if let Err(err) = run_tick(&ctx, &view, &mut batch, &view_rx).await {
                    log_error!("monitor tick failed: {err}");
                    ctx.status.lock().await.last_error = Some(err.to_string());
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("monitor loop shutting down");
                break;
            }
        }
    }
}

async fn run_tick(
    ctx: &LoopContext,
    view: &SessionView,
    batch: &mut CaptureBatch,
    view_rx: &watch::Receiver<SessionView>,
) -> Result<(), DeepWorkError> {
    let frame = capture_frame(ctx)
        .await
        .map_err(|err| DeepWorkError::external("capture", &err))?;
    log_debug!("captured frame ({} bytes)", frame.png.len());

    if let Some(archive) = &ctx.deps.archive {
        if let Err(err) = archive.save_frame(&frame.png, frame.captured_at).await {
            log_warn!("failed to archive frame: {err:#}");
        }
    }

    batch.push(frame);
    ctx.status.lock().await.frames_batched = batch.len();
    if !batch.is_full() {
        return Ok(());
    }

    let frames = batch.drain();
    ctx.status.lock().await.frames_batched = 0;

    let record = analyze(ctx, &view.task, frames)
        .await
        .map_err(|err| DeepWorkError::external("vision model", &err))?;
    log_info!(
        "verdict: productive={} reason={:?}",
        record.verdict.productive,
        record.verdict.reason
    );

    if let Some(archive) = &ctx.deps.archive {
        let row = AnalysisRecord {
            id: Uuid::new_v4().to_string(),
            session_id: view.session_id.clone().unwrap_or_default(),
            task: view.task.clone(),
            analyzed_at: record.analyzed_at,
            productive: record.verdict.productive,
            reason: record.verdict.reason.clone(),
            raw_response: record.verdict.raw.clone(),
            frame_count: record.frame_count as u32,
            change_score: record.change_score,
        };
        if let Err(err) = archive.insert_analysis(&row).await {
            log_warn!("failed to archive analysis: {err:#}");
        }
    }

    let utterance = ctx.status.lock().await.record(record, Instant::now());
    let Some(utterance) = utterance else {
        return Ok(());
    };

    let still_on = view_rx.borrow().mode == SessionMode::On;
    if !still_on {
        log_info!("mode changed during analysis, staying quiet");
        return Ok(());
    }

    ctx.deps
        .speaker
        .speak(utterance.text())
        .await
        .map_err(|err| DeepWorkError::external("text-to-speech", &err))
}

/// Dropping the capture on timeout stops any command it was running.
async fn capture_frame(ctx: &LoopContext) -> Result<Frame> {
    let timeout = ctx.settings.capture_timeout;
    match tokio::time::timeout(timeout, ctx.deps.source.capture()).await {
        Ok(frame) => frame,
        Err(_) => Err(anyhow!("capture timed out after {timeout:?}")),
    }
}

async fn analyze(ctx: &LoopContext, task: &str, frames: Vec<Frame>) -> Result<VerdictRecord> {
    let frame_count = frames.len();
    let labels = frames
        .first()
        .map(|frame| frame.labels.clone())
        .unwrap_or_default();
    let images: Arc<Vec<Vec<u8>>> = Arc::new(frames.into_iter().map(|frame| frame.png).collect());

    let score = tokio::task::spawn_blocking({
        let images = Arc::clone(&images);
        move || change_score(&images)
    })
    .await
    .context("phash worker join failed")?;
    let change_score = match score {
        Ok(score) => score,
        Err(err) => {
            log_warn!("could not compute change score: {err:#}");
            None
        }
    };

    let prompt = productivity_prompt(task, frame_count, &labels);
    let text = ctx.deps.model.describe(&prompt, &images).await?;

    Ok(VerdictRecord {
        verdict: parse_verdict(&text),
        analyzed_at: Utc::now(),
        frame_count,
        change_score,
    })
}
