//! Optional on-disk archive of captured frames and model analyses.
//!
//! One worker thread owns both the SQLite connection and the screenshot
//! directory, so frames and rows are written in the order they were queued.
//! Async callers hand it jobs and await the reply.

mod analyses;
mod migrations;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub use analyses::AnalysisRecord;

use crate::utils::file_timestamp;

const DB_FILE_NAME: &str = "deepwork.sqlite3";
const SCREENSHOT_DIR: &str = "screenshots";

/// Everything an archive job may touch. Lives on the worker thread.
struct Store {
    conn: Connection,
    screenshots: PathBuf,
}

impl Store {
    fn open(root: &Path) -> Result<Self> {
        let screenshots = root.join(SCREENSHOT_DIR);
        fs::create_dir_all(&screenshots)
            .with_context(|| format!("failed to create {}", screenshots.display()))?;

        let db_path = root.join(DB_FILE_NAME);
        let mut conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("results database stays in rollback-journal mode: {err}");
        }
        migrations::migrate(&mut conn)?;

        Ok(Self { conn, screenshots })
    }

    /// `productivity_<timestamp>.png`, with `_N` appended until the name is free.
    fn write_frame(&self, png: &[u8], captured_at: DateTime<Utc>) -> Result<PathBuf> {
        let stamp = file_timestamp(captured_at);
        let mut path = self.screenshots.join(format!("productivity_{stamp}.png"));
        let mut suffix = 1;
        while path.exists() {
            path = self
                .screenshots
                .join(format!("productivity_{stamp}_{suffix}.png"));
            suffix += 1;
        }

        fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

type Job = Box<dyn FnOnce(&mut Store) + Send + 'static>;

/// Closing the job queue stops the thread; dropping the worker waits for it.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("archive worker panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct ResultsArchive {
    worker: Arc<Worker>,
}

impl ResultsArchive {
    /// Opens (or creates) the archive rooted at `root`.
    pub fn open(root: PathBuf) -> Result<Self> {
        let mut store = Store::open(&root)?;
        let (jobs, queue) = mpsc::channel::<Job>();

        let thread = thread::Builder::new()
            .name("deepwork-archive".into())
            .spawn(move || {
                for job in queue {
                    job(&mut store);
                }
            })
            .context("failed to start archive worker")?;

        info!("Results archive at {}", root.display());
        Ok(Self {
            worker: Arc::new(Worker {
                jobs: Some(jobs),
                thread: Some(thread),
            }),
        })
    }

    async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self
            .worker
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("results archive is closed"))?;

        let (reply, result) = oneshot::channel();
        jobs.send(Box::new(move |store| {
            // the caller may have given up waiting
            let _ = reply.send(job(store));
        }))
        .map_err(|_| anyhow!("results archive worker has stopped"))?;

        result
            .await
            .map_err(|_| anyhow!("results archive worker dropped the job"))?
    }

    pub async fn save_frame(&self, png: &[u8], captured_at: DateTime<Utc>) -> Result<PathBuf> {
        let png = png.to_vec();
        self.execute(move |store| store.write_frame(&png, captured_at))
            .await
    }
}
