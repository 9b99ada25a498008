//! Extraction progress reporting.
//!
//! Extractors report `(done, total)` ticks into an unbounded channel and
//! never wait on the store. A single writer task per job maps ticks onto the
//! 20..=80 band and writes only strictly increasing values. A `NotFound`
//! from the store means the job was deleted: the writer stops and raises the
//! cancellation flag that extractors poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use formmonkey_core::defaults::{PROGRESS_EXTRACT_END, PROGRESS_EXTRACT_START, PROGRESS_STARTED};
use formmonkey_core::{JobStore, JobUpdate, ProgressSink};

#[derive(Debug)]
struct Tick {
    done: usize,
    total: usize,
    message: Option<String>,
}

/// Map `done` of `total` onto the extraction progress band.
pub fn scale_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_EXTRACT_START;
    }
    let span = (PROGRESS_EXTRACT_END - PROGRESS_EXTRACT_START) as usize;
    let offset = done.min(total) * span / total;
    PROGRESS_EXTRACT_START + offset as u8
}

/// `ProgressSink` feeding a job's progress writer.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<Tick>,
    cancelled: Arc<AtomicBool>,
}

impl ProgressSink for ChannelProgress {
    fn report(&self, done: usize, total: usize, message: Option<&str>) {
        // A closed channel means the writer has stopped; drop the tick.
        let _ = self.tx.send(Tick {
            done,
            total,
            message: message.map(str::to_string),
        });
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Handle to a running progress writer.
pub struct ProgressWriter {
    handle: JoinHandle<u8>,
    cancelled: Arc<AtomicBool>,
}

impl ProgressWriter {
    /// Spawn the writer for `job_id` and return the sink extractors report into.
    pub fn spawn(store: Arc<dyn JobStore>, job_id: String) -> (Arc<ChannelProgress>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_writer(store, job_id, rx, cancelled.clone()));
        let sink = Arc::new(ChannelProgress {
            tx,
            cancelled: cancelled.clone(),
        });
        (sink, Self { handle, cancelled })
    }

    /// Whether the writer saw the job disappear.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Wait until every queued tick is written. All sinks must be dropped
    /// first. Returns the last progress value written.
    pub async fn finish(self) -> u8 {
        match self.handle.await {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Progress writer task failed");
                PROGRESS_STARTED
            }
        }
    }
}

async fn run_writer(
    store: Arc<dyn JobStore>,
    job_id: String,
    mut rx: mpsc::UnboundedReceiver<Tick>,
    cancelled: Arc<AtomicBool>,
) -> u8 {
    let mut last = PROGRESS_STARTED;

    while let Some(mut tick) = rx.recv().await {
        // Coalesce a backlog into the newest tick.
        while let Ok(newer) = rx.try_recv() {
            tick = newer;
        }

        let progress = scale_progress(tick.done, tick.total);
        if progress <= last {
            continue;
        }

        match store
            .update(&job_id, JobUpdate::progress(progress, tick.message))
            .await
        {
            Ok(_) => {
                debug!(job_id = %job_id, progress, "Job progress updated");
                last = progress;
            }
            Err(e) if e.is_not_found() => {
                debug!(job_id = %job_id, "Job disappeared, abandoning progress writes");
                cancelled.store(true, Ordering::Relaxed);
                break;
            }
            Err(e) => {
                warn!(job_id = %job_id, progress, error = %e, "Failed to write job progress");
            }
        }
    }

    last
}
