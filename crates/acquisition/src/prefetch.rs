//! Backward fill of one source's buffer, from "now" into the past.
//!
//! Instants are spaced one cadence apart starting at "now" rounded down to a
//! cadence boundary, so repeated runs ask for the same instants and hit the
//! disk cache. A run performs at most `target` lookups and stops early once
//! the buffer reaches the target (live insertions count too) or the cancel
//! flag is set. Per-instant failures skip that instant only.
//!
//! The walk covers `target` instants, not `target - held`: frames already
//! held do not shorten it, so raising the target reaches further back.

use crate::buffer::SharedBuffer;
use crate::clock::quantize;
use crate::fetch::{FetchContext, Origin};
use crate::types::SourceId;
use chrono::TimeDelta;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Advisory counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    pub lookups: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicUsize,
    downloaded: AtomicUsize,
    cached: AtomicUsize,
    skipped: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PrefetchStats {
        PrefetchStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

pub struct PrefetchCoordinator {
    ctx: FetchContext,
    source_id: SourceId,
    buffer: SharedBuffer,
    target: usize,
    cadence: TimeDelta,
    cancel: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl PrefetchCoordinator {
    /// `buffer` must be the buffer of `source_id`; it is captured for the
    /// whole run so late writes after a cancel land in the right place.
    pub fn new(
        ctx: FetchContext,
        source_id: SourceId,
        buffer: SharedBuffer,
        target: usize,
        cadence: TimeDelta,
    ) -> Self {
        Self {
            ctx,
            source_id,
            buffer,
            target,
            cadence,
            cancel: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Flag observed at the top of every iteration.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn stats(&self) -> PrefetchStats {
        self.counters.snapshot()
    }

    fn buffered(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run to completion on the calling thread.
    pub fn run(&self) -> PrefetchStats {
        let _s = common::span!("prefetch", source_id = self.source_id);

        let current = self.buffered();
        if current >= self.target {
            tracing::info!(
                frames = current,
                target = self.target,
                "Already have enough frames, skipping prefetch"
            );
            return self.stats();
        }

        tracing::info!(
            needed = self.target - current,
            have = current,
            target = self.target,
            "Prefetching frames"
        );

        let base = quantize(self.ctx.clock.now(), self.cadence);

        for i in 0..self.target {
            if self.cancel.load(Ordering::Acquire) {
                tracing::info!(stats = ?self.stats(), "Prefetch cancelled");
                return self.stats();
            }

            if self.buffered() >= self.target {
                break;
            }

            let instant = base - self.cadence * i as i32;
            self.counters.lookups.fetch_add(1, Ordering::Relaxed);

            let meta = match self.ctx.remote.closest_image(self.source_id, instant) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(instant = %instant, error = %e, "No image for instant");
                    continue;
                }
            };

            let known = self
                .buffer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(&meta.id);
            if known {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let Some((frame, origin)) = self.ctx.acquire(&meta) else {
                continue;
            };

            match origin {
                Origin::Cached => self.counters.cached.fetch_add(1, Ordering::Relaxed),
                Origin::Downloaded => self.counters.downloaded.fetch_add(1, Ordering::Relaxed),
            };

            let inserted = self
                .buffer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert_if_absent(frame);
            if !inserted {
                tracing::trace!(image_id = %meta.id, "Frame inserted concurrently");
            }
        }

        let stats = self.stats();
        tracing::info!(
            frames = self.buffered(),
            skipped = stats.skipped,
            cached = stats.cached,
            downloaded = stats.downloaded,
            "Prefetch complete"
        );
        stats
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<PrefetchRun> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let source_id = self.source_id;
        let cancel = self.cancel_flag();
        let counters = Arc::clone(&self.counters);

        let handle = thread::Builder::new()
            .name(format!("prefetch-{}", source_id))
            .spawn(move || {
                self.run();
                let _ = done_tx.send(());
            })?;

        Ok(PrefetchRun {
            source_id,
            cancel,
            counters,
            done: done_rx,
            handle: Some(handle),
        })
    }
}

/// Handle to a spawned prefetch. Dropping it detaches the thread.
pub struct PrefetchRun {
    source_id: SourceId,
    cancel: Arc<AtomicBool>,
    counters: Arc<Counters>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl PrefetchRun {
    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn stats(&self) -> PrefetchStats {
        self.counters.snapshot()
    }

    /// Wait up to `timeout` for the run to end on its own.
    /// Returns true if it ended.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take()
                    && handle.join().is_err()
                {
                    tracing::error!(source_id = self.source_id, "Prefetch thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => self.handle.is_none(),
        }
    }

    /// Set the cancel flag and wait up to `timeout` for the run to notice.
    ///
    /// On timeout the run is abandoned, not killed: an in-flight request may
    /// still complete and insert into this run's (old) source buffer.
    /// Returns true if the run stopped in time.
    pub fn cancel(mut self, timeout: Duration) -> bool {
        self.cancel.store(true, Ordering::Release);

        let stopped = self.wait(timeout);
        if !stopped {
            tracing::warn!(
                source_id = self.source_id,
                timeout_ms = timeout.as_millis() as u64,
                "Prefetch did not stop in time, abandoning it"
            );
        }
        stopped
    }
}
