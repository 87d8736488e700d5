use crate::fetch::FetchContext;
use crate::state::EngineState;
use crate::types::Frame;
use chrono::TimeDelta;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Polls the remote for the newest image of the active source.
///
/// New images go into the source's buffer and, in live mode, become the
/// displayed frame. Any failure ends only the current cycle; there is no
/// backoff and no failure limit.
#[derive(Clone)]
pub struct LiveWorker {
    ctx: FetchContext,
    state: Arc<EngineState>,
    publish_lag: TimeDelta,
    poll_interval: Duration,
}

impl LiveWorker {
    pub fn new(
        ctx: FetchContext,
        state: Arc<EngineState>,
        publish_lag: TimeDelta,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ctx,
            state,
            publish_lag,
            poll_interval,
        }
    }

    /// One poll cycle.
    ///
    /// With `publish_known` an image that is already buffered is still
    /// published; used for the immediate refresh when live mode is entered.
    /// Returns the frame the cycle produced, if any.
    pub fn poll_once(&self, publish_known: bool) -> Option<Frame> {
        let source_id = self.state.active_source();
        let target = self.ctx.clock.now() - self.publish_lag;

        let meta = match self.ctx.remote.closest_image(source_id, target) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(source_id, error = %e, "Live poll found no image");
                return None;
            }
        };

        let buffer = self.state.buffers.get_or_create(source_id);
        let known = buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .find(&meta.id)
            .cloned();

        let frame = match known {
            Some(frame) if publish_known => frame,
            Some(_) => {
                tracing::trace!(source_id, image_id = %meta.id, "No new live image");
                return None;
            }
            None => {
                let (frame, _) = self.ctx.acquire(&meta)?;
                buffer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert_if_absent(frame.clone());
                tracing::info!(
                    source_id,
                    image_id = %frame.id,
                    timestamp = %frame.timestamp,
                    "New live image"
                );
                frame
            }
        };

        self.state.publish_live(source_id, frame.clone());
        Some(frame)
    }

    /// Poll until `stop` fires or its sender is dropped. The wait between
    /// polls returns as soon as a stop arrives.
    pub fn run(&self, stop: &Receiver<()>) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs_f64(),
            "Live worker started"
        );

        // The first cycle shows whatever is newest, even if prefetch got it first
        let mut publish_known = true;
        loop {
            self.poll_once(publish_known);
            publish_known = false;

            match stop.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!("Live worker stopped");
    }

    pub fn spawn(self) -> std::io::Result<LiveHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("live-worker".to_string())
            .spawn(move || self.run(&stop_rx))?;

        Ok(LiveHandle {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

/// Running live worker. Stopping joins the thread, which may wait for one
/// in-flight request to time out.
pub struct LiveHandle {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LiveHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Live worker thread panicked");
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
