//! Composition root: owns the shared state, the live worker and the current
//! prefetch run, and exposes the synchronous consumption interface.

use crate::cache::DiskCache;
use crate::clock::Clock;
use crate::fetch::FetchContext;
use crate::live::{LiveHandle, LiveWorker};
use crate::pacing::PlaybackPacing;
use crate::prefetch::{PrefetchCoordinator, PrefetchRun, PrefetchStats};
use crate::remote::RemoteSource;
use crate::sources;
use crate::state::EngineState;
use crate::types::{Frame, SourceId};
use chrono::TimeDelta;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub use crate::state::Mode;

pub const MIN_TARGET_BUFFER_SIZE: usize = 1;
pub const MAX_TARGET_BUFFER_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_source: SourceId,
    pub initial_mode: Mode,
    pub target_buffer_size: usize,
    pub playback_fps: f64,
    /// Outer ticks per second driven by the consumer through [`Engine::tick`]
    pub tick_rate: u32,
    /// Native temporal resolution of the remote; spacing of prefetch instants
    pub cadence: TimeDelta,
    /// How far behind "now" the live worker looks
    pub publish_lag: TimeDelta,
    pub poll_interval: Duration,
    /// Bound on waiting for a cancelled prefetch to stop
    pub cancel_timeout: Duration,
    pub image_width: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_source: sources::DEFAULT_SOURCE,
            initial_mode: Mode::Video,
            target_buffer_size: 60,
            playback_fps: 2.0,
            tick_rate: 60,
            cadence: TimeDelta::minutes(12),
            publish_lag: TimeDelta::minutes(2),
            poll_interval: Duration::from_secs(60),
            cancel_timeout: Duration::from_millis(500),
            image_width: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub size: usize,
    pub cursor: usize,
}

pub struct Engine {
    config: EngineConfig,
    ctx: FetchContext,
    state: Arc<EngineState>,
    live: LiveWorker,
    live_handle: Mutex<Option<LiveHandle>>,
    prefetch: Mutex<Option<PrefetchRun>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        remote: Arc<dyn RemoteSource>,
        cache: Arc<DiskCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let target = clamp_target(config.target_buffer_size);
        let pacing = PlaybackPacing::new(config.playback_fps, config.tick_rate);
        let state = Arc::new(EngineState::new(
            config.initial_source,
            config.initial_mode,
            target,
            pacing,
        ));

        let ctx = FetchContext::new(remote, cache, clock, config.image_width);
        let live = LiveWorker::new(
            ctx.clone(),
            Arc::clone(&state),
            config.publish_lag,
            config.poll_interval,
        );

        Self {
            config,
            ctx,
            state,
            live,
            live_handle: Mutex::new(None),
            prefetch: Mutex::new(None),
        }
    }

    /// Start the live worker and the first prefetch for the active source.
    pub fn start(&self) {
        {
            let mut live = self.live_handle.lock().unwrap_or_else(|e| e.into_inner());
            if live.is_none() {
                match self.live.clone().spawn() {
                    Ok(handle) => *live = Some(handle),
                    Err(e) => tracing::error!(error = %e, "Failed to spawn live worker"),
                }
            }
        }

        tracing::info!(
            source_id = self.active_source(),
            mode = self.mode().as_str(),
            target = self.target_buffer_size(),
            "Engine started"
        );
        self.restart_prefetch(self.active_source());
    }

    /// Cancel the prefetch (bounded wait) and stop the live worker. Idempotent.
    pub fn shutdown(&self) {
        let run = self
            .prefetch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(run) = run {
            run.cancel(self.config.cancel_timeout);
        }

        let live = self
            .live_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(live) = live {
            live.stop();
            tracing::info!("Engine stopped");
        }
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.state.displayed()
    }

    /// Count one outer tick. In video mode, when the pacing interval elapses,
    /// the active buffer's cursor advances and its frame is displayed. An
    /// empty active buffer shows nothing. Returns the displayed frame.
    pub fn tick(&self) -> Option<Frame> {
        if self.mode() == Mode::Video {
            let buffer = self.state.buffers.get(self.active_source());
            let empty = buffer.as_ref().is_none_or(|buffer| {
                buffer.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
            });

            if empty {
                self.state.clear_displayed();
            } else if self.state.with_pacing(PlaybackPacing::tick) {
                let next = buffer.and_then(|buffer| {
                    buffer
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .advance_cursor()
                });
                if let Some(frame) = next {
                    self.state.set_displayed(frame);
                }
            }
        }
        self.current_frame()
    }

    /// Wall time between calls to [`tick`](Self::tick).
    pub fn tick_duration(&self) -> Duration {
        self.state.with_pacing(|pacing| pacing.tick_duration())
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    /// Entering live mode fetches the newest image right away instead of
    /// waiting for the next poll.
    pub fn set_mode(&self, mode: Mode) {
        let previous = self.state.swap_mode(mode);
        if previous == mode {
            return;
        }

        tracing::info!(mode = mode.as_str(), "Mode changed");
        if mode == Mode::Live {
            self.refresh_live();
        }
    }

    pub fn toggle_mode(&self) -> Mode {
        let mode = self.mode().toggled();
        self.set_mode(mode);
        mode
    }

    fn refresh_live(&self) {
        let worker = self.live.clone();
        if let Err(e) = thread::Builder::new()
            .name("live-refresh".to_string())
            .spawn(move || {
                worker.poll_once(true);
            })
        {
            tracing::warn!(error = %e, "Failed to spawn live refresh");
        }
    }

    pub fn active_source(&self) -> SourceId {
        self.state.active_source()
    }

    /// Cancel the running prefetch, make `source_id` active and start
    /// prefetching it. The previous source keeps its buffer and cursor.
    pub fn switch_source(&self, source_id: SourceId) {
        let mut slot = self.prefetch.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(run) = slot.take() {
            run.cancel(self.config.cancel_timeout);
        }

        self.state.set_active_source(source_id);
        self.state.buffers.get_or_create(source_id);

        tracing::info!(
            source_id,
            name = sources::by_id(source_id).map_or("unknown", |info| info.name),
            "Switched source"
        );

        *slot = self.spawn_prefetch(source_id);
    }

    /// Move `step` entries through the source catalog and switch to it.
    pub fn cycle_source(&self, step: i32) -> SourceId {
        let next = sources::cycle(self.active_source(), step);
        self.switch_source(next);
        next
    }

    pub fn target_buffer_size(&self) -> usize {
        self.state.target_size()
    }

    /// Clamp and store the target, then restart prefetch for the active
    /// source only.
    pub fn set_target_buffer_size(&self, size: usize) -> usize {
        let size = clamp_target(size);
        self.state.set_target_size(size);
        tracing::info!(target = size, "Target buffer size changed");

        self.restart_prefetch(self.active_source());
        size
    }

    pub fn playback_fps(&self) -> f64 {
        self.state.with_pacing(|pacing| pacing.fps())
    }

    /// Clamp and store the playback rate. Returns the rate in effect.
    pub fn set_playback_fps(&self, fps: f64) -> f64 {
        self.state.with_pacing(|pacing| {
            if pacing.update(fps) {
                tracing::info!(
                    fps = pacing.fps(),
                    interval_ticks = pacing.interval_ticks(),
                    "Playback rate changed"
                );
            }
            pacing.fps()
        })
    }

    pub fn buffer_stats(&self, source_id: SourceId) -> BufferStats {
        self.state
            .buffers
            .get(source_id)
            .map(|buffer| {
                let buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                BufferStats {
                    size: buffer.len(),
                    cursor: buffer.cursor(),
                }
            })
            .unwrap_or_default()
    }

    /// Ordered copy of a source's frames. Image data is shared, not copied.
    pub fn buffer_snapshot(&self, source_id: SourceId) -> Vec<Frame> {
        self.state
            .buffers
            .get(source_id)
            .map(|buffer| {
                buffer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .frames()
                    .to_vec()
            })
            .unwrap_or_default()
    }

    /// Counters of the current or most recent prefetch run.
    pub fn prefetch_stats(&self) -> Option<PrefetchStats> {
        self.prefetch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(PrefetchRun::stats)
    }

    /// Wait up to `timeout` for the current prefetch run to finish by itself.
    ///
    /// The run is waited on outside the slot lock. If the slot was refilled
    /// meanwhile, an unfinished run is cancelled like any replaced run.
    pub fn wait_for_prefetch(&self, timeout: Duration) -> bool {
        let taken = self
            .prefetch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut run) = taken else {
            return true;
        };

        let finished = run.wait(timeout);

        let mut slot = self.prefetch.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(run);
        } else if !finished {
            drop(slot);
            run.cancel(self.config.cancel_timeout);
        }
        finished
    }

    fn restart_prefetch(&self, source_id: SourceId) {
        let mut slot = self.prefetch.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(run) = slot.take() {
            run.cancel(self.config.cancel_timeout);
        }
        *slot = self.spawn_prefetch(source_id);
    }

    fn spawn_prefetch(&self, source_id: SourceId) -> Option<PrefetchRun> {
        let coordinator = PrefetchCoordinator::new(
            self.ctx.clone(),
            source_id,
            self.state.buffers.get_or_create(source_id),
            self.target_buffer_size(),
            self.config.cadence,
        );

        match coordinator.spawn() {
            Ok(run) => Some(run),
            Err(e) => {
                tracing::error!(source_id, error = %e, "Failed to spawn prefetch");
                None
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn clamp_target(size: usize) -> usize {
    size.clamp(MIN_TARGET_BUFFER_SIZE, MAX_TARGET_BUFFER_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_remote_cadence() {
        let config = EngineConfig::default();
        assert_eq!(config.cadence, TimeDelta::minutes(12));
        assert_eq!(config.publish_lag, TimeDelta::minutes(2));
        assert_eq!(config.initial_mode, Mode::Video);
        assert_eq!(config.cancel_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(0), MIN_TARGET_BUFFER_SIZE);
        assert_eq!(clamp_target(60), 60);
        assert_eq!(clamp_target(10_000), MAX_TARGET_BUFFER_SIZE);
    }
}
