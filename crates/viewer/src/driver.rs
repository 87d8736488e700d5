//! Headless consumption loop standing in for a display surface.

use acquisition::{Clock, Engine, Frame, sources};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub struct Driver<'a> {
    engine: &'a Engine,
    clock: Arc<dyn Clock>,
    tick_duration: Duration,
    shown: Option<String>,
}

impl<'a> Driver<'a> {
    /// Ticks at the engine's configured tick rate.
    pub fn new(engine: &'a Engine, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            tick_duration: engine.tick_duration(),
            shown: None,
        }
    }

    /// One outer tick. Returns the displayed frame if it changed.
    pub fn step(&mut self) -> Option<Frame> {
        let frame = self.engine.tick()?;
        if self.shown.as_deref() == Some(frame.id.as_str()) {
            return None;
        }

        self.report(&frame);
        self.shown = Some(frame.id.clone());
        Some(frame)
    }

    /// Tick at the configured rate until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        tracing::info!(
            tick_ms = self.tick_duration.as_millis() as u64,
            "Viewer loop started"
        );

        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.step();

            if let Some(remaining) = self.tick_duration.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        tracing::info!("Shutdown signal received, leaving viewer loop");
    }

    fn report(&self, frame: &Frame) {
        let source_id = self.engine.active_source();
        let delay_min = frame
            .age(self.clock.now())
            .map(|age| age.num_minutes());

        tracing::info!(
            source = sources::by_id(source_id).map_or("unknown", |info| info.name),
            mode = self.engine.mode().as_str(),
            image_id = %frame.id,
            timestamp = %frame.timestamp,
            delay_min = ?delay_min,
            buffered = self.engine.buffer_stats(source_id).size,
            "Displaying frame"
        );
    }
}
