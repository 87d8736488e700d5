use crate::buffer::BufferRegistry;
use crate::pacing::PlaybackPacing;
use crate::types::{Frame, SourceId};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live = 0,
    Video = 1,
}

impl Mode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Mode::Live),
            1 => Some(Mode::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Video => "video",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Live => Mode::Video,
            Mode::Video => Mode::Live,
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "video" => Ok(Mode::Video),
            other => Err(format!(
                "{} is not a supported mode. Use either `live` or `video`.",
                other
            )),
        }
    }
}

/// State shared by the engine and its workers.
///
/// Scalars are atomics; the displayed frame and pacing have their own small
/// locks. Buffer contents are guarded per source by the registry.
pub struct EngineState {
    pub buffers: BufferRegistry,
    active_source: AtomicU32,
    mode: AtomicU8,
    target_size: AtomicUsize,
    displayed: Mutex<Option<Frame>>,
    pacing: Mutex<PlaybackPacing>,
}

impl EngineState {
    pub fn new(source_id: SourceId, mode: Mode, target_size: usize, pacing: PlaybackPacing) -> Self {
        let buffers = BufferRegistry::new();
        buffers.get_or_create(source_id);

        Self {
            buffers,
            active_source: AtomicU32::new(source_id),
            mode: AtomicU8::new(mode as u8),
            target_size: AtomicUsize::new(target_size),
            displayed: Mutex::new(None),
            pacing: Mutex::new(pacing),
        }
    }

    #[inline]
    pub fn active_source(&self) -> SourceId {
        self.active_source.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_active_source(&self, source_id: SourceId) {
        self.active_source.store(source_id, Ordering::Release);
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire)).unwrap_or(Mode::Video)
    }

    /// Store `mode`, returning the previous one.
    #[inline]
    pub fn swap_mode(&self, mode: Mode) -> Mode {
        Mode::from_u8(self.mode.swap(mode as u8, Ordering::AcqRel)).unwrap_or(Mode::Video)
    }

    #[inline]
    pub fn target_size(&self) -> usize {
        self.target_size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_target_size(&self, size: usize) {
        self.target_size.store(size, Ordering::Release);
    }

    pub fn displayed(&self) -> Option<Frame> {
        self.displayed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_displayed(&self, frame: Frame) {
        *self.displayed.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
    }

    pub fn clear_displayed(&self) {
        *self.displayed.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Show `frame` if live mode is on and `source_id` is still the active
    /// source. Returns whether it was shown.
    pub fn publish_live(&self, source_id: SourceId, frame: Frame) -> bool {
        if self.mode() != Mode::Live || self.active_source() != source_id {
            return false;
        }
        self.set_displayed(frame);
        true
    }

    pub fn with_pacing<R>(&self, f: impl FnOnce(&mut PlaybackPacing) -> R) -> R {
        f(&mut self.pacing.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
