//! Per-source ordered frame storage.
//!
//! [`FrameBuffer`] has no interior locking; every access goes through the
//! per-source mutex handed out by [`BufferRegistry`].

use crate::types::{Frame, SourceId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type SharedBuffer = Arc<Mutex<FrameBuffer>>;

/// Frames sorted ascending by timestamp, unique by id, with a looping
/// playback cursor. Never shrinks.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
    ids: HashSet<String>,
    cursor: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping timestamp order. Returns false if the id is already held.
    ///
    /// Equal timestamps keep arrival order.
    pub fn insert_if_absent(&mut self, frame: Frame) -> bool {
        if self.ids.contains(&frame.id) {
            return false;
        }

        let index = self
            .frames
            .partition_point(|existing| existing.timestamp <= frame.timestamp);
        self.ids.insert(frame.id.clone());
        self.frames.insert(index, frame);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn find(&self, id: &str) -> Option<&Frame> {
        if !self.contains(id) {
            return None;
        }
        self.frames.iter().find(|frame| frame.id == id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Index the next [`advance_cursor`](Self::advance_cursor) call will read.
    pub fn cursor(&self) -> usize {
        if self.cursor >= self.frames.len() {
            0
        } else {
            self.cursor
        }
    }

    /// Read the frame under the cursor, then step the cursor, wrapping to 0
    /// after the last frame. `None` when the buffer is empty.
    pub fn advance_cursor(&mut self) -> Option<Frame> {
        let index = self.cursor();
        let frame = self.at(index)?.clone();
        self.cursor = (index + 1) % self.frames.len();
        Some(frame)
    }
}

/// Lazily created buffers, one lock per source.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Mutex<HashMap<SourceId, SharedBuffer>>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, source_id: SourceId) -> SharedBuffer {
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(buffers.entry(source_id).or_insert_with(|| {
            tracing::debug!(source_id, "Created frame buffer");
            Arc::new(Mutex::new(FrameBuffer::new()))
        }))
    }

    pub fn get(&self, source_id: SourceId) -> Option<SharedBuffer> {
        self.buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&source_id)
            .cloned()
    }

    /// Run `f` with the source's buffer locked, creating the buffer if needed.
    pub fn with<R>(&self, source_id: SourceId, f: impl FnOnce(&mut FrameBuffer) -> R) -> R {
        let buffer = self.get_or_create(source_id);
        let mut guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn len_of(&self, source_id: SourceId) -> usize {
        self.get(source_id)
            .map(|buffer| buffer.lock().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }
}
