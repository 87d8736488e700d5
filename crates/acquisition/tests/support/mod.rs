#![allow(dead_code)]

use acquisition::clock::quantize;
use acquisition::fetch::FetchContext;
use acquisition::{
    Clock, DecodedImage, DiskCache, FetchError, FixedClock, ImageMetadata, RemoteSource, SourceId,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const CADENCE_MINUTES: i64 = 12;

pub fn cadence() -> TimeDelta {
    TimeDelta::minutes(CADENCE_MINUTES)
}

/// A cadence boundary used as "T" by the scenarios.
pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 36, 0).unwrap()
}

/// Clock five minutes past `base_instant`, so prefetch quantizes back to T.
pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(base_instant() + TimeDelta::minutes(5)))
}

pub fn instant_id(instant: DateTime<Utc>) -> String {
    format!("img-{}", instant.timestamp())
}

pub fn instant_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn png(shade: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

type Resolver = dyn Fn(SourceId, DateTime<Utc>) -> Option<(String, String)> + Send + Sync;
type LookupHook = dyn Fn(usize) + Send + Sync;

/// Blocks lookups while closed.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn wait_open(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }

    pub fn set(&self, open: bool) {
        *self.open.lock().unwrap() = open;
        self.changed.notify_all();
    }
}

/// In-memory remote driven by a resolver closure.
pub struct ScriptedRemote {
    resolver: Box<Resolver>,
    lookups: Mutex<Vec<(SourceId, DateTime<Utc>)>>,
    downloads: Mutex<Vec<String>>,
    failing_downloads: Mutex<HashSet<String>>,
    hook: Mutex<Option<Arc<LookupHook>>>,
    gate: Gate,
}

impl ScriptedRemote {
    pub fn new(
        resolver: impl Fn(SourceId, DateTime<Utc>) -> Option<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        let gate = Gate::default();
        gate.set(true);

        Self {
            resolver: Box::new(resolver),
            lookups: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            failing_downloads: Mutex::new(HashSet::new()),
            hook: Mutex::new(None),
            gate,
        }
    }

    /// Behaves like the real archive: the closest image to any instant is the
    /// one published on the cadence boundary at or before it. Ids are unique
    /// per source.
    pub fn archive() -> Self {
        Self::new(|source_id, instant| {
            let slot = quantize(instant, cadence());
            Some((
                format!("{}-{}", source_id, instant_id(slot)),
                instant_timestamp(slot),
            ))
        })
    }

    /// Every lookup fails.
    pub fn empty() -> Self {
        Self::new(|_, _| None)
    }

    pub fn on_lookup(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn fail_download(&self, image_id: impl Into<String>) {
        self.failing_downloads.lock().unwrap().insert(image_id.into());
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn lookups(&self) -> Vec<(SourceId, DateTime<Utc>)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }

    pub fn lookups_for(&self, source_id: SourceId) -> usize {
        self.lookups
            .lock()
            .unwrap()
            .iter()
            .filter(|(source, _)| *source == source_id)
            .count()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

impl RemoteSource for ScriptedRemote {
    fn closest_image(
        &self,
        source_id: SourceId,
        target: DateTime<Utc>,
    ) -> Result<ImageMetadata, FetchError> {
        let count = {
            let mut lookups = self.lookups.lock().unwrap();
            lookups.push((source_id, target));
            lookups.len()
        };

        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(count);
        }

        self.gate.wait_open();

        let (id, timestamp) = (self.resolver)(source_id, target).ok_or(FetchError::NoImage)?;
        Ok(ImageMetadata {
            id,
            timestamp,
            source_id,
        })
    }

    fn download(&self, image_id: &str, _width: u32) -> Result<DecodedImage, FetchError> {
        self.downloads.lock().unwrap().push(image_id.to_string());

        if self.failing_downloads.lock().unwrap().contains(image_id) {
            return Err(FetchError::Status(404));
        }

        let shade = image_id.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        Ok(DecodedImage::decode(png(shade))?)
    }
}

pub fn context(remote: Arc<ScriptedRemote>, cache_dir: &Path, clock: Arc<dyn Clock>) -> FetchContext {
    let cache = Arc::new(DiskCache::open(cache_dir).unwrap());
    FetchContext::new(remote, cache, clock, 64)
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
