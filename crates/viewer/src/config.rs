use acquisition::engine::{EngineConfig, Mode};
use acquisition::paths::{API_BASE, default_cache_dir};
use acquisition::{SourceId, sources};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub environment: Environment,
    pub source_id: SourceId,
    pub mode: Mode,
    pub poll_interval: Duration,
    pub buffer_size: usize,
    pub playback_fps: f64,
    pub tick_rate: u32,
    pub image_width: u32,
    pub cache_dir: PathBuf,
    pub api_base: String,
}

impl ViewerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let source_id = env::var("VIEWER_SOURCE")
            .ok()
            .and_then(|s| sources::parse(&s))
            .unwrap_or(sources::DEFAULT_SOURCE);

        let mode = env::var("VIEWER_MODE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Mode::Video);

        let poll_interval = env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let buffer_size = env::var("BUFFER_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let playback_fps = env::var("PLAYBACK_FPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2.0);

        let tick_rate = env::var("TICK_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|rate| *rate > 0)
            .unwrap_or(60);

        let image_width = env::var("IMAGE_WIDTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1024);

        let cache_dir = env::var("CACHE_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        let api_base = env::var("API_BASE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| API_BASE.to_string());

        Ok(Self {
            environment,
            source_id,
            mode,
            poll_interval,
            buffer_size,
            playback_fps,
            tick_rate,
            image_width,
            cache_dir,
            api_base,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_source: self.source_id,
            initial_mode: self.mode,
            target_buffer_size: self.buffer_size,
            playback_fps: self.playback_fps,
            tick_rate: self.tick_rate,
            poll_interval: self.poll_interval,
            image_width: self.image_width,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "VIEWER_SOURCE",
        "VIEWER_MODE",
        "POLL_INTERVAL_SECS",
        "BUFFER_SIZE",
        "PLAYBACK_FPS",
        "TICK_RATE",
        "IMAGE_WIDTH",
        "CACHE_DIR",
        "API_BASE",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: callers are #[serial].
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ViewerConfig::from_env().unwrap();

        assert_eq!(config.source_id, 13);
        assert_eq!(config.mode, Mode::Video);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.buffer_size, 60);
        assert_eq!(config.playback_fps, 2.0);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.image_width, 1024);
        assert_eq!(config.cache_dir, default_cache_dir());
        assert_eq!(config.api_base, API_BASE);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        // SAFETY: serialized with every other test touching the process environment.
        unsafe {
            env::set_var("VIEWER_SOURCE", "171");
            env::set_var("VIEWER_MODE", "LIVE");
            env::set_var("POLL_INTERVAL_SECS", "15");
            env::set_var("BUFFER_SIZE", "120");
            env::set_var("CACHE_DIR", "/var/cache/sun");
        }

        let config = ViewerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.source_id, 10);
        assert_eq!(config.mode, Mode::Live);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.buffer_size, 120);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/sun"));
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        clear_env();
        // SAFETY: serialized with every other test touching the process environment.
        unsafe {
            env::set_var("VIEWER_SOURCE", "corona");
            env::set_var("VIEWER_MODE", "slideshow");
            env::set_var("PLAYBACK_FPS", "fast");
            env::set_var("TICK_RATE", "0");
        }

        let config = ViewerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.source_id, 13);
        assert_eq!(config.mode, Mode::Video);
        assert_eq!(config.playback_fps, 2.0);
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    #[serial]
    fn test_numeric_source_outside_catalog() {
        clear_env();
        // SAFETY: serialized with every other test touching the process environment.
        unsafe { env::set_var("VIEWER_SOURCE", "77") };

        let config = ViewerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.source_id, 77);
    }

    #[test]
    fn test_engine_config_carries_settings() {
        let config = ViewerConfig {
            environment: Environment::Development,
            source_id: 18,
            mode: Mode::Live,
            poll_interval: Duration::from_secs(30),
            buffer_size: 24,
            playback_fps: 4.0,
            tick_rate: 30,
            image_width: 512,
            cache_dir: PathBuf::from("/tmp/x"),
            api_base: API_BASE.to_string(),
        };

        let engine = config.engine_config();
        assert_eq!(engine.initial_source, 18);
        assert_eq!(engine.initial_mode, Mode::Live);
        assert_eq!(engine.target_buffer_size, 24);
        assert_eq!(engine.playback_fps, 4.0);
        assert_eq!(engine.tick_rate, 30);
        assert_eq!(engine.poll_interval, Duration::from_secs(30));
        assert_eq!(engine.image_width, 512);
        assert_eq!(engine.cadence, EngineConfig::default().cadence);
    }
}
