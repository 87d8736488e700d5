use acquisition::{Clock, DiskCache, Engine, HelioviewerClient, SystemClock};
use anyhow::Context;
use common::setup_logging;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use viewer::{Driver, ViewerConfig};

fn main() -> anyhow::Result<()> {
    let config = ViewerConfig::from_env()?;
    setup_logging(config.environment);
    let shutdown = Arc::new(AtomicBool::new(false));

    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    let cache = DiskCache::open(&config.cache_dir).with_context(|| {
        format!(
            "Failed to open image cache at {}",
            config.cache_dir.display()
        )
    })?;

    let remote = HelioviewerClient::new(config.api_base.clone())
        .context("Failed to build HTTP client for the image archive")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Engine::new(
        config.engine_config(),
        Arc::new(remote),
        Arc::new(cache),
        Arc::clone(&clock),
    );
    engine.start();

    Driver::new(&engine, clock).run(&shutdown);

    engine.shutdown();
    tracing::info!("Viewer stopped gracefully");
    Ok(())
}
