pub mod buffer;
pub mod cache;
pub mod clock;
pub mod engine;
pub mod errors;
pub mod fetch;
pub mod live;
pub mod pacing;
pub mod paths;
pub mod prefetch;
pub mod remote;
pub mod sources;
pub mod state;
pub mod types;

pub use buffer::{BufferRegistry, FrameBuffer, SharedBuffer};
pub use cache::{CacheEntry, DiskCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{BufferStats, Engine, EngineConfig, Mode};
pub use errors::{CacheError, FetchError};
pub use prefetch::{PrefetchCoordinator, PrefetchRun, PrefetchStats};
pub use remote::{HelioviewerClient, RemoteSource};
pub use types::{DecodedImage, Frame, ImageMetadata, SourceId};
