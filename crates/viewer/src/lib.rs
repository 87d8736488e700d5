pub mod config;
pub mod driver;

pub use config::ViewerConfig;
pub use driver::Driver;
