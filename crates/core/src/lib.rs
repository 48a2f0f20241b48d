pub mod config;
pub mod config_loader;

pub use config::{AppConfig, DatabaseConfig, IngestConfig};
pub use config_loader::ConfigLoader;
