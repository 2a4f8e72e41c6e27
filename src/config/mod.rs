pub mod env;
mod loader;

pub use env::{
    AppConfig, ClassifierConfig, CombiningScheme, ConfigError, DirectoryConfig, FilterConfig,
    LoggingConfig, StorageBackend, StorageConfig,
};
pub use loader::load_config;
