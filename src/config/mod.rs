#[cfg(feature = "cli")]
pub mod cli;
pub mod storage;
pub mod toml_config;

pub use storage::LocalStorage;
pub use toml_config::{ConfigOverrides, ImportConfig, StoreConfig};
