pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{MemoryStore, RestStore};
pub use config::{ImportConfig, LocalStorage};
pub use core::driver::{ImportSession, ImportSettings};
pub use core::etl::ImportEngine;
pub use core::observer::{ImportObserver, LoggingObserver, NoopObserver};
pub use domain::model::{ImportStats, ImportSummary, RunState};
pub use domain::target::ImportTarget;
pub use utils::error::{ImportError, Result};
