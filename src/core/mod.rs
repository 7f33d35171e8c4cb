pub mod dates;
pub mod driver;
pub mod etl;
pub mod loader;
pub mod mapper;
pub mod observer;
pub mod parser;
pub mod purge;
pub mod reconciler;
pub mod report;

pub use crate::domain::ports::{RecordStore, Storage};
pub use crate::utils::error::Result;
