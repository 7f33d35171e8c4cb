// 外部系統的具體實作
pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;
