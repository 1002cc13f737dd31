pub mod engine;
pub mod file;
pub mod filter;
pub mod memory;
pub mod table_service;

pub use engine::{Continuation, EntityStore, EntityStream, Page, query_all, query_stream};
pub use file::FileEntityStore;
pub use filter::Filter;
pub use memory::MemoryEntityStore;
pub use table_service::{TableServiceConfig, TableServiceStore};
