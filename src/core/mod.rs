pub mod context;
pub mod error;
pub mod types;

pub use context::RunContext;
pub use error::{ErrorKind, FactError, Result};
pub use types::{Entity, FactBag, Partition};
