// ============================================================================
// puppetconfig
// ============================================================================
//
// Per-machine Puppet facts held in a partitioned entity store, with a
// registry of valid facts and values and a generate / validate round trip
// against the YAML facts file.

pub mod cli;
pub mod config;
pub mod core;
pub mod machines;
pub mod registry;
pub mod result;
pub mod snapshot;
pub mod storage;

pub use crate::config::Config;
pub use crate::core::{ErrorKind, FactBag, FactError, Result, RunContext};
pub use crate::machines::MachineManager;
pub use crate::registry::{FactRegistry, ValidFact};
pub use crate::result::ResultTable;
pub use crate::snapshot::{FactsDocument, Generator, SnapshotTarget, ValidationReport, Validator};
pub use crate::storage::{EntityStore, FileEntityStore, MemoryEntityStore, TableServiceStore};
