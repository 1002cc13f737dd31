pub mod document;
pub mod generate;
pub mod owner;
pub mod validate;

pub use document::{FACTS_SECTION, FactsDocument};
pub use generate::{GenerateReport, Generator, SnapshotTarget};
pub use owner::Ownership;
pub use validate::{ValidationReport, Validator};
