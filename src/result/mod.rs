mod table;

pub use table::ResultTable;
