pub mod aggregate;
pub mod config;
pub mod error;
pub mod lookup;
pub mod models;
pub mod parser;
pub mod protocol;
pub mod report;

pub use aggregate::{classify, classify_file, classify_reader, classify_reader_parallel, classify_sharded, FlowCounts, Tally};
pub use error::FlowTagError;
pub use lookup::LookupTable;
pub use models::{LookupKey, UNTAGGED};
