pub mod operator;
pub mod seq_scan;
pub mod predicate;
pub mod filter;
pub mod insert;
pub mod delete;
pub mod aggregate;

pub use operator::{OpIterator, RowIterator, collect_rows};
pub use seq_scan::SeqScan;
pub use predicate::Predicate;
pub use filter::Filter;
pub use insert::Insert;
pub use delete::Delete;
pub use aggregate::{Aggregate, AggregateOp, Aggregator};
