pub mod types;
pub mod macros;
pub mod storage;
pub mod execution;
