//! Storage layer: the compliance store contract, an in-memory store, and DuckDB (persistent).

mod changes;
mod error;
mod memory;

pub use changes::{AssignmentWrite, ChangeSet, CommitReceipt, ComplianceStore, ExceptionWrite};
pub use error::StoreError;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
