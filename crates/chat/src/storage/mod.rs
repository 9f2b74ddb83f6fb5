//! Durable storage for per-conversation date buckets
//!
//! The trait-based design allows swapping between an in-memory store (tests,
//! offline demo) and a SQLite file that survives restarts.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryBucketStore;
pub use sqlite::SqliteBucketStore;
pub use traits::BucketStore;
