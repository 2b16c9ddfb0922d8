mod cache;
pub mod err;

/// Default size of the cache budget, 5 MiB.
pub const DEFAULT_SIZE: u64 = 5_242_880;
/// Default location for the managed subdirectory.
pub const DEFAULT_DIRECTORY: &str = "managed";

pub use cache::{ContentResolver, FifoCache, FifoCacheBuilder};
