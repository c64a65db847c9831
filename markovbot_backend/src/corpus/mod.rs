pub mod filter;
pub mod store;

pub use filter::{consider, is_highlight, NormalizedLine};
pub use store::{CorpusStore, MemoryCorpusStore};
