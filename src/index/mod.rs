pub mod hash_index;

pub use hash_index::{HashIndex, ENTRY_RECORD_SIZE};
