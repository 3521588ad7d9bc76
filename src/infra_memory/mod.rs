mod memory_key_value_store;

pub use memory_key_value_store::*;
