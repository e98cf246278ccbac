pub mod engine;

pub use engine::{validate_key, StorageEngine};
