//! Document sources and the on-disk generation store

pub mod source;
pub mod store;

pub use source::{DocumentSource, JsonFileSource, ProfileRecord, StaticSource};
pub use store::GenerationStore;
