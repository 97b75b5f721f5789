pub mod api;
pub mod config;
pub mod docs;
pub mod error;
pub mod search;

pub use api::{ApiServer, ApiServerConfig};
pub use config::EngineConfig;
pub use docs::{DocumentSource, GenerationStore, JsonFileSource, ProfileRecord};
pub use error::{Result, SearchError};
pub use search::{
    BuildReport, Embedder, ProfileDocument, ScoredResult, SearchEngine, SearchRequest,
    SearchResponse, SearchStatus,
};
