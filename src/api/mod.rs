//! HTTP surface for the relevance engine

pub mod auth;
pub mod middleware;
pub mod routes;
pub mod server;

pub use auth::JwtAuth;
pub use middleware::AuthState;
pub use server::{ephemeral_secret, ApiServer, ApiServerConfig};
