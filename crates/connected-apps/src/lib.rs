//! Connected Apps
//!
//! OAuth2 client support for talking to third-party providers on behalf of a
//! user or of the application itself.
//!
//! # Features
//!
//! - **Authorization-code flow**: redirect the user agent to the provider, verify
//!   the returned `state` nonce and exchange the code for tokens
//! - **Client-credentials flow**: machine-to-machine tokens, not tied to a user
//! - **Token cache**: one record per (app, subject) with expiry tracking,
//!   refresh and a bearer header accessor
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use connected_apps::{
//!     client::ProviderClient, config::Config, flows::TokenManager, store::MemoryRepository,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let provider = ProviderClient::new(&config)?;
//!     let manager = TokenManager::new(Arc::new(MemoryRepository::new()), provider, config);
//!
//!     // Register apps and ask the manager for tokens
//!     let _ = manager;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod flows;
pub mod models;
pub mod server;
pub mod store;

pub use client::ProviderClient;
pub use config::Config;
pub use error::{AuthFlowError, ClientError, RepositoryError};
pub use flows::TokenManager;
