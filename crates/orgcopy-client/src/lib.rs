//! orgcopy client - REST implementation of the orgcopy store interface.
//!
//! # Quick Start
//!
//! ```ignore
//! use orgcopy_client::{Credentials, RestStore, StoreConfig};
//! use orgcopy_core::Store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("me@example.com", "password", "token");
//!     let store = RestStore::connect("source", StoreConfig::new("test"), &credentials).await?;
//!
//!     let account = store.describe("Account").await?;
//!     println!("Account has {} fields", account.fields.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use auth::Session;
pub use client::RestStore;
pub use config::{Credentials, StoreConfig};
pub use error::Error;
