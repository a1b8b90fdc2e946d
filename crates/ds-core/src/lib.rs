//! ds-core/src/lib.rs
//!
//! Domain logic and port definitions for the distributed forum: ranking,
//! listing queries, voting and content creation. Storage and identity live
//! behind the traits in [`traits`] and are provided by plugins.

pub mod accounts;
pub mod config;
pub mod content;
pub mod error;
pub mod locks;
pub mod models;
pub mod query;
pub mod ranking;
pub mod traits;
pub mod vote;

// Re-exporting for easier access in other crates
pub use accounts::*;
pub use config::*;
pub use content::*;
pub use error::*;
pub use locks::*;
pub use models::*;
pub use query::*;
pub use ranking::*;
pub use traits::*;
pub use vote::*;
