// src/lib.rs

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod mutation;
pub mod normalize;
pub mod ordering;
pub mod reactions;
pub mod reconcile;
pub mod store;
pub mod utils;

// Re-export specific items for convenience if needed
pub use cache::{FeedCache, FeedSnapshot, FeedStatus};
pub use error::FeedError;
pub use mutation::MutationCoordinator;
pub use reconcile::Reconciler;
