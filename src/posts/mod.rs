//! Posts domain.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs (builds UpstreamRequests from the base URL)
//!     → upstream::FanOutAggregator
//!     → types.rs (decoded payloads, re-serialized into responses)
//! ```

pub mod service;
pub mod types;

pub use service::PostsService;
pub use types::{Address, Company, Geo, Post, User, UserAndPosts};
