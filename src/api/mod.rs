//! HTTP client for the posts API.
//!
//! Thin wrappers over three endpoints: `GET /posts` (paginated), `GET /tags`
//! and `POST /posts`. Retrying and caching live in [`crate::query`].

pub mod client;
pub mod error;
pub mod types;

pub use client::PostsApi;
pub use error::ApiError;
pub use types::{Page, Post};
