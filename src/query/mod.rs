//! Query cache and request coordination, in the spirit of TanStack Query.
//!
//! - [`QueryClient`] owns the in-memory cache keyed by [`QueryKey`], tracks
//!   freshness, de-duplicates concurrent fetches of the same key and handles
//!   invalidation and cancellation.
//! - [`QueryObserver`] follows one key for a view and exposes a [`QueryResult`]
//!   (loading / success / error, placeholder data while switching keys).
//! - [`Mutation`] runs writes with retry and invalidates affected keys on success.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new();
//! let key = QueryKey::new("posts").with_param("page", 1);
//! let page = client
//!     .fetch_query(&key, StaleTime::minutes(5), move || async move { api.list_posts(Some(1)).await })
//!     .await?;
//! ```

mod client;
mod error;
mod key;
mod mutation;
mod observer;

pub use client::{QueryClient, QueryEvent, QueryEventKind, QuerySnapshot, StaleTime};
pub use error::{MutationError, QueryError};
pub use key::{QueryFilter, QueryKey};
pub use mutation::{Mutation, MutationState, RetryPolicy};
pub use observer::{QueryObserver, QueryOptions, QueryResult, QueryStatus};
