//! postboard: a terminal client for a paginated posts API, built on an
//! in-memory query cache with request de-duplication, invalidation and
//! retrying mutations.

pub mod api;
pub mod app;
pub mod config;
pub mod event;
pub mod logging;
pub mod pagination;
pub mod query;
pub mod ui;
