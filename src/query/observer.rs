//! View-side subscription to one query at a time.
//!
//! A `QueryObserver<T>` plays the role `useQuery` plays in TanStack Query:
//! it knows the key a view currently cares about, starts fetches when the
//! cached entry is missing, stale or invalidated, and turns the cache entry
//! into a [`QueryResult`] the view can render.
//!
//! ```ignore
//! let mut posts = QueryObserver::new(client.clone(), key, options, move || {
//!     let api = api.clone();
//!     async move { api.list_posts(Some(1)).await }
//! });
//! posts.fetch();
//!
//! // On every QueryEvent forwarded by the event loop
//! if posts.handle_event(&event) {
//!     // Entry changed, redraw
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::client::{QueryClient, QueryEvent, QueryEventKind, StaleTime};
use super::key::{QueryFilter, QueryKey};

/// Coarse status of a query as seen by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No data yet
  Loading,
  Success,
  /// Last fetch failed (data from an earlier fetch may still be present)
  Error,
}

/// What a view renders for one query
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
  pub status: QueryStatus,
  pub data: Option<Arc<T>>,
  pub error: Option<String>,
  /// Data belongs to the previous key and is shown while the current one loads
  pub is_placeholder: bool,
  pub is_fetching: bool,
  pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryResult<T> {
  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  pub stale_time: StaleTime,
  /// Show the previous key's data while a new key loads
  pub keep_previous_data: bool,
}

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

pub struct QueryObserver<T> {
  client: QueryClient,
  key: QueryKey,
  fetcher: Fetcher<T>,
  options: QueryOptions,
  previous: Option<Arc<T>>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  /// Create an observer. Nothing is fetched until [`fetch`](Self::fetch).
  pub fn new<F, Fut, E>(client: QueryClient, key: QueryKey, options: QueryOptions, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    Self {
      client,
      key,
      fetcher: boxed(fetcher),
      options,
      previous: None,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Follow a different key (e.g. another page) and fetch it if needed.
  pub fn set_key<F, Fut, E>(&mut self, key: QueryKey, fetcher: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    if key == self.key {
      return;
    }
    if self.options.keep_previous_data {
      if let Some(data) = self.result().data {
        self.previous = Some(data);
      }
    }
    self.key = key;
    self.fetcher = boxed(fetcher);
    self.fetch();
  }

  /// Start a fetch if the entry is missing, stale or invalidated.
  ///
  /// A failed read is not retried automatically; use [`refetch`](Self::refetch).
  pub fn fetch(&mut self) {
    if let Some(snapshot) = self.client.query_state::<T>(&self.key) {
      if snapshot.is_fetching || !snapshot.needs_fetch(self.options.stale_time) {
        return;
      }
      if snapshot.error.is_some() && !snapshot.is_invalidated {
        return;
      }
    }
    self.start();
  }

  /// Force a new fetch, dropping any in-flight one.
  pub fn refetch(&mut self) {
    self
      .client
      .invalidate_queries(&QueryFilter::exact(self.key.clone()));
    self.start();
  }

  fn start(&self) {
    let fetcher = Arc::clone(&self.fetcher);
    self
      .client
      .prefetch_query(&self.key, self.options.stale_time, move || fetcher());
  }

  /// React to a cache event. Returns true when the event concerns this
  /// observer's key and the view should redraw.
  pub fn handle_event(&mut self, event: &QueryEvent) -> bool {
    if event.key != self.key {
      return false;
    }
    match event.kind {
      QueryEventKind::Invalidated => self.fetch(),
      QueryEventKind::Updated => self.previous = None,
      _ => {}
    }
    true
  }

  /// Current result for the followed key.
  pub fn result(&self) -> QueryResult<T> {
    let snapshot = self.client.query_state::<T>(&self.key);
    let (data, error, is_fetching, updated_at) = match snapshot {
      Some(s) => (s.data, s.error, s.is_fetching, s.updated_at),
      None => (None, None, false, None),
    };

    let failed = error.is_some() && !is_fetching;
    let status = if failed {
      QueryStatus::Error
    } else if data.is_some() {
      QueryStatus::Success
    } else {
      QueryStatus::Loading
    };

    if data.is_none() && !failed && self.options.keep_previous_data {
      if let Some(previous) = &self.previous {
        return QueryResult {
          status: QueryStatus::Success,
          data: Some(Arc::clone(previous)),
          error: None,
          is_placeholder: true,
          is_fetching,
          updated_at,
        };
      }
    }

    QueryResult {
      status,
      data,
      error: if failed { error } else { None },
      is_placeholder: false,
      is_fetching,
      updated_at,
    }
  }
}

impl<T> fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.key)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

fn boxed<T, F, Fut, E>(fetcher: F) -> Fetcher<T>
where
  T: Send + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  E: fmt::Display + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { fut.await.map_err(|e| e.to_string()) }.boxed()
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::sync::broadcast;

  fn page_key(page: u32) -> QueryKey {
    QueryKey::new("posts").with_param("page", page)
  }

  fn options(keep_previous_data: bool) -> QueryOptions {
    QueryOptions {
      stale_time: StaleTime::minutes(5),
      keep_previous_data,
    }
  }

  /// Fetcher returning `page * 10` after a short delay
  fn page_fetcher(
    page: u32,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, String>> + Send + Sync + 'static {
    move || {
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(page * 10)
      }
      .boxed()
    }
  }

  async fn wait_for_update(events: &mut broadcast::Receiver<QueryEvent>, key: &QueryKey) {
    loop {
      let event = events.recv().await.expect("event");
      if &event.key == key && event.kind == QueryEventKind::Updated {
        return;
      }
    }
  }

  #[tokio::test]
  async fn test_loading_then_success() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(false), page_fetcher(1));

    assert!(observer.result().is_loading());
    observer.fetch();
    let result = observer.result();
    assert!(result.is_loading());
    assert!(result.is_fetching);

    wait_for_update(&mut events, &page_key(1)).await;
    let result = observer.result();
    assert!(result.is_success());
    assert_eq!(result.data(), Some(&10));
    assert!(!result.is_placeholder);
    assert!(result.updated_at.is_some());
  }

  #[tokio::test]
  async fn test_previous_data_is_placeholder_while_next_key_loads() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(true), page_fetcher(1));
    observer.fetch();
    wait_for_update(&mut events, &page_key(1)).await;

    observer.set_key(page_key(2), page_fetcher(2));
    let result = observer.result();
    assert!(result.is_placeholder);
    assert!(result.is_success());
    assert_eq!(result.data(), Some(&10));

    wait_for_update(&mut events, &page_key(2)).await;
    assert!(observer.handle_event(&QueryEvent {
      key: page_key(2),
      kind: QueryEventKind::Updated,
    }));
    let result = observer.result();
    assert!(!result.is_placeholder);
    assert_eq!(result.data(), Some(&20));
  }

  #[tokio::test]
  async fn test_without_placeholder_next_key_is_loading() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(false), page_fetcher(1));
    observer.fetch();
    wait_for_update(&mut events, &page_key(1)).await;

    observer.set_key(page_key(2), page_fetcher(2));
    let result = observer.result();
    assert!(result.is_loading());
    assert!(result.data().is_none());
  }

  #[tokio::test]
  async fn test_cached_key_is_not_refetched_when_revisited() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(true), page_fetcher(1));
    observer.fetch();
    wait_for_update(&mut events, &page_key(1)).await;
    observer.set_key(page_key(2), page_fetcher(2));
    wait_for_update(&mut events, &page_key(2)).await;

    observer.set_key(page_key(1), page_fetcher(1));
    let result = observer.result();
    assert!(!result.is_fetching);
    assert!(!result.is_placeholder);
    assert_eq!(result.data(), Some(&10));
  }

  #[tokio::test]
  async fn test_invalidation_event_triggers_refetch() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(false), page_fetcher(1));
    observer.fetch();
    wait_for_update(&mut events, &page_key(1)).await;

    client.invalidate_queries(&QueryFilter::resource("posts"));
    let event = loop {
      let event = events.recv().await.expect("event");
      if event.kind == QueryEventKind::Invalidated {
        break event;
      }
    };
    assert!(observer.handle_event(&event));
    assert!(observer.result().is_fetching);

    wait_for_update(&mut events, &page_key(1)).await;
    assert!(!observer.result().is_fetching);
  }

  #[tokio::test]
  async fn test_events_for_other_keys_are_ignored() {
    let client = QueryClient::new();
    let mut observer = QueryObserver::new(client, page_key(1), options(false), page_fetcher(1));
    let event = QueryEvent {
      key: QueryKey::new("tags"),
      kind: QueryEventKind::Updated,
    };
    assert!(!observer.handle_event(&event));
  }

  #[tokio::test]
  async fn test_failed_read_is_error_and_not_retried() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut observer = QueryObserver::new(client.clone(), page_key(1), options(false), move || {
      counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      async { Err::<u32, _>("Failed to fetch posts. Status: 500") }
    });
    observer.fetch();

    loop {
      let event = events.recv().await.expect("event");
      if matches!(event.kind, QueryEventKind::Failed(_)) {
        break;
      }
    }

    let result = observer.result();
    assert!(result.is_error());
    assert_eq!(result.error.as_deref(), Some("Failed to fetch posts. Status: 500"));

    observer.fetch();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    observer.refetch();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
  }
}
