//! The query cache: one owned store of fetched values keyed by [`QueryKey`].

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::QueryError;
use super::key::{QueryFilter, QueryKey};

type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyValue, QueryError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// How long fetched data stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
  /// Stale once `now - fetched_at` exceeds the duration
  After(Duration),
  /// Never stale; only invalidation forces a refetch
  Never,
}

impl StaleTime {
  pub fn minutes(minutes: u64) -> Self {
    StaleTime::After(Duration::from_secs(minutes * 60))
  }

  fn is_stale(&self, fetched_at: Instant) -> bool {
    match self {
      StaleTime::After(window) => fetched_at.elapsed() > *window,
      StaleTime::Never => false,
    }
  }
}

/// What happened to a cache entry. Broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEventKind {
  Fetching,
  Updated,
  Failed(String),
  Invalidated,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
  pub key: QueryKey,
  pub kind: QueryEventKind,
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  pub data: Option<Arc<T>>,
  /// Message of the last failed fetch, cleared by the next success
  pub error: Option<String>,
  pub is_fetching: bool,
  pub is_invalidated: bool,
  pub fetched_at: Option<Instant>,
  /// Wall-clock time of the last successful fetch, for display
  pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QuerySnapshot<T> {
  /// True when a read with this freshness window would go to the network.
  pub fn needs_fetch(&self, stale_time: StaleTime) -> bool {
    if self.is_invalidated {
      return true;
    }
    match self.fetched_at {
      Some(at) => self.data.is_none() || stale_time.is_stale(at),
      None => true,
    }
  }
}

struct InFlight {
  id: u64,
  future: SharedFetch,
  abort: AbortHandle,
}

#[derive(Default)]
struct Entry {
  value: Option<AnyValue>,
  fetched_at: Option<Instant>,
  updated_at: Option<DateTime<Utc>>,
  error: Option<String>,
  invalidated: bool,
  in_flight: Option<InFlight>,
}

impl Entry {
  fn fresh_value(&self, stale_time: StaleTime) -> Option<AnyValue> {
    if self.invalidated {
      return None;
    }
    match (&self.value, self.fetched_at) {
      (Some(value), Some(at)) if !stale_time.is_stale(at) => Some(Arc::clone(value)),
      _ => None,
    }
  }

  /// Abort the in-flight fetch, if any. Its late response will be discarded.
  fn cancel_fetch(&mut self) -> bool {
    match self.in_flight.take() {
      Some(in_flight) => {
        in_flight.abort.abort();
        true
      }
      None => false,
    }
  }
}

#[derive(Default)]
struct Store {
  entries: HashMap<QueryKey, Entry>,
  next_fetch_id: u64,
}

enum Lookup {
  Fresh(AnyValue),
  Pending(SharedFetch),
}

/// Handle to the query cache. Clones share the same store.
///
/// The store is only ever mutated through this type: views read snapshots
/// and trigger operations, they never touch entries directly.
#[derive(Clone)]
pub struct QueryClient {
  store: Arc<Mutex<Store>>,
  events: broadcast::Sender<QueryEvent>,
}

impl QueryClient {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(256);
    Self {
      store: Arc::new(Mutex::new(Store::default())),
      events,
    }
  }

  /// Subscribe to entry state transitions.
  pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
    self.events.subscribe()
  }

  /// Read through the cache.
  ///
  /// 1. Fresh entry: return it without touching the network
  /// 2. Fetch already in flight for this key: wait for that one
  /// 3. Otherwise start a fetch, store the result and return it
  pub async fn fetch_query<T, F, Fut, E>(
    &self,
    key: &QueryKey,
    stale_time: StaleTime,
    fetcher: F,
  ) -> Result<Arc<T>, QueryError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    let value = match self.start_or_join(key, stale_time, fetcher) {
      Lookup::Fresh(value) => value,
      Lookup::Pending(fetch) => fetch.await?,
    };
    downcast(key, value)
  }

  /// Like [`fetch_query`](Self::fetch_query) but without waiting for the
  /// result. Subscribers hear about it when it lands.
  pub fn prefetch_query<T, F, Fut, E>(&self, key: &QueryKey, stale_time: StaleTime, fetcher: F)
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    let _ = self.start_or_join(key, stale_time, fetcher);
  }

  /// Current state of an entry, or None if the key was never requested.
  pub fn query_state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
    let store = self.lock();
    let entry = store.entries.get(key)?;
    Some(QuerySnapshot {
      data: entry
        .value
        .clone()
        .and_then(|value| value.downcast::<T>().ok()),
      error: entry.error.clone(),
      is_fetching: entry.in_flight.is_some(),
      is_invalidated: entry.invalidated,
      fetched_at: entry.fetched_at,
      updated_at: entry.updated_at,
    })
  }

  pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    self.query_state::<T>(key).and_then(|snapshot| snapshot.data)
  }

  /// Store a value as if it had just been fetched.
  pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
    {
      let mut store = self.lock();
      let entry = store.entries.entry(key.clone()).or_default();
      entry.value = Some(Arc::new(value));
      entry.fetched_at = Some(Instant::now());
      entry.updated_at = Some(Utc::now());
      entry.error = None;
      entry.invalidated = false;
    }
    self.emit(key, QueryEventKind::Updated);
  }

  /// Mark matching entries stale so their next read refetches. In-flight
  /// fetches for them are aborted since they may predate the change.
  pub fn invalidate_queries(&self, filter: &QueryFilter) -> usize {
    let keys: Vec<QueryKey> = {
      let mut store = self.lock();
      store
        .entries
        .iter_mut()
        .filter(|(key, _)| filter.matches(key))
        .map(|(key, entry)| {
          entry.invalidated = true;
          entry.cancel_fetch();
          key.clone()
        })
        .collect()
    };

    info!(%filter, count = keys.len(), "invalidated queries");
    for key in &keys {
      self.emit(key, QueryEventKind::Invalidated);
    }
    keys.len()
  }

  /// Abort in-flight fetches for matching entries. Responses that arrive
  /// afterwards are dropped instead of overwriting the cache.
  pub fn cancel_queries(&self, filter: &QueryFilter) -> usize {
    let keys: Vec<QueryKey> = {
      let mut store = self.lock();
      store
        .entries
        .iter_mut()
        .filter(|(key, _)| filter.matches(key))
        .filter_map(|(key, entry)| entry.cancel_fetch().then(|| key.clone()))
        .collect()
    };

    if !keys.is_empty() {
      info!(%filter, count = keys.len(), "cancelled in-flight queries");
    }
    for key in &keys {
      self.emit(key, QueryEventKind::Cancelled);
    }
    keys.len()
  }

  fn start_or_join<T, F, Fut, E>(&self, key: &QueryKey, stale_time: StaleTime, fetcher: F) -> Lookup
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    let mut guard = self.lock();
    let store = &mut *guard;
    let entry = store.entries.entry(key.clone()).or_default();

    if let Some(value) = entry.fresh_value(stale_time) {
      debug!(%key, "cache hit");
      return Lookup::Fresh(value);
    }

    if let Some(in_flight) = &entry.in_flight {
      debug!(%key, "joining in-flight fetch");
      return Lookup::Pending(in_flight.future.clone());
    }

    store.next_fetch_id += 1;
    let id = store.next_fetch_id;
    debug!(%key, id, "cache miss, fetching");

    let fetch = fetcher();
    let client = self.clone();
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
      // A panicking fetcher settles like a failed one so the key is not left in flight
      let result = match AssertUnwindSafe(fetch).catch_unwind().await {
        Ok(Ok(value)) => Ok(Arc::new(value) as AnyValue),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
      };
      client.settle(&task_key, id, result)
    });
    let abort = handle.abort_handle();

    let future = async move {
      match handle.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(QueryError::Cancelled),
        Err(e) => Err(QueryError::Fetch(format!("fetch task failed: {}", e))),
      }
    }
    .boxed()
    .shared();

    entry.in_flight = Some(InFlight {
      id,
      future: future.clone(),
      abort,
    });
    drop(guard);

    self.emit(key, QueryEventKind::Fetching);
    Lookup::Pending(future)
  }

  /// Apply a finished fetch, unless it was cancelled or superseded meanwhile.
  fn settle(&self, key: &QueryKey, id: u64, result: Result<AnyValue, String>) -> FetchResult {
    let outcome = {
      let mut store = self.lock();
      let entry = match store.entries.get_mut(key) {
        Some(entry) if entry.in_flight.as_ref().map(|f| f.id) == Some(id) => entry,
        _ => {
          debug!(%key, id, "discarding response of cancelled fetch");
          return Err(QueryError::Cancelled);
        }
      };
      entry.in_flight = None;

      match result {
        Ok(value) => {
          entry.value = Some(Arc::clone(&value));
          entry.fetched_at = Some(Instant::now());
          entry.updated_at = Some(Utc::now());
          entry.error = None;
          entry.invalidated = false;
          Ok(value)
        }
        Err(message) => {
          entry.error = Some(message.clone());
          Err(message)
        }
      }
    };

    match outcome {
      Ok(value) => {
        self.emit(key, QueryEventKind::Updated);
        Ok(value)
      }
      Err(message) => {
        warn!(%key, error = %message, "fetch failed");
        self.emit(key, QueryEventKind::Failed(message.clone()));
        Err(QueryError::Fetch(message))
      }
    }
  }

  fn emit(&self, key: &QueryKey, kind: QueryEventKind) {
    // No subscribers is fine
    let _ = self.events.send(QueryEvent {
      key: key.clone(),
      kind,
    });
  }

  fn lock(&self) -> MutexGuard<'_, Store> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new()
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  let detail = panic
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("unknown cause");
  format!("fetch panicked: {}", detail)
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>, QueryError> {
  value
    .downcast::<T>()
    .map_err(|_| QueryError::TypeMismatch(key.to_string()))
}
