//! Writes with retry, cancellation of racing reads and cache invalidation.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::client::QueryClient;
use super::error::MutationError;
use super::key::QueryFilter;

/// How many times a mutation is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl RetryPolicy {
  /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`,
  /// capped at `max_delay`.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self
      .base_delay
      .checked_mul(factor)
      .unwrap_or(self.max_delay)
      .min(self.max_delay)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

/// The state of a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<R> {
  Idle,
  Pending { attempt: u32 },
  Success(R),
  Error(String),
}

impl<R> MutationState<R> {
  pub fn is_pending(&self) -> bool {
    matches!(self, MutationState::Pending { .. })
  }

  pub fn is_error(&self) -> bool {
    matches!(self, MutationState::Error(_))
  }
}

enum MutationUpdate<R> {
  Attempt(u32),
  Settled(Result<R, MutationError>),
}

type MutationFn<P, R> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<R, String>> + Send + Sync>;

/// Everything a running mutation needs, detached from the UI-facing state so
/// it can move into a spawned task.
struct Runner<P, R> {
  client: QueryClient,
  mutation_fn: MutationFn<P, R>,
  retry: RetryPolicy,
  cancels: Option<QueryFilter>,
  invalidates: Vec<QueryFilter>,
}

impl<P, R> Clone for Runner<P, R> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      mutation_fn: Arc::clone(&self.mutation_fn),
      retry: self.retry,
      cancels: self.cancels.clone(),
      invalidates: self.invalidates.clone(),
    }
  }
}

impl<P: Clone, R> Runner<P, R> {
  async fn run(self, payload: P, progress: Option<&mpsc::UnboundedSender<MutationUpdate<R>>>) -> Result<R, MutationError> {
    // Reads racing the write would land with pre-write data
    if let Some(filter) = &self.cancels {
      self.client.cancel_queries(filter);
    }

    let max_attempts = self.retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      if let Some(tx) = progress {
        let _ = tx.send(MutationUpdate::Attempt(attempt));
      }

      match (self.mutation_fn)(payload.clone()).await {
        Ok(result) => {
          info!(attempt, "mutation succeeded");
          for filter in &self.invalidates {
            self.client.invalidate_queries(filter);
          }
          return Ok(result);
        }
        Err(message) if attempt >= max_attempts => {
          warn!(attempt, error = %message, "mutation failed, giving up");
          return Err(MutationError::Failed {
            attempts: attempt,
            message,
          });
        }
        Err(message) => {
          let delay = self.retry.delay_after(attempt);
          warn!(attempt, error = %message, ?delay, "mutation failed, retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}

/// A write against the API, e.g. creating a post.
///
/// `mutate()` is fire-and-forget: the work runs on a spawned task and
/// progress is picked up by `poll()` on the event loop tick, the same way a
/// view polls a query. `execute()` runs it inline and returns the result.
pub struct Mutation<P, R> {
  runner: Runner<P, R>,
  state: MutationState<R>,
  receiver: Option<mpsc::UnboundedReceiver<MutationUpdate<R>>>,
}

impl<P, R> Mutation<P, R>
where
  P: Clone + Send + 'static,
  R: Send + 'static,
{
  pub fn new<F, Fut, E>(client: QueryClient, mutation_fn: F) -> Self
  where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
  {
    let mutation_fn: MutationFn<P, R> = Arc::new(move |payload| {
      let fut = mutation_fn(payload);
      async move { fut.await.map_err(|e| e.to_string()) }.boxed()
    });

    Self {
      runner: Runner {
        client,
        mutation_fn,
        retry: RetryPolicy::default(),
        cancels: None,
        invalidates: Vec::new(),
      },
      state: MutationState::Idle,
      receiver: None,
    }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.runner.retry = retry;
    self
  }

  /// Invalidate matching queries once the mutation succeeds.
  pub fn invalidates(mut self, filter: QueryFilter) -> Self {
    self.runner.invalidates.push(filter);
    self
  }

  /// Cancel in-flight reads matching `filter` before the next mutation runs.
  pub fn cancel_on_mutate(&mut self, filter: QueryFilter) {
    self.runner.cancels = Some(filter);
  }

  pub fn state(&self) -> &MutationState<R> {
    &self.state
  }

  /// Start the mutation without waiting for it.
  pub fn mutate(&mut self, payload: P) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending { attempt: 1 };

    let runner = self.runner.clone();
    tokio::spawn(async move {
      let result = runner.run(payload, Some(&tx)).await;
      // Receiver may have been replaced by a newer mutate()
      let _ = tx.send(MutationUpdate::Settled(result));
    });
  }

  /// Run the mutation to completion.
  pub async fn execute(&self, payload: P) -> Result<R, MutationError> {
    self.runner.clone().run(payload, None).await
  }

  /// Apply progress from a running `mutate()`.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    let mut changed = false;
    loop {
      match receiver.try_recv() {
        Ok(MutationUpdate::Attempt(attempt)) => {
          self.state = MutationState::Pending { attempt };
          changed = true;
        }
        Ok(MutationUpdate::Settled(result)) => {
          self.state = match result {
            Ok(value) => MutationState::Success(value),
            Err(e) => MutationState::Error(e.to_string()),
          };
          self.receiver = None;
          return true;
        }
        Err(mpsc::error::TryRecvError::Empty) => return changed,
        Err(mpsc::error::TryRecvError::Disconnected) => {
          self.state = MutationState::Error("Mutation was cancelled".to_string());
          self.receiver = None;
          return true;
        }
      }
    }
  }
}

impl<P, R: fmt::Debug> fmt::Debug for Mutation<P, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Mutation")
      .field("state", &self.state)
      .field("retry", &self.runner.retry)
      .finish_non_exhaustive()
  }
}
