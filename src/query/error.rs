use thiserror::Error;

/// Outcome of a failed read. Cloneable so one fetch result can fan out to
/// every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
  #[error("{0}")]
  Fetch(String),
  #[error("Query was cancelled")]
  Cancelled,
  #[error("Cached value for {0} has a different type")]
  TypeMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
  #[error("Mutation failed after {attempts} attempt(s): {message}")]
  Failed { attempts: u32, message: String },
}
