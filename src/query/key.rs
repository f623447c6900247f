//! Query identity: a resource name plus a normalized parameter bag.

use std::collections::BTreeMap;
use std::fmt;

/// Identity of a cached query, e.g. `posts{page=2}` or `tags`.
///
/// Parameters are stored sorted by name with their values rendered to
/// strings, so two keys built with the same parameters in a different order
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  resource: String,
  params: BTreeMap<String, String>,
}

impl QueryKey {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      params: BTreeMap::new(),
    }
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.params.insert(name.into(), value.to_string());
    self
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.resource)?;
    if !self.params.is_empty() {
      let params: Vec<String> = self
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
      write!(f, "{{{}}}", params.join(","))?;
    }
    Ok(())
  }
}

/// Selects cache entries for invalidation or cancellation.
///
/// A filter built from a key matches every key with the same resource whose
/// parameters include the filter's parameters. With `exact`, the parameter
/// bags must be identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
  key: QueryKey,
  exact: bool,
}

impl QueryFilter {
  /// Matches every key of a resource
  pub fn resource(resource: impl Into<String>) -> Self {
    Self {
      key: QueryKey::new(resource),
      exact: false,
    }
  }

  /// Matches keys that contain all of `key`'s parameters
  pub fn prefix(key: QueryKey) -> Self {
    Self { key, exact: false }
  }

  /// Matches only `key` itself
  pub fn exact(key: QueryKey) -> Self {
    Self { key, exact: true }
  }

  pub fn matches(&self, key: &QueryKey) -> bool {
    if self.key.resource != key.resource {
      return false;
    }
    if self.exact {
      return self.key.params == key.params;
    }
    self
      .key
      .params
      .iter()
      .all(|(name, value)| key.params.get(name) == Some(value))
  }
}

impl fmt::Display for QueryFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.exact {
      write!(f, "={}", self.key)
    } else {
      write!(f, "{}*", self.key)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_order_is_normalized() {
    let a = QueryKey::new("posts").with_param("page", 1).with_param("sort", "-id");
    let b = QueryKey::new("posts").with_param("sort", "-id").with_param("page", 1);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "posts{page=1,sort=-id}");
  }

  #[test]
  fn test_resource_filter_matches_all_params() {
    let filter = QueryFilter::resource("posts");
    assert!(filter.matches(&QueryKey::new("posts")));
    assert!(filter.matches(&QueryKey::new("posts").with_param("page", 4)));
    assert!(!filter.matches(&QueryKey::new("tags")));
  }

  #[test]
  fn test_prefix_filter_matches_param_subset() {
    let filter = QueryFilter::prefix(QueryKey::new("posts").with_param("page", 2));
    assert!(filter.matches(&QueryKey::new("posts").with_param("page", 2)));
    assert!(filter.matches(
      &QueryKey::new("posts")
        .with_param("page", 2)
        .with_param("tag", "rust")
    ));
    assert!(!filter.matches(&QueryKey::new("posts").with_param("page", 3)));
    assert!(!filter.matches(&QueryKey::new("posts")));
  }

  #[test]
  fn test_exact_filter() {
    let filter = QueryFilter::exact(QueryKey::new("posts"));
    assert!(filter.matches(&QueryKey::new("posts")));
    assert!(!filter.matches(&QueryKey::new("posts").with_param("page", 1)));
  }
}
