//! Page number bookkeeping for the post list.

use crate::api::Page;
use crate::query::QueryResult;

/// Current page, starting at 1. Transitions are gated on what the server
/// reported for the page currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  page: u32,
}

impl Default for Pagination {
  fn default() -> Self {
    Self { page: 1 }
  }
}

impl Pagination {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn page(&self) -> u32 {
    self.page
  }

  /// The current page is real data (not a placeholder) and reports a previous page.
  pub fn can_previous(&self, current: &QueryResult<Page>) -> bool {
    !current.is_placeholder && current.data().is_some_and(Page::has_prev)
  }

  /// The current page is real data (not a placeholder) and reports a next page.
  pub fn can_next(&self, current: &QueryResult<Page>) -> bool {
    !current.is_placeholder && current.data().is_some_and(Page::has_next)
  }

  /// Step back one page, never below 1. Returns true if the page changed.
  pub fn previous(&mut self, current: &QueryResult<Page>) -> bool {
    if !self.can_previous(current) {
      return false;
    }
    let page = self.page.saturating_sub(1).max(1);
    let changed = page != self.page;
    self.page = page;
    changed
  }

  /// Step forward one page. Returns true if the page changed.
  pub fn next(&mut self, current: &QueryResult<Page>) -> bool {
    if !self.can_next(current) {
      return false;
    }
    self.page += 1;
    true
  }
}
