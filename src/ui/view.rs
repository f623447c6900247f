use crate::query::QueryEvent;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Shown dimmed when the action is currently unavailable
  pub enabled: bool,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      enabled: true,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }

  pub const fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
  /// No action needed
  None,
  /// Leave the application
  Quit,
}

/// Trait for view behavior
///
/// Views handle their own input modes (modals, forms) and return actions for
/// the App to execute: App → View → Components.
///
/// Views that load data asynchronously follow queries through a
/// `QueryObserver` and react to cache notifications in `handle_query_event`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Context shown in the header next to the host, e.g. "page 2/5"
  fn context(&self) -> String;

  /// Whether any query the view follows is currently fetching
  fn is_fetching(&self) -> bool {
    false
  }

  /// Called on each tick to allow views to poll running mutations
  fn tick(&mut self) {}

  /// Called for every query cache notification
  fn handle_query_event(&mut self, _event: &QueryEvent) {}

  /// Get keyboard shortcuts to display in the footer
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![ShortcutInfo::new("q", "quit").with_priority(100)]
  }
}
