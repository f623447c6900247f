pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::ListState;
use renderfns::{draw_header, HeaderInfo};
use view::View;

/// Main draw function
pub fn draw(frame: &mut Frame, view: &mut dyn View, host: &str) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
    ])
    .split(frame.area());

  let context = view.context();
  let shortcuts = view.shortcuts();
  let header = HeaderInfo {
    host,
    context: &context,
    fetching: view.is_fetching(),
    shortcuts: &shortcuts,
  };
  draw_header(frame, chunks[0], &header);

  view.render(frame, chunks[1]);
}

/// Keep a list selection inside `0..len`, selecting the first row when
/// there is something to select
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
