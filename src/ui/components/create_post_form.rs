use super::input::TextInput;
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Title and tags entered in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
  pub title: String,
  pub tags: Vec<String>,
}

/// Events emitted by the form that the parent view handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Valid submission; the form has already reset and closed itself
  Submitted(Submission),
  Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
  #[default]
  Title,
  Tags,
}

/// "Create Post" modal: a title field and one checkbox per known tag
#[derive(Debug, Clone, Default)]
pub struct CreatePostForm {
  open: bool,
  title: TextInput,
  tags: Vec<String>,
  checked: Vec<bool>,
  focus: Focus,
  selected: usize,
}

impl CreatePostForm {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_open(&self) -> bool {
    self.open
  }

  pub fn open(&mut self) {
    self.open = true;
  }

  pub fn close(&mut self) {
    self.open = false;
  }

  /// Replace the checkbox set, keeping checks on tags that are still present
  pub fn set_tags(&mut self, tags: &[String]) {
    if tags == self.tags.as_slice() {
      return;
    }
    let checked = tags
      .iter()
      .map(|tag| {
        self
          .tags
          .iter()
          .position(|t| t == tag)
          .is_some_and(|i| self.checked[i])
      })
      .collect();
    self.tags = tags.to_vec();
    self.checked = checked;
    self.selected = self.selected.min(self.tags.len().saturating_sub(1));
  }

  /// Clear the title and every checkbox
  pub fn reset(&mut self) {
    self.title.clear();
    self.checked.iter_mut().for_each(|c| *c = false);
    self.focus = Focus::Title;
    self.selected = 0;
  }

  pub fn title(&self) -> &str {
    self.title.value()
  }

  /// Checked tags, in the order the tags are listed
  pub fn checked_tags(&self) -> Vec<String> {
    self
      .tags
      .iter()
      .zip(&self.checked)
      .filter(|(_, checked)| **checked)
      .map(|(tag, _)| tag.clone())
      .collect()
  }

  /// Validate and take the current input. A missing title or an empty tag
  /// selection is a silent no-op: nothing is returned and the form stays open.
  fn submit(&mut self) -> Option<Submission> {
    let title = self.title.value().to_string();
    let tags = self.checked_tags();
    if title.is_empty() || tags.is_empty() {
      return None;
    }
    self.reset();
    self.close();
    Some(Submission { title, tags })
  }

  fn toggle_selected(&mut self) {
    if let Some(checked) = self.checked.get_mut(self.selected) {
      *checked = !*checked;
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if !self.open {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.close();
        return KeyResult::Event(FormEvent::Closed);
      }
      KeyCode::Enter => {
        return match self.submit() {
          Some(submission) => KeyResult::Event(FormEvent::Submitted(submission)),
          None => KeyResult::Handled,
        };
      }
      KeyCode::Tab | KeyCode::BackTab => {
        self.focus = match self.focus {
          Focus::Title if !self.tags.is_empty() => Focus::Tags,
          _ => Focus::Title,
        };
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.focus {
      Focus::Title => {
        self.title.handle_key(key);
      }
      Focus::Tags => match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
          if !self.tags.is_empty() {
            self.selected = (self.selected + 1) % self.tags.len();
          }
        }
        KeyCode::Char('k') | KeyCode::Up => {
          if !self.tags.is_empty() {
            self.selected = self
              .selected
              .checked_sub(1)
              .unwrap_or(self.tags.len() - 1);
          }
        }
        KeyCode::Char(' ') => self.toggle_selected(),
        _ => {}
      },
    }
    // The modal swallows every key while open
    KeyResult::Handled
  }

  /// Render the modal overlay if open
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.open {
      return;
    }

    // 60% of the width, computed in u32 so wide terminals cannot overflow
    let width = u16::try_from(u32::from(area.width) * 60 / 100)
      .unwrap_or(area.width)
      .clamp(30.min(area.width), 70.min(area.width));
    let height = u16::try_from(self.tags.len().saturating_add(8))
      .unwrap_or(u16::MAX)
      .min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Create Post ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height < 4 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Title field
        Constraint::Length(1), // Spacer
        Constraint::Min(1),    // Tags
        Constraint::Length(1), // Hints
      ])
      .split(inner);

    let mut title_spans = vec![Span::styled("Title: ", Style::default().fg(Color::Cyan))];
    let value = self.title.value();
    if self.focus == Focus::Title {
      // Reversed cell under the cursor
      let cursor = self.title.cursor();
      let before: String = value.chars().take(cursor).collect();
      let at = value.chars().nth(cursor).unwrap_or(' ');
      let after: String = value.chars().skip(cursor + 1).collect();
      let text = Style::default().fg(Color::White);
      title_spans.push(Span::styled(before, text));
      title_spans.push(Span::styled(at.to_string(), text.add_modifier(Modifier::REVERSED)));
      title_spans.push(Span::styled(after, text));
    } else if value.is_empty() {
      title_spans.push(Span::styled(
        "Enter your post here..",
        Style::default().fg(Color::DarkGray),
      ));
    } else {
      title_spans.push(Span::styled(value, Style::default().fg(Color::DarkGray)));
    }
    frame.render_widget(Paragraph::new(Line::from(title_spans)), chunks[0]);

    if self.tags.is_empty() {
      frame.render_widget(
        Paragraph::new("Loading tags...").style(Style::default().fg(Color::DarkGray)),
        chunks[2],
      );
    } else {
      let items: Vec<ListItem> = self
        .tags
        .iter()
        .zip(&self.checked)
        .map(|(tag, checked)| {
          let mark = if *checked { "[x] " } else { "[ ] " };
          ListItem::new(Line::from(vec![
            Span::styled(mark, Style::default().fg(Color::Yellow)),
            Span::raw(tag.as_str()),
          ]))
        })
        .collect();

      let mut list = List::new(items);
      let mut state = ListState::default();
      if self.focus == Focus::Tags {
        list = list.highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
        state.select(Some(self.selected));
      }
      frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    let hints = Line::from(vec![
      Span::styled("<tab>", Style::default().fg(Color::Cyan)),
      Span::styled(" switch  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<space>", Style::default().fg(Color::Cyan)),
      Span::styled(" toggle  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<enter>", Style::default().fg(Color::Cyan)),
      Span::styled(" submit  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<esc>", Style::default().fg(Color::Cyan)),
      Span::styled(" close", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(hints), chunks[3]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;
  use ratatui::backend::TestBackend;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn open_form(tags: &[&str]) -> CreatePostForm {
    let mut form = CreatePostForm::new();
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    form.set_tags(&tags);
    form.open();
    form
  }

  fn type_title(form: &mut CreatePostForm, title: &str) {
    for c in title.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_closed_form_ignores_keys() {
    let mut form = CreatePostForm::new();
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }

  #[test]
  fn test_empty_submit_is_noop_and_stays_open() {
    let mut form = open_form(&["rust", "tui"]);
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(form.is_open());
  }

  #[test]
  fn test_title_without_tags_is_noop() {
    let mut form = open_form(&["rust", "tui"]);
    type_title(&mut form, "Hello");
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(form.is_open());
    assert_eq!(form.title(), "Hello");
  }

  #[test]
  fn test_tags_without_title_is_noop() {
    let mut form = open_form(&["rust"]);
    form.handle_key(key(KeyCode::Tab));
    form.handle_key(key(KeyCode::Char(' ')));
    assert_eq!(form.checked_tags(), vec!["rust"]);
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(form.is_open());
  }

  #[test]
  fn test_valid_submit_resets_and_closes() {
    let mut form = open_form(&["rust", "tui", "http"]);
    type_title(&mut form, "Hello");
    form.handle_key(key(KeyCode::Tab));
    // Check "http" then "rust"; result follows list order
    form.handle_key(key(KeyCode::Up));
    form.handle_key(key(KeyCode::Char(' ')));
    form.handle_key(key(KeyCode::Down));
    form.handle_key(key(KeyCode::Char(' ')));

    let result = form.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(FormEvent::Submitted(Submission {
        title: "Hello".to_string(),
        tags: vec!["rust".to_string(), "http".to_string()],
      }))
    );
    assert!(!form.is_open());
    assert_eq!(form.title(), "");
    assert!(form.checked_tags().is_empty());
  }

  #[test]
  fn test_j_and_k_type_into_title() {
    let mut form = open_form(&["rust"]);
    type_title(&mut form, "jk ");
    assert_eq!(form.title(), "jk ");
    assert!(form.checked_tags().is_empty());
  }

  #[test]
  fn test_escape_closes_without_reset() {
    let mut form = open_form(&["rust"]);
    type_title(&mut form, "draft");
    assert_eq!(
      form.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FormEvent::Closed)
    );
    assert!(!form.is_open());
    assert_eq!(form.title(), "draft");
  }

  fn render(form: &CreatePostForm, width: u16, height: u16) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("terminal");
    terminal
      .draw(|frame| form.render_overlay(frame, frame.area()))
      .expect("draw");
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn test_overlay_fits_very_wide_terminal() {
    let form = open_form(&["rust", "tui"]);
    let screen = render(&form, 1200, 30);
    assert!(screen.contains("Create Post"));
    assert!(screen.contains("[ ] rust"));
  }

  #[test]
  fn test_overlay_with_more_tags_than_rows() {
    let tags: Vec<String> = (0..70_000).map(|i| format!("t{}", i)).collect();
    let mut form = CreatePostForm::new();
    form.set_tags(&tags);
    form.open();
    let screen = render(&form, 80, 24);
    assert!(screen.contains("Create Post"));
  }

  #[test]
  fn test_set_tags_keeps_existing_checks() {
    let mut form = open_form(&["a", "b"]);
    form.handle_key(key(KeyCode::Tab));
    form.handle_key(key(KeyCode::Down));
    form.handle_key(key(KeyCode::Char(' ')));
    assert_eq!(form.checked_tags(), vec!["b"]);

    form.set_tags(&["b".to_string(), "c".to_string()]);
    assert_eq!(form.checked_tags(), vec!["b"]);
  }
}
