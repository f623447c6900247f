use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line text field. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
}

impl TextInput {
  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  /// Cursor position in characters, for rendering
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  fn byte_index(&self, chars: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(chars)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  fn len(&self) -> usize {
    self.buffer.chars().count()
  }

  /// Apply an editing key. Returns false for keys that are not edits
  /// (Enter, Esc, Tab, ...), leaving them to the caller.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
      }
      KeyCode::Delete => {
        if self.cursor < self.len() {
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
      }
      KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
      KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
      KeyCode::Home => self.cursor = 0,
      KeyCode::End => self.cursor = self.len(),
      KeyCode::Char('a') if ctrl => self.cursor = 0,
      KeyCode::Char('e') if ctrl => self.cursor = self.len(),
      KeyCode::Char('u') if ctrl => {
        // Clear line before cursor
        let at = self.byte_index(self.cursor);
        self.buffer.replace_range(..at, "");
        self.cursor = 0;
      }
      KeyCode::Char(_) if ctrl => return false,
      KeyCode::Char(c) => {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
      }
      _ => return false,
    }
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_typing_and_backspace() {
    let mut input = TextInput::default();
    type_str(&mut input, "abc");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "ab");
    assert_eq!(input.cursor(), 2);
  }

  #[test]
  fn test_insert_at_cursor_with_multibyte_chars() {
    let mut input = TextInput::default();
    type_str(&mut input, "héo");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Char('l')));
    assert_eq!(input.value(), "hélo");
    input.handle_key(key(KeyCode::Home));
    input.handle_key(key(KeyCode::Delete));
    assert_eq!(input.value(), "élo");
  }

  #[test]
  fn test_ctrl_u_clears_before_cursor() {
    let mut input = TextInput::default();
    type_str(&mut input, "hello world");
    for _ in 0..5 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
    assert_eq!(input.cursor(), 0);
  }

  #[test]
  fn test_non_edit_keys_are_passed_on() {
    let mut input = TextInput::default();
    assert!(!input.handle_key(key(KeyCode::Enter)));
    assert!(!input.handle_key(key(KeyCode::Esc)));
    assert!(!input.handle_key(key(KeyCode::Tab)));
    assert!(!input.handle_key(ctrl_key(KeyCode::Char('c'))));
  }

  #[test]
  fn test_clear() {
    let mut input = TextInput::default();
    type_str(&mut input, "x");
    input.clear();
    assert_eq!(input.value(), "");
    assert_eq!(input.cursor(), 0);
  }
}
