use ratatui::prelude::Color;

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

const TAG_COLORS: [Color; 6] = [
  Color::Cyan,
  Color::Green,
  Color::Yellow,
  Color::Magenta,
  Color::Blue,
  Color::LightRed,
];

/// Stable display color for a tag chip
pub fn tag_color(tag: &str) -> Color {
  let hash = tag
    .bytes()
    .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
  TAG_COLORS[hash % TAG_COLORS.len()]
}
