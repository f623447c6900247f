use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Header context for the current view
pub struct HeaderInfo<'a> {
  /// API host (and port)
  pub host: &'a str,
  pub context: &'a str,
  pub fetching: bool,
  pub shortcuts: &'a [ShortcutInfo],
}

/// Draw the header bar with logo, API host, view context, fetch indicator and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let mut spans = vec![
    Span::styled(" postboard ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", info.host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", info.context),
      Style::default().fg(Color::Yellow).bold(),
    ),
  ];
  if info.fetching {
    spans.push(Span::styled("⟳ ", Style::default().fg(Color::DarkGray)));
  }
  spans.push(Span::raw(" "));

  // Shortcuts - keys highlighted, descriptions dimmed, unavailable ones greyed out
  let mut shortcuts: Vec<&ShortcutInfo> = info.shortcuts.iter().collect();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    let (key_style, label_style) = if shortcut.enabled {
      (
        Style::default().fg(Color::Cyan),
        Style::default().fg(Color::DarkGray),
      )
    } else {
      let dimmed = Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM);
      (dimmed, dimmed)
    };
    spans.push(Span::raw("  "));
    spans.push(Span::styled(format!("<{}>", shortcut.key), key_style));
    spans.push(Span::styled(format!(" {}", shortcut.label), label_style));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::PostsApi;
  use ratatui::backend::TestBackend;
  use url::Url;

  #[test]
  fn test_header_shows_api_host() {
    let api = PostsApi::new(Url::parse("http://localhost:4000/api").expect("url"), 10).expect("api");
    let host = api.host();
    let shortcuts = [ShortcutInfo::new("c", "create")];
    let info = HeaderInfo {
      host: &host,
      context: "page 1/2",
      fetching: true,
      shortcuts: &shortcuts,
    };

    let mut terminal = Terminal::new(TestBackend::new(80, 1)).expect("terminal");
    terminal
      .draw(|frame| draw_header(frame, frame.area(), &info))
      .expect("draw");
    let line: String = terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect();

    assert!(line.contains(" localhost:4000 "));
    assert!(line.contains("page 1/2"));
    assert!(line.contains("<c> create"));
  }
}
