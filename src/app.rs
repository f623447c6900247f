use crate::api::PostsApi;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::QueryClient;
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::PostListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::info;

/// Main application state
pub struct App {
  /// Query cache shared by every view
  client: QueryClient,

  /// The post list, the only view
  view: Box<dyn View>,

  /// Application configuration
  config: Config,

  /// API host shown in the header
  host: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api = PostsApi::new(config.api_url()?, config.api.per_page)?;
    let client = QueryClient::new();
    let host = api.host();
    let view = Box::new(PostListView::new(client.clone(), api, &config));

    Ok(Self {
      client,
      view,
      config,
      host,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    events.forward_queries(&self.client);
    info!(url = %self.config.api.url, "started");

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self.view.as_mut(), &self.host))?;

      // Handle events
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.view.tick(),
      Event::Query(event) => self.view.handle_query_event(&event),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    // Ctrl-C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      self.should_quit = true;
      return;
    }

    match self.view.handle_key(key) {
      ViewAction::Quit => self.should_quit = true,
      ViewAction::None => {}
    }
  }
}
