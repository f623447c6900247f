use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::query::{QueryClient, QueryEvent};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and mutation polling
  Tick,
  /// A query cache entry changed state
  Query(QueryEvent),
}

/// Event handler that multiplexes terminal input, a tick timer and query
/// cache notifications onto one channel
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll/read block, keep them off the async workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if key.kind == KeyEventKind::Press && input_tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input_tx.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Forward every cache notification of `client` into this handler
  pub fn forward_queries(&self, client: &QueryClient) {
    let mut updates = client.subscribe();
    let tx = self.tx.clone();

    tokio::spawn(async move {
      loop {
        match updates.recv().await {
          Ok(update) => {
            if tx.send(Event::Query(update)).is_err() {
              break;
            }
          }
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(skipped, "query notifications lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
