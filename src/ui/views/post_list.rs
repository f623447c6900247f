use crate::api::{ApiError, Page, Post, PostsApi};
use crate::config::Config;
use crate::pagination::Pagination;
use crate::query::{
  Mutation, MutationState, QueryClient, QueryEvent, QueryFilter, QueryKey, QueryObserver,
  QueryOptions, QueryResult, StaleTime,
};
use crate::ui::components::{CreatePostForm, FormEvent, KeyResult, Submission};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{tag_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use futures::future::{BoxFuture, FutureExt};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::info;

/// Shown when creating a post failed after every retry
const CREATE_FAILED: &str = "Something went wrong while creating the post.";

fn posts_key(page: u32) -> QueryKey {
  QueryKey::new("posts").with_param("page", page)
}

fn tags_key() -> QueryKey {
  QueryKey::new("tags")
}

fn posts_fetcher(
  api: &PostsApi,
  page: u32,
) -> impl Fn() -> BoxFuture<'static, Result<Page, ApiError>> + Send + Sync + 'static {
  let api = api.clone();
  move || {
    let api = api.clone();
    async move { api.list_posts(Some(page)).await }.boxed()
  }
}

/// Paginated post list with a "Create Post" modal
pub struct PostListView {
  api: PostsApi,
  pagination: Pagination,
  posts: QueryObserver<Page>,
  tags: QueryObserver<Vec<String>>,
  create: Mutation<Post, Post>,
  form: CreatePostForm,
  list_state: ListState,
}

impl PostListView {
  pub fn new(client: QueryClient, api: PostsApi, config: &Config) -> Self {
    let pagination = Pagination::new();

    let mut posts = QueryObserver::new(
      client.clone(),
      posts_key(pagination.page()),
      QueryOptions {
        stale_time: StaleTime::After(config.posts_stale_time()),
        keep_previous_data: config.queries.keep_previous_page,
      },
      posts_fetcher(&api, pagination.page()),
    );

    // The tag set never changes during a session
    let tags_api = api.clone();
    let mut tags = QueryObserver::new(
      client.clone(),
      tags_key(),
      QueryOptions {
        stale_time: StaleTime::Never,
        keep_previous_data: false,
      },
      move || {
        let api = tags_api.clone();
        async move { api.list_tags().await }
      },
    );

    let create_api = api.clone();
    let create = Mutation::new(client, move |post: Post| {
      let api = create_api.clone();
      async move { api.create_post(&post).await }
    })
    .with_retry(config.retry_policy())
    .invalidates(QueryFilter::resource("posts"));

    // Start fetching immediately
    posts.fetch();
    tags.fetch();

    Self {
      api,
      pagination,
      posts,
      tags,
      create,
      form: CreatePostForm::new(),
      list_state: ListState::default(),
    }
  }

  fn current(&self) -> QueryResult<Page> {
    self.posts.result()
  }

  /// Point the posts observer at the page pagination currently names
  fn follow_page(&mut self) {
    let page = self.pagination.page();
    self
      .posts
      .set_key(posts_key(page), posts_fetcher(&self.api, page));
    self.list_state.select(Some(0));
  }

  fn open_form(&mut self) {
    if let Some(tags) = self.tags.result().data() {
      self.form.set_tags(tags);
    }
    self.form.open();
  }

  /// Build the post from a valid form submission and start the mutation.
  /// The form has already reset and closed itself.
  fn submit(&mut self, submission: Submission) {
    let page_len = self.current().data().map_or(0, Page::len);
    let post = build_post(submission, page_len);

    // A read of this page landing after the write would show pre-write data
    self
      .create
      .cancel_on_mutate(QueryFilter::exact(posts_key(self.pagination.page())));
    info!(id = post.id, title = %post.title, "creating post");
    self.create.mutate(post);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, current: &QueryResult<Page>) {
    let posts: &[Post] = current.data().map(|p| p.data.as_slice()).unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, posts.len());

    let title = match current.data().and_then(|p| p.items) {
      Some(items) => format!(" Posts ({}) ", items),
      None => " Posts ".to_string(),
    };
    let border = if current.is_placeholder {
      Color::DarkGray
    } else {
      Color::Blue
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    if posts.is_empty() {
      let content = if current.is_loading() {
        "Loading..."
      } else if current.is_error() {
        "Failed to load posts. Press 'r' to retry."
      } else {
        "No posts yet. Press 'c' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = posts
      .iter()
      .map(|post| {
        let mut spans = vec![
          Span::styled(format!("#{:<5}", post.id), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::raw(truncate(&post.title, 60)),
        ];
        for tag in &post.tags {
          spans.push(Span::raw(" "));
          spans.push(Span::styled(
            format!("[{}]", tag),
            Style::default().fg(tag_color(tag)),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_status(&self, frame: &mut Frame, area: Rect, current: &QueryResult<Page>) {
    let (content, style) = match (self.create.state(), current) {
      (MutationState::Error(_), _) => (CREATE_FAILED.to_string(), Style::default().fg(Color::Red)),
      (_, c) if c.is_error() => (
        c.error.clone().unwrap_or_default(),
        Style::default().fg(Color::Red),
      ),
      (MutationState::Pending { attempt }, _) if *attempt > 1 => (
        format!("Creating post... (attempt {})", attempt),
        Style::default().fg(Color::Yellow),
      ),
      (MutationState::Pending { .. }, _) => (
        "Creating post...".to_string(),
        Style::default().fg(Color::Yellow),
      ),
      (_, c) if c.is_loading() || c.is_placeholder => {
        ("Loading...".to_string(), Style::default().fg(Color::DarkGray))
      }
      (_, c) => match c.updated_at {
        Some(at) => (
          format!("Updated {}", at.with_timezone(&chrono::Local).format("%H:%M:%S")),
          Style::default().fg(Color::DarkGray),
        ),
        None => (String::new(), Style::default()),
      },
    };

    frame.render_widget(Paragraph::new(format!(" {}", content)).style(style), area);
  }

  fn render_pagination(&self, frame: &mut Frame, area: Rect, current: &QueryResult<Page>) {
    let button = |label: &'static str, enabled: bool| {
      if enabled {
        Span::styled(label, Style::default().fg(Color::Cyan).bold())
      } else {
        Span::styled(
          label,
          Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )
      }
    };

    let line = Line::from(vec![
      button("◀ Previous", self.pagination.can_previous(current)),
      Span::styled(
        format!("   {}   ", self.pagination.page()),
        Style::default().fg(Color::White),
      ),
      button("Next ▶", self.pagination.can_next(current)),
    ]);

    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
  }
}

/// The post sent to the server. The id is a tentative guess from the current
/// page length and may collide with an existing post.
fn build_post(submission: Submission, page_len: usize) -> Post {
  Post {
    id: page_len as u64 + 1,
    title: submission.title,
    tags: submission.tags,
  }
}

impl View for PostListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    // Let the modal handle keys first while open
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted(submission)) => {
        self.submit(submission);
        return ViewAction::None;
      }
      KeyResult::Event(FormEvent::Closed) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('h') | KeyCode::Left => {
        let current = self.current();
        if self.pagination.previous(&current) {
          self.follow_page();
        }
      }
      KeyCode::Char('l') | KeyCode::Right => {
        let current = self.current();
        if self.pagination.next(&current) {
          self.follow_page();
        }
      }
      KeyCode::Char('r') => {
        // Refresh
        self.posts.refetch();
        if self.tags.result().is_error() {
          self.tags.refetch();
        }
      }
      KeyCode::Char('c') => self.open_form(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Quit,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(3),    // Posts
        Constraint::Length(1), // Status line
        Constraint::Length(1), // Pagination
      ])
      .split(area);

    let current = self.current();
    self.render_list(frame, chunks[0], &current);
    self.render_status(frame, chunks[1], &current);
    self.render_pagination(frame, chunks[2], &current);

    self.form.render_overlay(frame, area);
  }

  fn context(&self) -> String {
    let page = self.pagination.page();
    let current = self.current();
    match current.data().and_then(|p| p.pages) {
      Some(pages) if !current.is_placeholder => format!("page {}/{}", page, pages),
      _ => format!("page {}", page),
    }
  }

  fn is_fetching(&self) -> bool {
    self.posts.result().is_fetching || self.tags.result().is_fetching || self.create.state().is_pending()
  }

  fn tick(&mut self) {
    if self.create.poll() && !self.create.state().is_pending() {
      // The page read may have been cancelled when the mutation started
      self.posts.fetch();
    }
  }

  fn handle_query_event(&mut self, event: &QueryEvent) {
    self.posts.handle_event(event);
    if self.tags.handle_event(event) {
      if let Some(tags) = self.tags.result().data() {
        self.form.set_tags(tags);
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let current = self.current();
    vec![
      ShortcutInfo::new("c", "create").with_priority(10),
      ShortcutInfo::new("h", "prev")
        .with_priority(20)
        .enabled(self.pagination.can_previous(&current)),
      ShortcutInfo::new("l", "next")
        .with_priority(30)
        .enabled(self.pagination.can_next(&current)),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "quit").with_priority(100),
    ]
  }
}
