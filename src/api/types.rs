//! Serde types matching the posts API.

use serde::{Deserialize, Deserializer, Serialize};

/// A single post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub tags: Vec<String>,
}

/// One page of the post list with the neighbor links supplied by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "PageBody")]
pub struct Page {
  pub data: Vec<Post>,
  pub prev: Option<u32>,
  pub next: Option<u32>,
  /// Total number of pages, when the server reports it
  pub pages: Option<u32>,
  /// Total number of posts, when the server reports it
  pub items: Option<u64>,
}

impl Page {
  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn has_prev(&self) -> bool {
    self.prev.is_some()
  }

  pub fn has_next(&self) -> bool {
    self.next.is_some()
  }
}

/// `GET /posts` answers with an envelope when paging parameters are sent and
/// with a bare array otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageBody {
  Paged {
    #[serde(default)]
    data: Vec<Post>,
    prev: Option<u32>,
    next: Option<u32>,
    pages: Option<u32>,
    items: Option<u64>,
  },
  Flat(Vec<Post>),
}

impl From<PageBody> for Page {
  fn from(body: PageBody) -> Self {
    match body {
      PageBody::Paged {
        data,
        prev,
        next,
        pages,
        items,
      } => Page {
        data,
        prev,
        next,
        pages,
        items,
      },
      PageBody::Flat(data) => Page {
        items: Some(data.len() as u64),
        data,
        ..Page::default()
      },
    }
  }
}

/// Ids come back as numbers for posts we created and as numeric strings for
/// posts the server assigned.
fn deserialize_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Number(u64),
    Text(String),
  }

  match RawId::deserialize(deserializer)? {
    RawId::Number(n) => Ok(n),
    RawId::Text(s) => s
      .trim()
      .parse()
      .map_err(|_| serde::de::Error::custom(format!("invalid post id '{}'", s))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_paged_envelope() {
    let json = r#"{
      "first": 1, "prev": null, "next": 2, "last": 3, "pages": 3, "items": 25,
      "data": [{"id": "25", "title": "Hello", "tags": ["rust", "tui"]}]
    }"#;
    let page: Page = serde_json::from_str(json).expect("page");
    assert_eq!(page.prev, None);
    assert_eq!(page.next, Some(2));
    assert_eq!(page.pages, Some(3));
    assert_eq!(page.items, Some(25));
    assert_eq!(page.data[0].id, 25);
    assert_eq!(page.data[0].tags, vec!["rust", "tui"]);
    assert!(!page.has_prev());
    assert!(page.has_next());
  }

  #[test]
  fn test_flat_array_has_no_neighbors() {
    let json = r#"[{"id": 2, "title": "b", "tags": []}, {"id": 1, "title": "a", "tags": ["x"]}]"#;
    let page: Page = serde_json::from_str(json).expect("page");
    assert_eq!(page.len(), 2);
    assert_eq!(page.prev, None);
    assert_eq!(page.next, None);
    assert_eq!(page.items, Some(2));
  }

  #[test]
  fn test_non_numeric_id_rejected() {
    let json = r#"{"id": "abc", "title": "a", "tags": []}"#;
    assert!(serde_json::from_str::<Post>(json).is_err());
  }

  #[test]
  fn test_post_serializes_numeric_id() {
    let post = Post {
      id: 4,
      title: "New".to_string(),
      tags: vec!["rust".to_string()],
    };
    let value = serde_json::to_value(&post).expect("json");
    assert_eq!(
      value,
      serde_json::json!({"id": 4, "title": "New", "tags": ["rust"]})
    );
  }
}
