use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::error::ApiError;
use super::types::{Page, Post};

/// Posts API client
#[derive(Clone, Debug)]
pub struct PostsApi {
  http: Client,
  base: Url,
  per_page: u32,
}

impl PostsApi {
  pub fn new(base: Url, per_page: u32) -> Result<Self, ApiError> {
    let http = Client::builder()
      .user_agent(concat!("postboard/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|source| ApiError::Transport {
        resource: "client",
        source,
      })?;

    // Make sure relative joins land under the base path
    let base = if base.path().ends_with('/') {
      base
    } else {
      let path = format!("{}/", base.path());
      let mut base = base;
      base.set_path(&path);
      base
    };

    Ok(Self {
      http,
      base,
      per_page,
    })
  }

  /// Host (and port) the client talks to, for display
  pub fn host(&self) -> String {
    match (self.base.host_str(), self.base.port()) {
      (Some(host), Some(port)) => format!("{}:{}", host, port),
      (Some(host), None) => host.to_string(),
      _ => self.base.to_string(),
    }
  }

  /// URL for listing posts, newest first. Paging parameters are only added
  /// when a page is requested.
  pub fn posts_url(&self, page: Option<u32>) -> Result<Url, ApiError> {
    let mut url = self.base.join("posts")?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("_sort", "-id");
      if let Some(page) = page {
        query.append_pair("_page", &page.to_string());
        query.append_pair("_per_page", &self.per_page.to_string());
      }
    }
    Ok(url)
  }

  /// List one page of posts (or every post when `page` is None)
  pub async fn list_posts(&self, page: Option<u32>) -> Result<Page, ApiError> {
    let url = self.posts_url(page)?;
    debug!(%url, "listing posts");
    let response = self.send("posts", self.http.get(url)).await?;
    decode("posts", response).await
  }

  /// List every known tag
  pub async fn list_tags(&self) -> Result<Vec<String>, ApiError> {
    let url = self.base.join("tags")?;
    debug!(%url, "listing tags");
    let response = self.send("tags", self.http.get(url)).await?;
    decode("tags", response).await
  }

  /// Create a post, returning the server's representation of it
  pub async fn create_post(&self, post: &Post) -> Result<Post, ApiError> {
    let url = self.base.join("posts")?;
    debug!(%url, id = post.id, "creating post");
    let response = self.send("post", self.http.post(url).json(post)).await?;
    decode("post", response).await
  }

  async fn send(
    &self,
    resource: &'static str,
    request: reqwest::RequestBuilder,
  ) -> Result<Response, ApiError> {
    let transport = |source| ApiError::Transport { resource, source };
    let request = request.build().map_err(transport)?;
    let method = request.method().clone();
    let response = self.http.execute(request).await.map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
      warn!(resource, %method, status = status.as_u16(), "request failed");
      return Err(if method == Method::GET {
        ApiError::Status { resource, status }
      } else {
        ApiError::Rejected { resource, status }
      });
    }
    Ok(response)
  }
}

async fn decode<T: DeserializeOwned>(
  resource: &'static str,
  response: Response,
) -> Result<T, ApiError> {
  response
    .json::<T>()
    .await
    .map_err(|source| ApiError::Decode { resource, source })
}
