//! Network fetch primitive and its reqwest-backed implementation.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use url::Url;

use crate::http::{Request, Response, ResponseType};

/// Live network fetch capability supplied to the cache manager.
///
/// Transport failures are errors; HTTP error statuses are still responses.
pub trait Fetch: Send + Sync {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response>>;
}

/// Fetcher backed by a shared reqwest client.
///
/// Responses whose final URL shares the worker scope's origin are tagged
/// `Basic`, everything else `Cors`. No explicit timeouts are configured;
/// the client's defaults apply.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  scope: Url,
}

impl HttpFetcher {
  pub fn new(scope: Url) -> Self {
    Self {
      client: reqwest::Client::new(),
      scope,
    }
  }

  fn classify(&self, response_url: &Url) -> ResponseType {
    if response_url.origin() == self.scope.origin() {
      ResponseType::Basic
    } else {
      ResponseType::Cors
    }
  }
}

impl Fetch for HttpFetcher {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response>> {
    async move {
      let resp = self
        .client
        .get(request.url.clone())
        .send()
        .await
        .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

      let status = resp.status().as_u16();
      let kind = self.classify(resp.url());
      let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      let body = resp
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body from {}: {}", request.url, e))?
        .to_vec();

      Ok(Response {
        status,
        kind,
        content_type,
        body,
      })
    }
    .boxed()
  }
}
