//! Explicit request and response models for intercepted traffic.

use url::Url;

/// How a request was initiated by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Full-page navigation
  Navigate,
  SameOrigin,
  Cors,
  NoCors,
}

/// What kind of resource a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
  /// The top-level document
  Document,
  Script,
  Style,
  Image,
  Font,
  Other,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: Url,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl Request {
  /// A plain subresource request (scripts, styles, images).
  pub fn get(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::NoCors,
      destination: Destination::Other,
    }
  }

  /// A full-page navigation request.
  pub fn navigation(url: Url) -> Self {
    Self {
      url,
      mode: RequestMode::Navigate,
      destination: Destination::Document,
    }
  }
}

/// Origin classification of a response, mirroring the host's
/// basic/cors/opaque tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
  /// Same-origin response; eligible for caching
  Basic,
  /// Cross-origin response obtained with CORS
  Cors,
  /// Cross-origin response with no visible metadata
  Opaque,
  /// Network-level failure surfaced as a response
  Error,
}

impl ResponseType {
  /// Stable identifier used by storage backends.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Basic => "basic",
      Self::Cors => "cors",
      Self::Opaque => "opaque",
      Self::Error => "error",
    }
  }

  /// Inverse of [`ResponseType::as_str`].
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "basic" => Some(Self::Basic),
      "cors" => Some(Self::Cors),
      "opaque" => Some(Self::Opaque),
      "error" => Some(Self::Error),
      _ => None,
    }
  }
}

/// A response with enough metadata to decide cacheability.
///
/// Cloning takes a full copy of the body, which is what the cache write
/// path needs: the original goes back to the caller, the copy to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub kind: ResponseType,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl Response {
  /// Only successful same-origin responses are eligible for caching.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.kind == ResponseType::Basic
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(status: u16, kind: ResponseType) -> Response {
    Response {
      status,
      kind,
      content_type: None,
      body: Vec::new(),
    }
  }

  #[test]
  fn only_basic_200_is_cacheable() {
    assert!(response(200, ResponseType::Basic).is_cacheable());
    assert!(!response(200, ResponseType::Cors).is_cacheable());
    assert!(!response(200, ResponseType::Opaque).is_cacheable());
    assert!(!response(404, ResponseType::Basic).is_cacheable());
    assert!(!response(301, ResponseType::Basic).is_cacheable());
  }

  #[test]
  fn response_type_round_trips_through_storage_identifier() {
    for kind in [
      ResponseType::Basic,
      ResponseType::Cors,
      ResponseType::Opaque,
      ResponseType::Error,
    ] {
      assert_eq!(ResponseType::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(ResponseType::parse("bogus"), None);
  }
}
