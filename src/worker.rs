//! Worker entry point: owns the cache manager and dispatches host events.

use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cache::{CacheManager, CacheStorage};
use crate::config::Config;
use crate::events::{HostEvent, HostSignal};
use crate::fetch::Fetch;
use crate::manifest::Manifest;

/// The worker's entry point.
///
/// Handlers are bound at construction; there is no ambient global listener
/// state. The host drives the worker by sending [`HostEvent`]s and observes
/// [`HostSignal`]s on the channel handed in here.
pub struct Worker<S, F> {
  manager: CacheManager<S, F>,
  signals: mpsc::UnboundedSender<HostSignal>,
}

impl<S: CacheStorage + 'static, F: Fetch> Worker<S, F> {
  /// Build a worker from deployment configuration and host capabilities.
  pub fn new(
    config: &Config,
    storage: S,
    fetcher: F,
    signals: mpsc::UnboundedSender<HostSignal>,
  ) -> Result<Self> {
    let manifest = Manifest::resolve(&config.scope, &config.manifest)?;
    let manager = CacheManager::new(
      storage,
      fetcher,
      config.generation_tag.clone(),
      manifest,
      config.policy,
    );
    Ok(Self { manager, signals })
  }

  /// Access the underlying cache manager.
  pub fn manager(&self) -> &CacheManager<S, F> {
    &self.manager
  }

  /// Consume host events until the channel closes.
  ///
  /// Install and activate run to completion before the next event is
  /// taken; that is the explicit "wait for this work" acknowledgment the
  /// host expects on each lifecycle event.
  pub async fn run(&self, mut events: mpsc::UnboundedReceiver<HostEvent>) -> Result<()> {
    while let Some(event) = events.recv().await {
      match event {
        HostEvent::Install => self.handle_install().await,
        HostEvent::Activate => self.handle_activate(),
        HostEvent::Fetch {
          request,
          respond_to,
        } => {
          let result = self.manager.handle_fetch(&request).await;
          if respond_to.send(result).is_err() {
            warn!("fetch response dropped: host went away");
          }
        }
      }
    }
    Ok(())
  }

  async fn handle_install(&self) {
    // Activate immediately once installed, no transition delay
    self.signal(HostSignal::SkipWaiting);

    let report = self.manager.install().await;
    if !report.failed {
      info!(cached = report.cached, "install complete");
    }
  }

  fn handle_activate(&self) {
    // Take over open pages before cleanup starts
    self.signal(HostSignal::ClaimClients);

    if let Err(err) = self.manager.activate() {
      warn!(error = %err, "failed to clean stale generations");
    }
  }

  fn signal(&self, signal: HostSignal) {
    if self.signals.send(signal).is_err() {
      warn!(?signal, "host signal channel closed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::config::RoutingPolicy;
  use crate::fetch::mock::MockFetcher;
  use crate::http::{Request, Response, ResponseType};
  use std::sync::Arc;
  use tokio::sync::oneshot;
  use url::Url;

  fn config() -> Config {
    Config {
      generation_tag: "roleta-iap-cache-v1.0.3".to_string(),
      scope: Url::parse("https://roleta-iap.example/").unwrap(),
      manifest: vec!["./".to_string(), "./index.html".to_string()],
      policy: RoutingPolicy::SplitByType,
    }
  }

  fn basic(body: &str) -> Response {
    Response {
      status: 200,
      kind: ResponseType::Basic,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  fn spawn_worker(
    worker: Worker<MemoryStorage, MockFetcher>,
  ) -> (
    Arc<Worker<MemoryStorage, MockFetcher>>,
    mpsc::UnboundedSender<HostEvent>,
  ) {
    let worker = Arc::new(worker);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let runner = Arc::clone(&worker);
    tokio::spawn(async move { runner.run(events_rx).await });
    (worker, events_tx)
  }

  /// Send a fetch event and await its response, which also guarantees
  /// every earlier event finished (the run loop is strictly in order).
  async fn fetch_via(
    events: &mpsc::UnboundedSender<HostEvent>,
    request: Request,
  ) -> Result<Response> {
    let (tx, rx) = oneshot::channel();
    events
      .send(HostEvent::Fetch {
        request,
        respond_to: tx,
      })
      .unwrap();
    rx.await.unwrap()
  }

  #[tokio::test]
  async fn install_signals_skip_waiting_and_populates_the_store() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter("precache=debug")
      .with_test_writer()
      .try_init();

    let (signals_tx, mut signals_rx) = mpsc::unbounded_channel();
    let fetcher = MockFetcher::new();
    for entry in [
      "https://roleta-iap.example/",
      "https://roleta-iap.example/index.html",
    ] {
      fetcher.respond_with(&Url::parse(entry).unwrap(), basic(entry));
    }
    let probe = Url::parse("https://roleta-iap.example/app.js").unwrap();
    fetcher.respond_with(&probe, basic("probe"));

    let worker = Worker::new(&config(), MemoryStorage::new(), fetcher, signals_tx).unwrap();
    let (worker, events) = spawn_worker(worker);

    events.send(HostEvent::Install).unwrap();
    assert_eq!(signals_rx.recv().await, Some(HostSignal::SkipWaiting));

    // Once the probe resolves, installation is done
    fetch_via(&events, Request::get(probe)).await.unwrap();

    // With the network gone, a navigation is served from the installed cache
    worker.manager().fetcher().set_offline(true);
    let page = Url::parse("https://roleta-iap.example/index.html").unwrap();
    let response = fetch_via(&events, Request::navigation(page)).await.unwrap();
    assert_eq!(response.body, b"https://roleta-iap.example/index.html");
  }

  #[tokio::test]
  async fn activate_signals_claim_and_evicts_stale_generations() {
    let (signals_tx, mut signals_rx) = mpsc::unbounded_channel();
    let worker = Worker::new(
      &config(),
      MemoryStorage::new(),
      MockFetcher::new(),
      signals_tx,
    )
    .unwrap();

    let stale = Url::parse("https://roleta-iap.example/index.html").unwrap();
    // Seed a stale generation directly through the storage trait
    worker
      .manager()
      .storage()
      .put("roleta-iap-cache-v1.0.2", &stale, &basic("old"))
      .unwrap();

    let (worker, events) = spawn_worker(worker);
    events.send(HostEvent::Activate).unwrap();

    assert_eq!(signals_rx.recv().await, Some(HostSignal::ClaimClients));

    // Drain through a fetch to make sure activation finished
    let _ = fetch_via(&events, Request::get(stale)).await;

    assert_eq!(
      worker.manager().storage().tags().unwrap(),
      Vec::<String>::new()
    );
  }

  #[tokio::test]
  async fn fetch_events_resolve_through_the_oneshot_channel() {
    let (signals_tx, _signals_rx) = mpsc::unbounded_channel();
    let fetcher = MockFetcher::new();
    let asset = Url::parse("https://roleta-iap.example/app.js").unwrap();
    fetcher.respond_with(&asset, basic("fresh"));

    let worker = Worker::new(&config(), MemoryStorage::new(), fetcher, signals_tx).unwrap();
    let (_worker, events) = spawn_worker(worker);

    let response = fetch_via(&events, Request::get(asset)).await.unwrap();
    assert_eq!(response.body, b"fresh");
  }
}
