//! Typed lifecycle events exchanged with the hosting runtime.

use color_eyre::Result;
use tokio::sync::oneshot;

use crate::http::{Request, Response};

/// Lifecycle event delivered by the host.
#[derive(Debug)]
pub enum HostEvent {
  /// The worker was just installed; pre-cache the manifest
  Install,
  /// This worker generation took over; evict stale generations
  Activate,
  /// An intercepted request; the response goes back through the channel
  Fetch {
    request: Request,
    respond_to: oneshot::Sender<Result<Response>>,
  },
}

/// Control signal sent back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
  /// Skip any transition delay and activate immediately
  SkipWaiting,
  /// Take control of already-open pages without waiting for a reload
  ClaimClients,
}
