/*!
The embedding application's entry point: binds a listener, dials outbound
peers, and forwards bundles to whichever session currently owns their
destination EID.

This crate has no opinion on routing beyond "do we have a live session
claiming this EID"; a richer agent that needs next-hop resolution drives
[`Layer::dial`] itself and lets the session registry take it from there.
*/

use crate::config::Config;
use crate::connect;
use crate::connection::ConnectionRegistry;
use crate::listen::Listener;
use crate::negotiate;
use crate::transport::Error as TransportError;
use dtncore_bpv7::{Bundle, Eid};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::bytes::Bytes;

/// Receives bundles reassembled by an established session, in the order
/// their transfers complete.
///
/// A handler that panics does not bring the session down:
/// [`Session`](crate::session::Session) catches the unwind and logs it —
/// dispatch failures are the caller's problem, not the protocol's.
#[async_trait::async_trait]
pub trait BundleHandler: Send + Sync {
    async fn handle(&self, bundle: Bytes);
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("no established session claims destination {0}")]
    NoRoute(Eid),

    #[error(transparent)]
    Bundle(#[from] dtncore_bpv7::Error),
}

/// Owns the listening endpoint and the registry of established TCPCLv4
/// sessions.
pub struct Layer {
    config: Config,
    local_eid: Option<Eid>,
    handler: Arc<dyn BundleHandler>,
    registry: Arc<ConnectionRegistry>,
    cancel_token: tokio_util::sync::CancellationToken,
    tasks: Mutex<tokio::task::JoinSet<()>>,
}

impl Layer {
    pub fn new(config: Config, local_eid: Option<Eid>, handler: Arc<dyn BundleHandler>) -> Arc<Self> {
        Arc::new(Self {
            config,
            local_eid,
            handler,
            registry: Arc::new(ConnectionRegistry::new()),
            cancel_token: tokio_util::sync::CancellationToken::new(),
            tasks: Mutex::new(tokio::task::JoinSet::new()),
        })
    }

    fn negotiate_context(&self) -> negotiate::Context {
        negotiate::Context {
            session: self.config.session_defaults.clone(),
            segment_mru: self.config.segment_mru,
            transfer_mru: self.config.transfer_mru,
            local_eid: self.local_eid.clone(),
            handler: self.handler.clone(),
            registry: self.registry.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }

    /// Binds `config.address` and spawns the accept loop in the
    /// background. Returns the address actually bound (useful when the
    /// configured port is 0).
    pub async fn listen(self: &Arc<Self>) -> std::io::Result<SocketAddr> {
        let listener = Listener::bind(self.config.address, self.config.connection_rate_limit, self.negotiate_context()).await?;
        let local_addr = listener.local_addr();
        self.tasks.lock().await.spawn(listener.run());
        Ok(local_addr)
    }

    /// Dials `remote_addr` and runs the resulting session in the
    /// background, registering it under the peer's advertised node id.
    pub async fn dial(self: &Arc<Self>, remote_addr: SocketAddr) -> Result<(), TransportError> {
        connect::dial(self.negotiate_context(), remote_addr).await
    }

    /// Encodes `bundle` and hands it to the session claiming its
    /// destination EID. Returns [`Error::NoRoute`] if no session has
    /// announced ownership of that EID; callers that want next-hop
    /// resolution should `dial` first.
    pub async fn send_bundle(self: &Arc<Self>, bundle: &Bundle) -> Result<(), Error> {
        let destination = bundle.primary.destination.clone();
        let payload = Bytes::from(bundle.encode()?);

        let Some(addr) = self.registry.resolve(&destination).await else {
            return Err(Error::NoRoute(destination));
        };

        self.registry.send_to_addr(&addr, payload).await.map_err(|_| Error::NoRoute(destination))
    }

    /// Cancels every running session, closes the listener, and drains the
    /// registry. Returns once all spawned tasks have exited.
    pub async fn stop(self: &Arc<Self>) {
        self.cancel_token.cancel();
        self.registry.shutdown().await;

        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer").field("config", &self.config).field("local_eid", &self.local_eid).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(AtomicUsize);

    #[async_trait::async_trait]
    impl BundleHandler for CountingHandler {
        async fn handle(&self, _bundle: Bytes) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn send_bundle_without_a_session_fails_with_no_route() {
        let layer = Layer::new(Config::default(), None, Arc::new(CountingHandler(AtomicUsize::new(0))));
        let bundle = Bundle::create(
            Eid::Ipn { node: 2, service: 1 },
            Eid::Ipn { node: 1, service: 1 },
            b"hello".to_vec(),
            1000,
            None,
            None,
        )
        .unwrap();

        let err = layer.send_bundle(&bundle).await.unwrap_err();
        assert!(matches!(err, Error::NoRoute(_)));
    }

    #[tokio::test]
    async fn two_peers_exchange_a_bundle_end_to_end() {
        let server_handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let mut server_config = Config::default();
        server_config.address = "127.0.0.1:0".parse().unwrap();
        let server = Layer::new(server_config, Some(Eid::Ipn { node: 2, service: 0 }), server_handler.clone());
        let bound_addr = server.listen().await.unwrap();

        let client = Layer::new(Config::default(), Some(Eid::Ipn { node: 1, service: 0 }), Arc::new(CountingHandler(AtomicUsize::new(0))));
        client.dial(bound_addr).await.unwrap();

        // Give the session negotiation a moment to register the connection.
        let peer = Eid::Ipn { node: 2, service: 0 };
        for _ in 0..50 {
            if client.registry.resolve(&peer).await.is_some() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }

        let bundle = Bundle::create(peer, Eid::Ipn { node: 1, service: 0 }, b"Hello, DTN!".to_vec(), 3_600_000, None, None).unwrap();
        client.send_bundle(&bundle).await.unwrap();

        for _ in 0..50 {
            if server_handler.0.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }
        assert_eq!(server_handler.0.load(Ordering::SeqCst), 1);

        client.stop().await;
        server.stop().await;
    }
}
