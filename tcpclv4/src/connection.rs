/*!
Tracks established sessions by peer address, and resolves a destination EID
to whichever address last announced ownership of it.

This is deliberately simpler than a connection pool: one TCP connection per
peer address is all this crate maintains, so "forward to this session" is
just a map lookup plus a bounded channel send.
*/

use crate::session::OutboundItem;
use dtncore_bpv7::Eid;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::{Mutex, mpsc};
use tokio_util::bytes::Bytes;

pub type SessionTx = mpsc::Sender<OutboundItem>;

struct Entry {
    tx: SessionTx,
    eid: Option<Eid>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<SocketAddr, Entry>>,
    peers: Mutex<HashMap<Eid, SocketAddr>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, remote_addr: SocketAddr, eid: Option<Eid>, tx: SessionTx) {
        if let Some(eid) = &eid {
            self.peers.lock().await.insert(eid.clone(), remote_addr);
        }
        self.sessions.lock().await.insert(remote_addr, Entry { tx, eid });
    }

    pub async fn unregister(&self, remote_addr: &SocketAddr) {
        if let Some(entry) = self.sessions.lock().await.remove(remote_addr) {
            if let Some(eid) = entry.eid {
                let mut peers = self.peers.lock().await;
                if peers.get(&eid) == Some(remote_addr) {
                    peers.remove(&eid);
                }
            }
        }
    }

    /// Looks up the address of an established session claiming `eid`.
    pub async fn resolve(&self, eid: &Eid) -> Option<SocketAddr> {
        self.peers.lock().await.get(eid).copied()
    }

    /// Hands `bundle` to the session at `remote_addr`, if one exists, and
    /// waits for it to report whether the transfer succeeded. Returns the
    /// bundle back to the caller on any failure so it can be retried or
    /// routed elsewhere.
    pub async fn send_to_addr(&self, remote_addr: &SocketAddr, bundle: Bytes) -> Result<(), Bytes> {
        let Some(tx) = self.sessions.lock().await.get(remote_addr).map(|e| e.tx.clone()) else {
            return Err(bundle);
        };

        let (result, rx) = tokio::sync::oneshot::channel();
        if tx.send(OutboundItem { bundle: bundle.clone(), result }).await.is_err() {
            return Err(bundle);
        }
        rx.await.unwrap_or(Err(bundle))
    }

    /// Drops every session sender, which unblocks each session's `run()`
    /// loop the next time it polls its outbound channel.
    pub async fn shutdown(&self) {
        self.sessions.lock().await.clear();
        self.peers.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_tracks_registered_eid() {
        let registry = ConnectionRegistry::new();
        let addr: SocketAddr = "127.0.0.1:4556".parse().unwrap();
        let eid = Eid::Ipn { node: 1, service: 0 };
        let (tx, _rx) = mpsc::channel(1);

        registry.register(addr, Some(eid.clone()), tx).await;
        assert_eq!(registry.resolve(&eid).await, Some(addr));

        registry.unregister(&addr).await;
        assert_eq!(registry.resolve(&eid).await, None);
    }

    #[tokio::test]
    async fn send_to_unknown_addr_returns_bundle() {
        let registry = ConnectionRegistry::new();
        let addr: SocketAddr = "127.0.0.1:4556".parse().unwrap();
        let bundle = Bytes::from_static(b"bundle");
        assert_eq!(registry.send_to_addr(&addr, bundle.clone()).await, Err(bundle));
    }
}
