/*!
The accept loop: binds a TCP listener, rate-limits inbound connection
attempts with a `tower::limit::RateLimit` layer (mirroring the family's
existing mechanism for bounding accept rate), and spawns a contact-header
negotiation for every accepted stream so one slow peer cannot stall the
next.
*/

use crate::negotiate;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::net::{TcpListener, TcpStream};
use tower::{Service, ServiceExt};
use tracing::{info, warn};

struct Accept {
    listener: TcpListener,
    ready: Option<(TcpStream, SocketAddr)>,
}

impl Accept {
    fn new(listener: TcpListener) -> Self {
        Self { listener, ready: None }
    }
}

impl Service<()> for Accept {
    type Response = (TcpStream, SocketAddr);
    type Error = std::io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.listener.poll_accept(cx).map_ok(|(stream, addr)| {
            self.ready = Some((stream, addr));
        })
    }

    fn call(&mut self, _: ()) -> Self::Future {
        let pair = self.ready.take().expect("poll_ready not called before call");
        Box::pin(async move { Ok(pair) })
    }
}

/// A bound TCPCLv4 listening socket, rate-limited on accept.
pub struct Listener {
    local_addr: SocketAddr,
    svc: tower::limit::RateLimit<Accept>,
    ctx: negotiate::Context,
}

impl Listener {
    pub async fn bind(address: SocketAddr, connection_rate_limit: u32, ctx: negotiate::Context) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        let svc = tower::ServiceBuilder::new()
            .rate_limit(connection_rate_limit.max(1) as u64, std::time::Duration::from_secs(1))
            .service(Accept::new(listener));
        info!("TCPCLv4 listening on {local_addr}");
        Ok(Self { local_addr, svc, ctx })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drives the accept loop until the context's cancellation token fires.
    /// Each accepted connection is spawned as its own task immediately, so
    /// a peer dawdling over its contact header cannot hold up acceptance of
    /// the next one.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.ctx.cancel_token.cancelled() => break,
                ready = self.svc.ready() => match ready {
                    Ok(svc) => match svc.call(()).await {
                        Ok((stream, remote_addr)) => {
                            info!("accepted TCPCLv4 connection from {remote_addr}");
                            tokio::spawn(self.ctx.clone().accept(stream, remote_addr));
                        }
                        Err(e) => warn!("failed to accept connection: {e}"),
                    },
                    Err(e) => {
                        warn!("listener closed: {e}");
                        break;
                    }
                },
            }
        }
    }
}
