/*!
Contact header and SESS_INIT exchange, shared by the accept path
([`crate::listen`]) and the dial path ([`crate::connect`]).
*/

use crate::codec;
use crate::config::SessionConfig;
use crate::connection::ConnectionRegistry;
use crate::layer::BundleHandler;
use crate::session::Session;
use crate::transport;
use dtncore_bpv7::Eid;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

const CONTACT_HEADER_MAGIC: &[u8; 4] = b"dtn!";
const PROTOCOL_VERSION: u8 = 4;

/// Shared, cloneable state needed to negotiate and spin up a session,
/// independent of whether the connection was accepted or dialled.
#[derive(Clone)]
pub struct Context {
    pub session: SessionConfig,
    pub segment_mru: u64,
    pub transfer_mru: u64,
    pub local_eid: Option<Eid>,
    pub handler: Arc<dyn BundleHandler>,
    pub registry: Arc<ConnectionRegistry>,
    pub cancel_token: tokio_util::sync::CancellationToken,
}

impl Context {
    fn keepalive_interval_secs(&self) -> u16 {
        self.session.keepalive_interval.unwrap_or(0)
    }

    fn negotiate_keepalive(&self, peer_keepalive: u16) -> u16 {
        self.session
            .keepalive_interval
            .map(|ours| peer_keepalive.min(ours))
            .unwrap_or(0)
    }

    fn keepalive_as_duration(interval_secs: u16) -> Option<tokio::time::Duration> {
        (interval_secs != 0).then(|| tokio::time::Duration::from_secs(interval_secs as u64))
    }

    fn contact_timeout(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.session.contact_timeout as u64)
    }

    /// Handles a freshly-accepted TCP connection: reads and replies to the
    /// contact header, then hands off to [`Self::run_passive`].
    pub async fn accept(self, mut stream: TcpStream, remote_addr: SocketAddr) {
        let mut buffer = [0u8; 6];
        match tokio::time::timeout(self.contact_timeout(), stream.read_exact(&mut buffer)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!("failed to read contact header from {remote_addr}: {e}");
                return;
            }
            Err(_) => {
                debug!("{remote_addr} timed out sending a contact header");
                return;
            }
        }

        if buffer[0..4] != *CONTACT_HEADER_MAGIC {
            debug!("{remote_addr} sent an invalid contact header magic");
            return;
        }

        // CAN_TLS is advertised but never acted on: we reply with it clear.
        if let Err(e) = stream.write_all(&[b'd', b't', b'n', b'!', PROTOCOL_VERSION, 0]).await {
            debug!("failed to send contact header to {remote_addr}: {e}");
            return;
        }

        if buffer[4] != PROTOCOL_VERSION {
            warn!("{remote_addr} speaks protocol version {}, not {PROTOCOL_VERSION}", buffer[4]);
            transport::terminate(codec::MessageCodec::new_framed(stream), codec::SessionTermReasonCode::VersionMismatch, self.session.contact_timeout)
                .await;
            return;
        }

        if buffer[5] & 0xFE != 0 {
            info!("{remote_addr} set reserved contact header flag bits {:#x}", buffer[5]);
        }

        info!("accepted TCPCLv4 connection from {remote_addr}");
        self.run_passive(remote_addr, codec::MessageCodec::new_framed(stream)).await
    }

    async fn run_passive<T>(self, remote_addr: SocketAddr, mut transport: T)
    where
        T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin + Send + 'static,
        <T as futures::Sink<codec::Message>>::Error: Into<crate::session::Error> + std::fmt::Debug,
    {
        let peer_init = loop {
            match transport::next_with_timeout(&mut transport, self.session.contact_timeout).await {
                Err(e) => {
                    info!("failed to receive SESS_INIT from {remote_addr}: {e:?}");
                    return;
                }
                Ok(codec::Message::SessionInit(init)) => break init,
                Ok(msg) => {
                    info!("unexpected message from {remote_addr} while awaiting SESS_INIT: {msg:?}");
                    if transport
                        .send(codec::Message::Reject(codec::MessageRejectMessage {
                            reason_code: codec::MessageRejectionReasonCode::Unexpected,
                            rejected_message: msg.message_type() as u8,
                        }))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        };

        if transport
            .send(codec::Message::SessionInit(codec::SessionInitMessage {
                keepalive_interval: self.keepalive_interval_secs(),
                segment_mru: self.segment_mru,
                transfer_mru: self.transfer_mru,
                node_id: self.local_eid.clone(),
            }))
            .await
            .is_err()
        {
            info!("failed to send SESS_INIT to {remote_addr}");
            return;
        }

        let keepalive_interval = self.negotiate_keepalive(peer_init.keepalive_interval);
        self.spin_up(remote_addr, peer_init, keepalive_interval, transport).await
    }

    async fn spin_up<T>(self, remote_addr: SocketAddr, peer_init: codec::SessionInitMessage, keepalive_interval: u16, transport: T)
    where
        T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin + Send + 'static,
        <T as futures::Sink<codec::Message>>::Error: Into<crate::session::Error> + std::fmt::Debug,
    {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let segment_mtu = (self.segment_mru.min(peer_init.segment_mru)) as usize;

        let session = Session::new(
            transport,
            self.handler.clone(),
            Self::keepalive_as_duration(keepalive_interval),
            segment_mtu,
            self.transfer_mru as usize,
            peer_init.transfer_mru as usize,
            rx,
            self.cancel_token.clone(),
        );

        self.registry.register(remote_addr, peer_init.node_id.clone(), tx).await;
        session.run().await;
        debug!("session with {remote_addr} closed");
        self.registry.unregister(&remote_addr).await;
    }

    /// Dials `remote_addr`, exchanges contact headers and SESS_INIT, and
    /// runs the resulting session until it closes.
    pub async fn dial(self, remote_addr: SocketAddr) -> Result<(), transport::Error> {
        let mut stream = TcpStream::connect(remote_addr).await?;

        stream.write_all(&[b'd', b't', b'n', b'!', PROTOCOL_VERSION, 0]).await?;

        let mut buffer = [0u8; 6];
        tokio::time::timeout(self.contact_timeout(), stream.read_exact(&mut buffer))
            .await
            .map_err(|_| transport::Error::Timeout)??;

        if buffer[0..4] != *CONTACT_HEADER_MAGIC {
            return Err(transport::Error::InvalidProtocol);
        }

        if buffer[4] != PROTOCOL_VERSION {
            warn!("{remote_addr} replied with protocol version {}, not {PROTOCOL_VERSION}", buffer[4]);
            transport::terminate(codec::MessageCodec::new_framed(stream), codec::SessionTermReasonCode::VersionMismatch, self.session.contact_timeout)
                .await;
            return Err(transport::Error::InvalidProtocol);
        }

        let mut transport = codec::MessageCodec::new_framed(stream);
        transport
            .send(codec::Message::SessionInit(codec::SessionInitMessage {
                keepalive_interval: self.keepalive_interval_secs(),
                segment_mru: self.segment_mru,
                transfer_mru: self.transfer_mru,
                node_id: self.local_eid.clone(),
            }))
            .await
            .map_err(codec::Error::from)?;

        let peer_init = loop {
            match transport::next_with_timeout(&mut transport, self.session.contact_timeout).await? {
                codec::Message::SessionInit(init) => break init,
                msg => {
                    transport
                        .send(codec::Message::Reject(codec::MessageRejectMessage {
                            reason_code: codec::MessageRejectionReasonCode::Unexpected,
                            rejected_message: msg.message_type() as u8,
                        }))
                        .await
                        .map_err(codec::Error::from)?;
                }
            }
        };

        let keepalive_interval = self.negotiate_keepalive(peer_init.keepalive_interval);
        tokio::spawn(self.spin_up(remote_addr, peer_init, keepalive_interval, transport));
        Ok(())
    }
}
