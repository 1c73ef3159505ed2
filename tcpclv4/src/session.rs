/*!
The TCPCLv4 session state machine: segmentation and reassembly of bundles
over an established, SESS_INIT-negotiated transport.
*/

use crate::codec;
use crate::layer::BundleHandler;
use futures::{FutureExt, SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum Error {
    #[error("peer closed the connection")]
    Hangup,

    #[error("peer has started to end the session: {0:?}")]
    Terminate(codec::SessionTermMessage),

    #[error("shutting down session: {0:?}")]
    Shutdown(codec::SessionTermReasonCode),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] codec::Error),
}

/// A bundle enqueued for transmission, paired with the means to report
/// whether it was actually sent.
pub struct OutboundItem {
    pub bundle: Bytes,
    pub result: tokio::sync::oneshot::Sender<Result<(), Bytes>>,
}

struct PendingAck {
    flags: codec::TransferSegmentMessageFlags,
    transfer_id: u64,
    acknowledged_length: usize,
}

/// One established TCPCLv4 session with a single peer.
pub struct Session<T>
where
    T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin,
    <T as futures::Sink<codec::Message>>::Error: Into<Error> + std::fmt::Debug,
{
    transport: T,
    handler: Arc<dyn BundleHandler>,
    keepalive_interval: Option<tokio::time::Duration>,
    last_sent: tokio::time::Instant,
    segment_mtu: usize,
    transfer_mru: usize,
    peer_transfer_mru: usize,
    outbound: tokio::sync::mpsc::Receiver<OutboundItem>,
    next_transfer_id: u64,
    acks: VecDeque<PendingAck>,
    reassembly: HashMap<u64, BytesMut>,
    cancel_token: tokio_util::sync::CancellationToken,
}

impl<T> Session<T>
where
    T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin,
    <T as futures::Sink<codec::Message>>::Error: Into<Error> + std::fmt::Debug,
{
    /// `transfer_mru` bounds what we accept from the peer during
    /// reassembly; `peer_transfer_mru` is the peer's own advertised limit,
    /// checked before we segment an outbound bundle so an oversize transfer
    /// is declined locally instead of sent and refused.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        handler: Arc<dyn BundleHandler>,
        keepalive_interval: Option<tokio::time::Duration>,
        segment_mtu: usize,
        transfer_mru: usize,
        peer_transfer_mru: usize,
        outbound: tokio::sync::mpsc::Receiver<OutboundItem>,
        cancel_token: tokio_util::sync::CancellationToken,
    ) -> Self {
        Self {
            transport,
            handler,
            keepalive_interval,
            last_sent: tokio::time::Instant::now(),
            segment_mtu,
            transfer_mru,
            peer_transfer_mru,
            outbound,
            // Transfer ids are a monotonically increasing u64 starting at 1.
            next_transfer_id: 1,
            acks: VecDeque::new(),
            reassembly: HashMap::new(),
            cancel_token,
        }
    }

    async fn transport_send(&mut self, msg: codec::Message) -> Result<(), Error> {
        let msg_type = msg.message_type();
        self.transport
            .send(msg)
            .await
            .inspect_err(|e| info!("failed to send {msg_type:?} to peer: {e:?}"))
            .map_err(Into::into)
            .map(|_| self.last_sent = tokio::time::Instant::now())
    }

    async fn transport_feed(&mut self, msg: codec::Message) -> Result<(), Error> {
        let msg_type = msg.message_type();
        self.transport
            .feed(msg)
            .await
            .inspect_err(|e| info!("failed to feed {msg_type:?} to peer: {e:?}"))
            .map_err(Into::into)
            .map(|_| self.last_sent = tokio::time::Instant::now())
    }

    async fn reject_msg(&mut self, reason_code: codec::MessageRejectionReasonCode, rejected_message: u8) -> Result<(), Error> {
        self.transport_send(codec::Message::Reject(codec::MessageRejectMessage { reason_code, rejected_message }))
            .await
    }

    async fn unexpected_msg(&mut self, rejected_message: codec::MessageType) -> Result<(), Error> {
        self.reject_msg(codec::MessageRejectionReasonCode::Unexpected, rejected_message as u8).await
    }

    /// Handles one inbound XFER_SEGMENT: appends to the transfer's
    /// reassembly buffer (creating it on START), and on END hands the
    /// complete transfer to the bundle handler.
    async fn on_transfer(&mut self, msg: codec::TransferSegmentMessage) -> Result<(), Error> {
        if msg.message_flags.start {
            self.reassembly.insert(msg.transfer_id, BytesMut::with_capacity(msg.data.len()));
        }

        let Some(buffer) = self.reassembly.get_mut(&msg.transfer_id) else {
            return Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown));
        };

        if msg.data.len() + buffer.len() > self.transfer_mru {
            self.reassembly.remove(&msg.transfer_id);
            return self
                .reject_msg(codec::MessageRejectionReasonCode::Unsupported, codec::MessageType::XFER_SEGMENT as u8)
                .await;
        }

        buffer.extend_from_slice(&msg.data);
        let acknowledged_length = buffer.len() as u64;

        if msg.message_flags.end {
            let buffer = self.reassembly.remove(&msg.transfer_id).expect("just inserted or appended above");
            // A misbehaving handler must not take the session down with it:
            // catch the unwind rather than let it propagate past this await.
            if let Err(panic) = std::panic::AssertUnwindSafe(self.handler.handle(buffer.freeze())).catch_unwind().await {
                warn!("bundle handler panicked during dispatch: {panic:?}");
            }
        }

        self.transport_send(codec::Message::TransferAck(codec::TransferAckMessage {
            transfer_id: msg.transfer_id,
            message_flags: msg.message_flags,
            acknowledged_length,
        }))
        .await
    }

    /// Feeds one segment onto the transport and records the ack we expect
    /// back for it. Flushes only when `flags.end` closes out the transfer.
    async fn send_segment(
        &mut self,
        flags: codec::TransferSegmentMessageFlags,
        transfer_id: u64,
        data: Bytes,
        acknowledged_length: usize,
    ) -> Result<(), Error> {
        self.acks.push_back(PendingAck { flags, transfer_id, acknowledged_length });

        self.transport_feed(codec::Message::TransferSegment(codec::TransferSegmentMessage {
            message_flags: flags,
            transfer_id,
            data: data.to_vec(),
        }))
        .await?;

        if flags.end {
            self.transport.flush().await.map_err(Into::into)?;
        }
        Ok(())
    }

    /// Reads from the peer until every segment queued by [`Self::send_segment`]
    /// has been acknowledged, or the peer refuses the transfer.
    async fn drain_acks(&mut self) -> Result<Option<codec::TransferRefuseReasonCode>, Error> {
        while !self.acks.is_empty() {
            match self.recv_from_peer().await? {
                codec::Message::SessionTerm(msg) => return Err(Error::Terminate(msg)),
                codec::Message::TransferSegment(msg) => {
                    self.on_transfer(msg).await?;
                }
                codec::Message::TransferAck(msg) => {
                    let ack = self.acks.pop_front().expect("acks and sends are paired");
                    if ack.transfer_id != msg.transfer_id
                        || ack.flags != msg.message_flags
                        || ack.acknowledged_length as u64 != msg.acknowledged_length
                    {
                        warn!("mismatched transfer ack: expected id {} got {}", ack.transfer_id, msg.transfer_id);
                        self.reject_msg(codec::MessageRejectionReasonCode::Unsupported, codec::MessageType::XFER_ACK as u8).await?;
                        return Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown));
                    }
                }
                codec::Message::TransferRefuse(msg) => {
                    let ack = self.acks.pop_front().expect("acks and sends are paired");
                    if ack.transfer_id != msg.transfer_id {
                        warn!("mismatched transfer id in refuse: expected {} got {}", ack.transfer_id, msg.transfer_id);
                        self.reject_msg(codec::MessageRejectionReasonCode::Unsupported, codec::MessageType::XFER_REFUSE as u8).await?;
                        return Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown));
                    }
                    self.acks.clear();
                    return Ok(Some(msg.reason_code));
                }
                msg => {
                    self.unexpected_msg(msg.message_type()).await?;
                }
            }
        }
        Ok(None)
    }

    /// Segments `bundle` into `segment_mtu`-sized chunks and sends them as
    /// one transfer, START on the first and END on the last, then waits for
    /// every segment to be acknowledged.
    async fn send_once(&mut self, mut bundle: Bytes) -> Result<Option<codec::TransferRefuseReasonCode>, Error> {
        let transfer_id = self.next_transfer_id;
        self.next_transfer_id += 1;

        let mut start = true;
        let mut acknowledged_length = 0;
        while bundle.len() > self.segment_mtu {
            acknowledged_length += self.segment_mtu;
            self.send_segment(
                codec::TransferSegmentMessageFlags { start, end: false },
                transfer_id,
                bundle.split_to(self.segment_mtu),
                acknowledged_length,
            )
            .await?;
            start = false;
        }

        acknowledged_length += bundle.len();
        self.send_segment(codec::TransferSegmentMessageFlags { start, end: true }, transfer_id, bundle, acknowledged_length)
            .await?;

        self.drain_acks().await
    }

    async fn forward_to_peer(&mut self, bundle: Bytes, result: tokio::sync::oneshot::Sender<Result<(), Bytes>>) -> Result<(), Error> {
        if bundle.len() > self.peer_transfer_mru {
            warn!(
                "declining to send {}-byte bundle, exceeds peer transfer MRU of {}",
                bundle.len(),
                self.peer_transfer_mru
            );
            _ = result.send(Err(bundle));
            return Ok(());
        }

        loop {
            match self.send_once(bundle.clone()).await? {
                None | Some(codec::TransferRefuseReasonCode::Completed) => {
                    _ = result.send(Ok(()));
                }
                Some(codec::TransferRefuseReasonCode::Retransmit) => continue,
                Some(codec::TransferRefuseReasonCode::NoResources) => {
                    _ = result.send(Err(bundle));
                    return Err(Error::Shutdown(codec::SessionTermReasonCode::ResourceExhaustion));
                }
                _ => {
                    _ = result.send(Err(bundle));
                }
            }
            return Ok(());
        }
    }

    async fn shutdown(mut self, reason_code: codec::SessionTermReasonCode) {
        self.outbound.close();
        while let Some(item) = self.outbound.recv().await {
            _ = item.result.send(Err(item.bundle));
        }

        let msg = codec::SessionTermMessage { reason_code, ..Default::default() };
        if self.transport_send(codec::Message::SessionTerm(msg)).await.is_ok() {
            loop {
                let outcome = match self.recv_from_peer().await {
                    Ok(codec::Message::SessionTerm(msg)) => {
                        if !msg.message_flags.reply {
                            return self.on_terminate(msg).await;
                        }
                        break;
                    }
                    Ok(codec::Message::TransferSegment(msg)) => self.on_transfer(msg).await,
                    Ok(msg) => self.unexpected_msg(msg.message_type()).await,
                    Err(e) => Err(e),
                };
                if outcome.is_err() {
                    break;
                }
            }
        }

        _ = self.transport.close().await;
    }

    async fn on_terminate(mut self, mut msg: codec::SessionTermMessage) {
        self.outbound.close();

        while let Some(item) = self.outbound.recv().await {
            if let Err(e) = self.forward_to_peer(item.bundle, item.result).await {
                while let Some(item) = self.outbound.recv().await {
                    _ = item.result.send(Err(item.bundle));
                }
                if !matches!(e, Error::Shutdown(_)) {
                    _ = self.transport.close().await;
                    return;
                }
                break;
            }
        }

        msg.message_flags.reply = true;
        if self.transport_send(codec::Message::SessionTerm(msg)).await.is_ok() {
            while !self.acks.is_empty() {
                let outcome = match self.recv_from_peer().await {
                    Ok(codec::Message::TransferSegment(msg)) => {
                        if msg.message_flags.start {
                            if self
                                .transport_send(codec::Message::TransferRefuse(codec::TransferRefuseMessage {
                                    transfer_id: msg.transfer_id,
                                    reason_code: codec::TransferRefuseReasonCode::SessionTerminating,
                                }))
                                .await
                                .is_ok()
                            {
                                continue;
                            }
                            break;
                        }
                        self.on_transfer(msg).await
                    }
                    Ok(msg) => self.unexpected_msg(msg.message_type()).await,
                    Err(_) => break,
                };
                if outcome.is_err() {
                    break;
                }
            }
        }

        _ = self.transport.close().await;
    }

    async fn close(mut self) {
        self.outbound.close();
        while let Some(item) = self.outbound.recv().await {
            _ = item.result.send(Err(item.bundle));
        }
        _ = self.transport.close().await;
    }

    async fn recv_from_peer(&mut self) -> Result<codec::Message, Error> {
        loop {
            let next = if let Some(keepalive_interval) = self.keepalive_interval {
                match tokio::time::timeout(keepalive_interval.saturating_mul(2), self.transport.next()).await {
                    Err(_) => return Err(Error::Shutdown(codec::SessionTermReasonCode::IdleTimeout)),
                    Ok(Some(Ok(codec::Message::Keepalive))) => continue,
                    Ok(msg) => msg,
                }
            } else {
                self.transport.next().await
            };

            match next {
                None => return Err(Error::Hangup),
                Some(Err(codec::Error::InvalidMessageType(rejected))) => {
                    self.reject_msg(codec::MessageRejectionReasonCode::UnknownType, rejected).await?;
                }
                Some(Err(e)) => return Err(Error::Codec(e)),
                Some(Ok(msg)) => return Ok(msg),
            }
        }
    }

    /// Drives the session until the peer terminates it, hangs up, or a
    /// protocol error forces a shutdown.
    pub async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown)),
                r = recv_with_keepalive(&mut self) => r,
            };

            let result = match msg {
                Ok(codec::Message::TransferSegment(msg)) => self.on_transfer(msg).await,
                // `recv_with_keepalive` reuses this variant as a "nothing to
                // dispatch" sentinel after forwarding an outbound bundle,
                // after sending our own keepalive, and for a real inbound
                // keepalive — none of those warrant a MSG_REJECT.
                Ok(codec::Message::Keepalive) => Ok(()),
                Ok(msg) => self.unexpected_msg(msg.message_type()).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => {}
                Err(Error::Terminate(msg)) => return self.on_terminate(msg).await,
                Err(Error::Shutdown(reason)) => return self.shutdown(reason).await,
                Err(Error::Codec(e)) => {
                    info!("peer sent invalid data: {e:?}, shutting down session");
                    return self.shutdown(codec::SessionTermReasonCode::Unknown).await;
                }
                Err(Error::Hangup) => {
                    debug!("peer hung up, ending session");
                    return self.close().await;
                }
                Err(Error::Io(e)) => {
                    info!("session I/O failure: {e:?}, ending session");
                    return self.close().await;
                }
            }
        }
    }
}

/// Waits for either an outbound bundle to forward or the next inbound
/// message, sending keepalives on the configured interval.
async fn recv_with_keepalive<T>(session: &mut Session<T>) -> Result<codec::Message, Error>
where
    T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin,
    <T as futures::Sink<codec::Message>>::Error: Into<Error> + std::fmt::Debug,
{
    if let Some(keepalive_interval) = session.keepalive_interval {
        tokio::select! {
            r = tokio::time::timeout(keepalive_interval.saturating_sub(session.last_sent.elapsed()), session.outbound.recv()) => match r {
                Ok(Some(item)) => {
                    session.forward_to_peer(item.bundle, item.result).await?;
                    Ok(codec::Message::Keepalive)
                }
                Ok(None) => Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown)),
                Err(_) => {
                    session.transport_send(codec::Message::Keepalive).await?;
                    Ok(codec::Message::Keepalive)
                }
            },
            r = tokio::time::timeout(keepalive_interval.saturating_mul(2), session.transport.next()) => match r {
                Ok(Some(Ok(codec::Message::Keepalive))) => Ok(codec::Message::Keepalive),
                Ok(Some(msg)) => msg.map_err(Into::into),
                Ok(None) => Err(Error::Hangup),
                Err(_) => Err(Error::Shutdown(codec::SessionTermReasonCode::IdleTimeout)),
            }
        }
    } else {
        tokio::select! {
            r = session.outbound.recv() => match r {
                Some(item) => {
                    session.forward_to_peer(item.bundle, item.result).await?;
                    Ok(codec::Message::Keepalive)
                }
                None => Err(Error::Shutdown(codec::SessionTermReasonCode::Unknown)),
            },
            msg = session.transport.next() => match msg {
                Some(msg) => msg.map_err(Into::into),
                None => Err(Error::Hangup),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Message, TransferAckMessage};

    struct NullHandler;

    #[async_trait::async_trait]
    impl BundleHandler for NullHandler {
        async fn handle(&self, _bundle: Bytes) {}
    }

    fn spawn_session(
        transport: tokio_util::codec::Framed<tokio::io::DuplexStream, codec::MessageCodec>,
        peer_transfer_mru: usize,
    ) -> (tokio::sync::mpsc::Sender<OutboundItem>, tokio_util::sync::CancellationToken, tokio::task::JoinHandle<()>) {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let cancel_token = tokio_util::sync::CancellationToken::new();
        let session = Session::new(transport, Arc::new(NullHandler), None, 16384, 1 << 20, peer_transfer_mru, rx, cancel_token.clone());
        let handle = tokio::spawn(session.run());
        (tx, cancel_token, handle)
    }

    /// S5: a 100 KiB bundle segmented at a 16 KiB peer MRU crosses as seven
    /// XFER_SEGMENTs sharing one transfer_id (START on the first, END on
    /// the last); the peer acks each segment as it arrives, echoing that
    /// segment's flags and the cumulative `acknowledged_length`.
    #[tokio::test]
    async fn large_bundle_splits_into_mru_sized_segments() {
        let (client_io, server_io) = tokio::io::duplex(1 << 20);
        let client = codec::MessageCodec::new_framed(client_io);
        let mut server = codec::MessageCodec::new_framed(server_io);

        let (tx, cancel_token, handle) = spawn_session(client, 1 << 20);

        let payload = Bytes::from(vec![0x42u8; 102_400]);
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        tx.send(OutboundItem { bundle: payload.clone(), result: result_tx }).await.unwrap();

        let mut segment_count = 0;
        let mut transfer_id = None;
        let mut total_len = 0usize;
        loop {
            match server.next().await.unwrap().unwrap() {
                Message::TransferSegment(seg) => {
                    segment_count += 1;
                    total_len += seg.data.len();
                    match transfer_id {
                        None => transfer_id = Some(seg.transfer_id),
                        Some(id) => assert_eq!(id, seg.transfer_id, "every segment of one transfer shares its id"),
                    }
                    assert_eq!(seg.message_flags.start, segment_count == 1);
                    let end = seg.message_flags.end;
                    server
                        .send(Message::TransferAck(TransferAckMessage {
                            transfer_id: seg.transfer_id,
                            message_flags: seg.message_flags,
                            acknowledged_length: total_len as u64,
                        }))
                        .await
                        .unwrap();
                    if end {
                        break;
                    }
                }
                other => panic!("unexpected message from session: {other:?}"),
            }
        }

        assert_eq!(segment_count, 7);
        assert_eq!(total_len, 102_400);
        assert!(result_rx.await.unwrap().is_ok());

        cancel_token.cancel();
        drop(tx);
        drop(server);
        _ = handle.await;
    }

    /// S6: bundles enqueued in order B1, B2, B3 are transmitted with
    /// strictly increasing transfer_ids in that same order.
    #[tokio::test]
    async fn enqueued_bundles_transmit_in_order_with_increasing_transfer_ids() {
        let (client_io, server_io) = tokio::io::duplex(1 << 20);
        let client = codec::MessageCodec::new_framed(client_io);
        let mut server = codec::MessageCodec::new_framed(server_io);

        let (tx, cancel_token, handle) = spawn_session(client, 1 << 20);

        let mut receipts = Vec::new();
        for payload in [b"B1".to_vec(), b"B2".to_vec(), b"B3".to_vec()] {
            let (result_tx, result_rx) = tokio::sync::oneshot::channel();
            tx.send(OutboundItem { bundle: Bytes::from(payload), result: result_tx }).await.unwrap();

            match server.next().await.unwrap().unwrap() {
                Message::TransferSegment(seg) => {
                    assert!(seg.message_flags.start && seg.message_flags.end, "single-segment transfer carries START|END");
                    server
                        .send(Message::TransferAck(TransferAckMessage {
                            transfer_id: seg.transfer_id,
                            message_flags: seg.message_flags,
                            acknowledged_length: seg.data.len() as u64,
                        }))
                        .await
                        .unwrap();
                    receipts.push(seg.transfer_id);
                }
                other => panic!("unexpected message from session: {other:?}"),
            }
            assert!(result_rx.await.unwrap().is_ok());
        }

        assert_eq!(receipts, vec![1, 2, 3]);

        cancel_token.cancel();
        drop(tx);
        drop(server);
        _ = handle.await;
    }

    /// A bundle larger than the peer's advertised transfer MRU is declined
    /// locally and never reaches the wire.
    #[tokio::test]
    async fn oversize_transfer_is_declined_without_sending() {
        let (client_io, server_io) = tokio::io::duplex(1 << 16);
        let client = codec::MessageCodec::new_framed(client_io);
        let mut server = codec::MessageCodec::new_framed(server_io);

        let (tx, cancel_token, handle) = spawn_session(client, 1024);

        let payload = Bytes::from(vec![0u8; 2048]);
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        tx.send(OutboundItem { bundle: payload.clone(), result: result_tx }).await.unwrap();

        assert_eq!(result_rx.await.unwrap(), Err(payload));

        // The session must not have written anything to the peer for the
        // declined transfer.
        let pending = tokio::time::timeout(tokio::time::Duration::from_millis(50), server.next()).await;
        assert!(pending.is_err(), "no message should have reached the peer");

        cancel_token.cancel();
        drop(tx);
        drop(server);
        _ = handle.await;
    }
}
