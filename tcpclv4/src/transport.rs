/*!
Helpers shared between the accept and dial paths for reading the next
message with a timeout, and for driving a graceful SESS_TERM exchange.
*/

use crate::codec;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum Error {
    #[error("peer closed the connection")]
    Hangup,

    #[error("timed out waiting for a message from the peer")]
    Timeout,

    #[error("the peer is not a TCPCLv4 speaker")]
    InvalidProtocol,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] codec::Error),
}

/// Sends a SESS_TERM and waits (briefly) for the peer's reply before closing
/// the transport. Best-effort: any failure along the way just closes.
pub async fn terminate<T>(mut transport: T, reason_code: codec::SessionTermReasonCode, timeout: u16)
where
    T: StreamExt<Item = Result<codec::Message, codec::Error>> + SinkExt<codec::Message> + Unpin,
    <T as futures::Sink<codec::Message>>::Error: std::fmt::Debug,
{
    let msg = codec::SessionTermMessage { reason_code, ..Default::default() };
    let mut expected_reply = msg.clone();
    expected_reply.message_flags.reply = true;

    if transport
        .send(codec::Message::SessionTerm(msg))
        .await
        .inspect_err(|e| info!("failed to send session terminate message: {e:?}"))
        .is_ok()
    {
        loop {
            match next_with_timeout(&mut transport, timeout).await {
                Err(e) => {
                    info!("failed to read next message: {e:?}");
                    break;
                }
                Ok(codec::Message::SessionTerm(mut msg)) => {
                    if !msg.message_flags.reply {
                        msg.message_flags.reply = true;
                        _ = transport.send(codec::Message::SessionTerm(msg)).await;
                    } else if msg != expected_reply {
                        info!("mismatched SESS_TERM reply: {msg:?}, expected {expected_reply:?}");
                    }
                    break;
                }
                Ok(msg) => {
                    if transport
                        .send(codec::Message::Reject(codec::MessageRejectMessage {
                            reason_code: codec::MessageRejectionReasonCode::Unexpected,
                            rejected_message: msg.message_type() as u8,
                        }))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    }

    _ = transport.close().await;
}

/// Reads the next message, failing if none arrives within `timeout` seconds.
pub async fn next_with_timeout<T>(transport: &mut T, timeout: u16) -> Result<codec::Message, Error>
where
    T: StreamExt<Item = Result<codec::Message, codec::Error>> + Unpin,
{
    match tokio::time::timeout(tokio::time::Duration::from_secs(timeout as u64), transport.next()).await {
        Ok(Some(Ok(m))) => Ok(m),
        Ok(Some(Err(e))) => Err(e.into()),
        Ok(None) => Err(Error::Hangup),
        Err(_) => Err(Error::Timeout),
    }
}
