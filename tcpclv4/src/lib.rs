/*!
TCPCLv4 (RFC 9174): a reliable convergence layer that carries bundles over a
single TCP byte stream, one session per peer, with segmented transfer and
acknowledgment.

This crate owns the session state machine (`session`), the wire codec
(`codec`), the listener and outbound dial paths (`listen`, `connect`), and a
registry tying established sessions to peer addresses (`connection`). The
`layer` module is the entry point an embedding application uses: it has no
opinion on bundle routing beyond "send to this EID if we have a session for
it", and delivers received bundles to whatever [`BundleHandler`] is
registered.

Non-goals: TLS negotiation (the contact header's CAN_TLS bit is advertised
but never acted on), bundle security, and any notion of next-hop routing
policy — callers that need a richer routing layer register sessions keyed by
EID and drive `send_bundle` themselves.
*/

mod codec;
mod connect;
mod connection;
mod listen;
mod negotiate;
mod session;
mod transport;

pub mod config;
pub mod layer;

pub use layer::{BundleHandler, Layer};
