//! A minimal, deterministic CBOR (RFC 8949) encoder/decoder.
//!
//! This crate underlies the BPv7 bundle codec: every wire-level integer,
//! string, array and map that makes up a bundle is pushed through
//! [`encode`] on the way out and [`decode`] on the way in. The decoder
//! accepts the full RFC 8949 major-type grammar (it is shared with other
//! consumers), but the encoder only ever produces the deterministic subset
//! RFC 9171 §4.1 requires: shortest-form integers, definite-length byte and
//! text strings, sorted-key maps, and indefinite-length arrays for the
//! outermost bundle.

pub mod decode;
mod decode_seq;
pub mod encode;

#[cfg(test)]
mod decode_tests;
