/*!
This module defines the primary error type for the `bpv7` crate.
*/

use thiserror::Error;

/// The primary error type for the `bpv7` crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Indicates that there is additional data after the end of a bundle's CBOR array.
    #[error("bundle has additional data after end of CBOR array")]
    AdditionalData,

    /// Indicates that the bundle protocol version is unsupported.
    #[error("unsupported bundle protocol version {0}")]
    InvalidVersion(u64),

    /// Indicates that a bundle is missing the required payload block.
    #[error("bundle has no payload block")]
    MissingPayload,

    /// Indicates that the bundle payload block has an invalid block number (must be 1).
    #[error("bundle payload block must be block number 1")]
    InvalidPayloadBlockNumber,

    /// Indicates that a bundle has more than one block with the same block number.
    #[error("bundle has more than one block with block number {0}")]
    DuplicateBlockNumber(u64),

    /// Indicates that a block has an invalid block number for its type.
    #[error("{1:?} block cannot be block number {0}")]
    InvalidBlockNumber(u64, crate::block_type::BlockType),

    /// Indicates that the fragment information is invalid (e.g., offset plus
    /// length overflows, or fragment fields are present without IS_FRAGMENT set).
    #[error("invalid fragment information: offset {0}, total length {1}")]
    InvalidFragmentInfo(u64, u64),

    /// Indicates that a bundle or block has an invalid combination of flags.
    #[error("invalid bundle or block flag combination")]
    InvalidFlags,

    /// Indicates that a bundle with the null source EID has a creation
    /// timestamp other than (unknown, 0).
    #[error("bundle with anonymous source must have an unknown creation timestamp")]
    AnonymousSourceViolation,

    /// Indicates that a bundle does not contain the named block.
    #[error("bundle does not contain block {0}")]
    MissingBlock(u64),

    /// An error related to CRC processing.
    #[error(transparent)]
    InvalidCrc(#[from] crate::crc::Error),

    /// An error related to Endpoint ID processing.
    #[error(transparent)]
    InvalidEid(#[from] crate::eid::EidError),

    /// An error related to CBOR decoding.
    #[error(transparent)]
    InvalidCbor(#[from] dtncore_cbor::decode::Error),

    /// A generic error for when parsing a specific field fails.
    #[error("failed to parse {field}: {source}")]
    InvalidField {
        /// The name of the field that failed to parse.
        field: &'static str,
        /// The underlying error that caused the failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Trait for error types that can represent an invalid field error.
pub trait HasInvalidField: Sized {
    /// Creates an invalid field error with the given field name and source error.
    fn invalid_field(field: &'static str, source: Box<dyn std::error::Error + Send + Sync>) -> Self;
}

impl HasInvalidField for Error {
    fn invalid_field(field: &'static str, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::InvalidField { field, source }
    }
}

/// Extension trait for `Result` that maps errors to an `InvalidField` variant.
///
/// Useful for providing more context when a parsing error occurs; the error
/// type `E` is specified on the method, allowing turbofish syntax
/// (`.map_field_err::<Error>("field")`) when type inference is insufficient.
pub trait CaptureFieldErr<T> {
    fn map_field_err<E: HasInvalidField>(self, field: &'static str) -> Result<T, E>;
}

impl<T, Err> CaptureFieldErr<T> for Result<T, Err>
where
    Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn map_field_err<E: HasInvalidField>(self, field: &'static str) -> Result<T, E> {
        self.map_err(|e| E::invalid_field(field, e.into()))
    }
}
