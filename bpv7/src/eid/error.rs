/*!
Errors produced while parsing, formatting or decoding an [`Eid`](super::Eid).
*/

use thiserror::Error;

/// An error produced while parsing or decoding an endpoint identifier.
#[derive(Error, Debug)]
pub enum EidError {
    /// The string has no `scheme:` prefix.
    #[error("missing scheme separator")]
    MissingScheme,

    /// The string names a scheme other than `dtn` or `ipn`.
    #[error("unsupported EID scheme {0:?}")]
    BadScheme(String),

    /// A `dtn:` URI had an empty scheme-specific part.
    #[error("dtn URI scheme-specific part is empty")]
    EmptyDtnSsp,

    /// An `ipn:` URI was not of the form `<node>.<service>`.
    #[error("ipn URI must have exactly two components, node and service")]
    InvalidIpnComponents,

    /// Failed to parse a specific field within an EID string or CBOR array.
    #[error("failed to parse {field}: {source}")]
    InvalidField {
        /// The name of the field that failed to parse.
        field: &'static str,
        /// The underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The CBOR array for an EID had the wrong scheme tag.
    #[error("unsupported EID scheme {0}")]
    UnsupportedScheme(u64),

    /// The `dtn` scheme-specific part in CBOR was neither `0` nor text.
    #[error("dtn scheme-specific part must be 0 or a text string")]
    InvalidDtnCborForm,

    /// A CBOR decoding error occurred while reading an EID.
    #[error(transparent)]
    InvalidCbor(#[from] dtncore_cbor::decode::Error),
}

/// Extension trait for wrapping a parse error with the name of the field that failed.
pub(super) trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, EidError>;
}

impl<T, E> CaptureFieldErr<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn map_field_err(self, field: &'static str) -> Result<T, EidError> {
        self.map_err(|e| EidError::InvalidField {
            field,
            source: e.into(),
        })
    }
}
