/*!
Endpoint identifiers: the `dtn:` and `ipn:` scheme URIs used to name bundle
sources, destinations and report-to endpoints.
*/

mod error;
mod parse;

#[cfg(test)]
mod cbor_tests;

#[cfg(test)]
mod str_tests;

pub use error::EidError;

/// An endpoint identifier, in one of the two schemes registered for BPv7.
#[derive(Default, Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Eid {
    /// `dtn:none`, the null endpoint. Used as a source EID when a node has
    /// no identity of its own, or as a report-to EID to suppress status
    /// reports.
    #[default]
    Null,

    /// `dtn:<ssp>`, a `dtn`-scheme endpoint with an opaque, non-empty
    /// scheme-specific part.
    Dtn(String),

    /// `ipn:<node>.<service>`, a node number and service number pair.
    Ipn { node: u64, service: u64 },
}

impl Eid {
    /// Returns `true` if this EID can only ever identify a single node,
    /// rather than a group the message might be multicast to.
    ///
    /// This is a naming convention, not something the protocol enforces: a
    /// `dtn` URI is conventionally treated as a singleton unless its
    /// scheme-specific part begins with `//~`, which marks it as a group
    /// EID by local agreement between nodes.
    pub fn is_singleton(&self) -> bool {
        match self {
            Eid::Null => true,
            Eid::Dtn(ssp) => !ssp.starts_with("//~"),
            Eid::Ipn { .. } => true,
        }
    }
}

impl dtncore_cbor::encode::ToCbor for Eid {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit_array(Some(2), |a| match self {
            Eid::Null => {
                a.emit(&1u64);
                a.emit(&0u64);
            }
            Eid::Dtn(ssp) => {
                a.emit(&1u64);
                a.emit(ssp);
            }
            Eid::Ipn { node, service } => {
                a.emit(&2u64);
                a.emit_array(Some(2), |a| {
                    a.emit(node);
                    a.emit(service);
                });
            }
        })
    }
}

impl dtncore_cbor::decode::FromCbor for Eid {
    type Error = EidError;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse::eid_from_cbor(data)
    }
}

impl std::fmt::Display for Eid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eid::Null => f.write_str("dtn:none"),
            Eid::Dtn(ssp) => write!(f, "dtn:{ssp}"),
            Eid::Ipn { node, service } => write!(f, "ipn:{node}.{service}"),
        }
    }
}
