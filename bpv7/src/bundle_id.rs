/*!
A bundle's identity: the (source, creation timestamp, fragment offset) tuple
that names a bundle for logging and deduplication, distinct from anything
carried on the wire.
*/

use crate::creation_timestamp::CreationTimestamp;
use crate::eid::Eid;

/// Identifies a bundle by source, creation timestamp and (if a fragment) its
/// offset. Two bundles with the same `BundleId` are the same bundle, or
/// fragments of the same bundle, per RFC 9171 §3.1.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BundleId {
    pub source: Eid,
    pub timestamp: CreationTimestamp,
    pub fragment_offset: Option<u64>,
}

impl BundleId {
    pub fn new(source: Eid, timestamp: CreationTimestamp, fragment_offset: Option<u64>) -> Self {
        Self {
            source,
            timestamp,
            fragment_offset,
        }
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.source,
            self.timestamp.time.millisecs(),
            self.timestamp.sequence_number
        )?;
        if let Some(offset) = self.fragment_offset {
            write!(f, "/{offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtn_time::DtnTime;

    fn id() -> BundleId {
        BundleId::new(
            Eid::Ipn { node: 1, service: 0 },
            CreationTimestamp {
                time: DtnTime::new(1_700_000_000_000),
                sequence_number: 3,
            },
            None,
        )
    }

    #[test]
    fn formats_without_fragment() {
        assert_eq!(id().to_string(), "ipn:1.0/1700000000000/3");
    }

    #[test]
    fn formats_with_fragment() {
        let mut bundle_id = id();
        bundle_id.fragment_offset = Some(512);
        assert_eq!(bundle_id.to_string(), "ipn:1.0/1700000000000/3/512");
    }

    #[test]
    fn distinguishes_by_source() {
        let a = id();
        let mut b = id();
        b.source = Eid::Ipn { node: 2, service: 0 };
        assert_ne!(a, b);
    }
}
