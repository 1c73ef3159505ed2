/*!
Canonical block processing flags (RFC 9171 §4.3.1).
*/

/// The processing flags carried in a canonical (extension) block.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockFlags {
    pub replicate_in_fragment: bool,
    pub report_if_unprocessable: bool,
    pub delete_bundle_if_unprocessable: bool,
    pub discard_if_unprocessable: bool,
    /// Any flag bits this implementation does not assign meaning to, preserved
    /// so re-encoding a decoded block does not lose information.
    pub unrecognised: u64,
}

const REPLICATE_IN_FRAGMENT: u64 = 0x01;
const REPORT_IF_UNPROCESSABLE: u64 = 0x02;
const DELETE_IF_UNPROCESSABLE: u64 = 0x04;
const DISCARD_IF_UNPROCESSABLE: u64 = 0x10;
const KNOWN: u64 =
    REPLICATE_IN_FRAGMENT | REPORT_IF_UNPROCESSABLE | DELETE_IF_UNPROCESSABLE | DISCARD_IF_UNPROCESSABLE;

impl From<u64> for BlockFlags {
    fn from(value: u64) -> Self {
        Self {
            replicate_in_fragment: value & REPLICATE_IN_FRAGMENT != 0,
            report_if_unprocessable: value & REPORT_IF_UNPROCESSABLE != 0,
            delete_bundle_if_unprocessable: value & DELETE_IF_UNPROCESSABLE != 0,
            discard_if_unprocessable: value & DISCARD_IF_UNPROCESSABLE != 0,
            unrecognised: value & !KNOWN,
        }
    }
}

impl From<BlockFlags> for u64 {
    fn from(value: BlockFlags) -> Self {
        let mut flags = value.unrecognised & !KNOWN;
        if value.replicate_in_fragment {
            flags |= REPLICATE_IN_FRAGMENT;
        }
        if value.report_if_unprocessable {
            flags |= REPORT_IF_UNPROCESSABLE;
        }
        if value.delete_bundle_if_unprocessable {
            flags |= DELETE_IF_UNPROCESSABLE;
        }
        if value.discard_if_unprocessable {
            flags |= DISCARD_IF_UNPROCESSABLE;
        }
        flags
    }
}

impl dtncore_cbor::encode::ToCbor for BlockFlags {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit(&u64::from(*self))
    }
}

impl dtncore_cbor::decode::FromCbor for BlockFlags {
    type Error = dtncore_cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        dtncore_cbor::decode::parse::<(u64, bool, usize)>(data)
            .map(|(v, shortest, len)| (v.into(), shortest, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_bits() {
        let raw = REPLICATE_IN_FRAGMENT | DISCARD_IF_UNPROCESSABLE;
        let flags = BlockFlags::from(raw);
        assert!(flags.replicate_in_fragment);
        assert!(flags.discard_if_unprocessable);
        assert!(!flags.report_if_unprocessable);
        assert_eq!(u64::from(flags), raw);
    }

    #[test]
    fn preserves_unrecognised_bits() {
        let raw = REPORT_IF_UNPROCESSABLE | 0x0100;
        let flags = BlockFlags::from(raw);
        assert_eq!(flags.unrecognised, 0x0100);
        assert_eq!(u64::from(flags), raw);
    }
}
