/*!
Primary block processing flags (RFC 9171 §4.2.3).
*/

/// The processing flags carried in a bundle's primary block.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct BundleFlags {
    pub is_fragment: bool,
    pub is_admin_record: bool,
    pub do_not_fragment: bool,
    pub request_ack: bool,
    pub request_status_time: bool,
    pub request_reception_report: bool,
    pub request_forward_report: bool,
    pub request_delivery_report: bool,
    pub request_delete_report: bool,
    /// Any flag bits this implementation does not assign meaning to, preserved
    /// so re-encoding a decoded bundle does not lose information.
    pub unrecognised: u64,
}

const IS_FRAGMENT: u64 = 0x0001;
const IS_ADMIN_RECORD: u64 = 0x0002;
const DO_NOT_FRAGMENT: u64 = 0x0004;
const REQUEST_ACK: u64 = 0x0008;
const REQUEST_STATUS_TIME: u64 = 0x0040;
const REQUEST_RECEPTION_REPORT: u64 = 0x4000;
const REQUEST_FORWARD_REPORT: u64 = 0x10000;
const REQUEST_DELIVERY_REPORT: u64 = 0x20000;
const REQUEST_DELETE_REPORT: u64 = 0x40000;
const KNOWN: u64 = IS_FRAGMENT
    | IS_ADMIN_RECORD
    | DO_NOT_FRAGMENT
    | REQUEST_ACK
    | REQUEST_STATUS_TIME
    | REQUEST_RECEPTION_REPORT
    | REQUEST_FORWARD_REPORT
    | REQUEST_DELIVERY_REPORT
    | REQUEST_DELETE_REPORT;

impl From<u64> for BundleFlags {
    fn from(value: u64) -> Self {
        Self {
            is_fragment: value & IS_FRAGMENT != 0,
            is_admin_record: value & IS_ADMIN_RECORD != 0,
            do_not_fragment: value & DO_NOT_FRAGMENT != 0,
            request_ack: value & REQUEST_ACK != 0,
            request_status_time: value & REQUEST_STATUS_TIME != 0,
            request_reception_report: value & REQUEST_RECEPTION_REPORT != 0,
            request_forward_report: value & REQUEST_FORWARD_REPORT != 0,
            request_delivery_report: value & REQUEST_DELIVERY_REPORT != 0,
            request_delete_report: value & REQUEST_DELETE_REPORT != 0,
            unrecognised: value & !KNOWN,
        }
    }
}

impl From<BundleFlags> for u64 {
    fn from(value: BundleFlags) -> Self {
        let mut flags = value.unrecognised & !KNOWN;
        if value.is_fragment {
            flags |= IS_FRAGMENT;
        }
        if value.is_admin_record {
            flags |= IS_ADMIN_RECORD;
        }
        if value.do_not_fragment {
            flags |= DO_NOT_FRAGMENT;
        }
        if value.request_ack {
            flags |= REQUEST_ACK;
        }
        if value.request_status_time {
            flags |= REQUEST_STATUS_TIME;
        }
        if value.request_reception_report {
            flags |= REQUEST_RECEPTION_REPORT;
        }
        if value.request_forward_report {
            flags |= REQUEST_FORWARD_REPORT;
        }
        if value.request_delivery_report {
            flags |= REQUEST_DELIVERY_REPORT;
        }
        if value.request_delete_report {
            flags |= REQUEST_DELETE_REPORT;
        }
        flags
    }
}

impl dtncore_cbor::encode::ToCbor for BundleFlags {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit(&u64::from(*self))
    }
}

impl dtncore_cbor::decode::FromCbor for BundleFlags {
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
        let raw = IS_FRAGMENT | REQUEST_ACK | REQUEST_DELIVERY_REPORT;
        let flags = BundleFlags::from(raw);
        assert!(flags.is_fragment);
        assert!(flags.request_ack);
        assert!(flags.request_delivery_report);
        assert!(!flags.is_admin_record);
        assert_eq!(u64::from(flags), raw);
    }

    #[test]
    fn preserves_unrecognised_bits() {
        let raw = IS_ADMIN_RECORD | 0x0080_0000;
        let flags = BundleFlags::from(raw);
        assert_eq!(flags.unrecognised, 0x0080_0000);
        assert_eq!(u64::from(flags), raw);
    }
}
