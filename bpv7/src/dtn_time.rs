/*!
This module provides a representation of DTN time, which is defined as the
number of milliseconds since the DTN epoch (2000-01-01 00:00:00 UTC).
*/

const DTN_EPOCH: time::OffsetDateTime = time::macros::datetime!(2000-01-01 00:00:00 UTC);

/// A DTN timestamp: milliseconds since the DTN epoch. The sentinel value 0
/// means "unknown" and is used when the source node has no accurate clock.
#[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DtnTime(u64);

impl DtnTime {
    /// Creates a new `DtnTime` representing the current time.
    pub fn now() -> Self {
        Self(((time::OffsetDateTime::now_utc() - DTN_EPOCH).whole_milliseconds()) as u64)
    }

    /// Creates a new `DtnTime` from the given number of milliseconds since the DTN epoch.
    pub fn new(millisecs: u64) -> Self {
        Self(millisecs)
    }

    /// Returns the number of milliseconds since the DTN epoch.
    pub fn millisecs(&self) -> u64 {
        self.0
    }

    pub fn saturating_from(t: time::OffsetDateTime) -> Self {
        let millisecs = (t - DTN_EPOCH).whole_milliseconds();
        if millisecs < 0 {
            Self::new(0)
        } else if millisecs > u64::MAX as i128 {
            Self::new(u64::MAX)
        } else {
            Self(millisecs as u64)
        }
    }
}

impl dtncore_cbor::encode::ToCbor for DtnTime {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit(&self.0)
    }
}

impl dtncore_cbor::decode::FromCbor for DtnTime {
    type Error = dtncore_cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        dtncore_cbor::decode::parse(data).map(|(millisecs, shortest, len)| (Self(millisecs), shortest, len))
    }
}

impl TryFrom<time::OffsetDateTime> for DtnTime {
    type Error = time::error::ConversionRange;

    fn try_from(instant: time::OffsetDateTime) -> Result<Self, Self::Error> {
        let millisecs = (instant - DTN_EPOCH).whole_milliseconds();
        if millisecs < 0 || millisecs > u64::MAX as i128 {
            Err(time::error::ConversionRange)
        } else {
            Ok(Self(millisecs as u64))
        }
    }
}

impl From<DtnTime> for time::OffsetDateTime {
    fn from(dtn_time: DtnTime) -> Self {
        DTN_EPOCH.saturating_add(time::Duration::new(
            (dtn_time.0 / 1000) as i64,
            (dtn_time.0 % 1000 * 1_000_000) as i32,
        ))
    }
}

impl std::fmt::Display for DtnTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", time::OffsetDateTime::from(*self))
    }
}
