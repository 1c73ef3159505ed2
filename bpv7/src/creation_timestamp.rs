/*!
A bundle's creation timestamp: the pair of [`DtnTime`](crate::dtn_time::DtnTime)
and sequence number that, together with the source EID, gives a bundle its
identity.
*/

use crate::dtn_time::DtnTime;

/// A bundle creation timestamp.
///
/// If the bundle's source EID is `dtn:none`, the timestamp must be the zero
/// value: unknown time, sequence number 0.
#[derive(Default, Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CreationTimestamp {
    pub time: DtnTime,
    pub sequence_number: u64,
}

impl CreationTimestamp {
    /// Creates a timestamp representing the current time, with sequence
    /// number 0.
    pub fn now() -> Self {
        Self {
            time: DtnTime::now(),
            sequence_number: 0,
        }
    }

    /// The all-zero timestamp required of bundles from the null source.
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl dtncore_cbor::encode::ToCbor for CreationTimestamp {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.time);
            a.emit(&self.sequence_number);
        })
    }
}

impl dtncore_cbor::decode::FromCbor for CreationTimestamp {
    type Error = dtncore_cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        dtncore_cbor::decode::parse_array(data, |a, mut shortest, tags| {
            shortest = shortest && tags.is_empty() && a.is_definite();
            let (time, s1): (DtnTime, bool) = a.parse()?;
            let (sequence_number, s2): (u64, bool) = a.parse()?;
            shortest = shortest && s1 && s2;
            Ok::<_, dtncore_cbor::decode::Error>((Self { time, sequence_number }, shortest))
        })
        .map(|((timestamp, shortest), len)| (timestamp, shortest, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtncore_cbor::decode::FromCbor;

    #[test]
    fn round_trips_through_cbor() {
        let ts = CreationTimestamp {
            time: DtnTime::new(1_700_000_000_000),
            sequence_number: 3,
        };
        let (bytes, ()) = dtncore_cbor::encode::emit(&ts);
        let (decoded, shortest, len) = CreationTimestamp::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, ts);
        assert!(shortest);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn unknown_is_zero_and_zero_sequence() {
        let ts = CreationTimestamp::unknown();
        assert_eq!(ts.time.millisecs(), 0);
        assert_eq!(ts.sequence_number, 0);
    }
}
