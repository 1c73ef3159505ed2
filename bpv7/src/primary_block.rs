/*!
The primary block: the fixed header every bundle carries exactly one of.
*/

use crate::bundle_flags::BundleFlags;
use crate::creation_timestamp::CreationTimestamp;
use crate::crc::{self, CrcType};
use crate::eid::Eid;
use crate::error::{CaptureFieldErr, Error};

/// The BPv7 version this implementation produces and accepts.
pub const BP_VERSION: u64 = 7;

/// The fragment-specific fields of a primary block, present iff the bundle's
/// [`BundleFlags::is_fragment`] flag is set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    pub offset: u64,
    pub total_application_data_unit_length: u64,
}

/// A bundle's primary block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub crc_type: CrcType,
    pub destination: Eid,
    pub source: Eid,
    pub report_to: Eid,
    pub timestamp: CreationTimestamp,
    pub lifetime_ms: u64,
    pub fragment: Option<FragmentInfo>,
}

impl PrimaryBlock {
    /// Validates the invariants that must hold regardless of where the
    /// fields came from: fragment fields match `is_fragment`, and an
    /// anonymous source implies an unknown creation timestamp.
    fn validate(&self) -> Result<(), Error> {
        match (self.flags.is_fragment, self.fragment) {
            (true, None) => {
                return Err(Error::InvalidFragmentInfo(0, 0));
            }
            (false, Some(f)) => {
                return Err(Error::InvalidFragmentInfo(f.offset, f.total_application_data_unit_length));
            }
            _ => {}
        }
        if matches!(self.source, Eid::Null) && self.timestamp != CreationTimestamp::unknown() {
            return Err(Error::AnonymousSourceViolation);
        }
        Ok(())
    }

    pub fn new(
        flags: BundleFlags,
        crc_type: CrcType,
        destination: Eid,
        source: Eid,
        report_to: Eid,
        timestamp: CreationTimestamp,
        lifetime_ms: u64,
        fragment: Option<FragmentInfo>,
    ) -> Result<Self, Error> {
        let block = Self {
            flags,
            crc_type,
            destination,
            source,
            report_to,
            timestamp,
            lifetime_ms,
            fragment,
        };
        block.validate()?;
        Ok(block)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;

        let has_crc = !matches!(self.crc_type, CrcType::None);
        let count = 8 + if self.fragment.is_some() { 2 } else { 0 } + if has_crc { 1 } else { 0 };
        let body = dtncore_cbor::encode::emit_array(Some(count), |a| {
            a.emit(&BP_VERSION);
            a.emit(&self.flags);
            a.emit(&self.crc_type);
            a.emit(&self.destination);
            a.emit(&self.source);
            a.emit(&self.report_to);
            a.emit(&self.timestamp);
            a.emit(&self.lifetime_ms);
            if let Some(f) = self.fragment {
                a.emit(&f.offset);
                a.emit(&f.total_application_data_unit_length);
            }
            if has_crc {
                a.skip_value();
            }
        });
        crc::append_crc_value(self.crc_type, body).map_err(Error::from)
    }

    pub fn decode(data: &[u8]) -> Result<(Self, bool, usize), Error> {
        dtncore_cbor::decode::parse_array(data, |a, mut shortest, tags| {
            shortest = shortest && tags.is_empty() && a.is_definite();

            let (version, sv): (u64, bool) = a.parse().map_field_err("version")?;
            if version != BP_VERSION {
                return Err(Error::InvalidVersion(version));
            }

            let (flags, s1): (BundleFlags, bool) = a.parse().map_field_err("flags")?;
            let (crc_type, s2): (CrcType, bool) = a.parse().map_field_err("crc_type")?;
            let (destination, s3): (Eid, bool) = a.parse().map_field_err("destination")?;
            let (source, s4): (Eid, bool) = a.parse().map_field_err("source")?;
            let (report_to, s5): (Eid, bool) = a.parse().map_field_err("report_to")?;
            let (timestamp, s6): (CreationTimestamp, bool) = a.parse().map_field_err("creation_timestamp")?;
            let (lifetime_ms, s7): (u64, bool) = a.parse().map_field_err("lifetime")?;
            shortest = shortest && sv && s1 && s2 && s3 && s4 && s5 && s6 && s7;

            let fragment = if flags.is_fragment {
                let (offset, sf1): (u64, bool) = a.parse().map_field_err("fragment_offset")?;
                let (total, sf2): (u64, bool) = a.parse().map_field_err("total_application_data_unit_length")?;
                shortest = shortest && sf1 && sf2;
                Some(FragmentInfo {
                    offset,
                    total_application_data_unit_length: total,
                })
            } else {
                None
            };

            if !matches!(crc_type, CrcType::None) {
                shortest = shortest && crc::parse_crc_value(data, a, crc_type)?;
            }

            let block = Self {
                flags,
                crc_type,
                destination,
                source,
                report_to,
                timestamp,
                lifetime_ms,
                fragment,
            };
            block.validate()?;

            Ok::<_, Error>((block, shortest))
        })
        .map(|((block, shortest), len)| (block, shortest, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipn(node: u64, service: u64) -> Eid {
        Eid::Ipn { node, service }
    }

    #[test]
    fn round_trips_with_crc16() {
        let primary = PrimaryBlock::new(
            BundleFlags::default(),
            CrcType::CRC16_X25,
            ipn(2, 1),
            ipn(1, 1),
            ipn(1, 1),
            CreationTimestamp::now(),
            3_600_000,
            None,
        )
        .unwrap();
        let bytes = primary.encode().unwrap();
        let (decoded, shortest, len) = PrimaryBlock::decode(&bytes).unwrap();
        assert_eq!(decoded, primary);
        assert!(shortest);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn fragment_fields_round_trip() {
        let mut flags = BundleFlags::default();
        flags.is_fragment = true;
        let primary = PrimaryBlock::new(
            flags,
            CrcType::None,
            ipn(2, 1),
            ipn(1, 1),
            ipn(1, 1),
            CreationTimestamp::now(),
            1000,
            Some(FragmentInfo {
                offset: 100,
                total_application_data_unit_length: 500,
            }),
        )
        .unwrap();
        let bytes = primary.encode().unwrap();
        let (decoded, _, _) = PrimaryBlock::decode(&bytes).unwrap();
        assert_eq!(decoded.fragment, primary.fragment);
    }

    #[test]
    fn is_fragment_without_fragment_fields_is_rejected() {
        let mut flags = BundleFlags::default();
        flags.is_fragment = true;
        let result = PrimaryBlock::new(
            flags,
            CrcType::None,
            ipn(2, 1),
            ipn(1, 1),
            ipn(1, 1),
            CreationTimestamp::now(),
            1000,
            None,
        );
        assert!(matches!(result, Err(Error::InvalidFragmentInfo(0, 0))));
    }

    #[test]
    fn anonymous_source_requires_unknown_timestamp() {
        let result = PrimaryBlock::new(
            BundleFlags::default(),
            CrcType::None,
            ipn(2, 1),
            Eid::Null,
            Eid::Null,
            CreationTimestamp::now(),
            1000,
            None,
        );
        assert!(matches!(result, Err(Error::AnonymousSourceViolation)));

        let ok = PrimaryBlock::new(
            BundleFlags::default(),
            CrcType::None,
            ipn(2, 1),
            Eid::Null,
            Eid::Null,
            CreationTimestamp::unknown(),
            1000,
            None,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let primary = PrimaryBlock::new(
            BundleFlags::default(),
            CrcType::None,
            ipn(2, 1),
            ipn(1, 1),
            ipn(1, 1),
            CreationTimestamp::now(),
            1000,
            None,
        )
        .unwrap();
        let mut bytes = primary.encode().unwrap();
        // Byte 0 is the array header; byte 1 is the version field (a single
        // byte, since 7 < 24).
        assert_eq!(bytes[1], 7);
        bytes[1] = 6;
        assert!(matches!(PrimaryBlock::decode(&bytes), Err(Error::InvalidVersion(6))));
    }
}
