/*!
The bundle container: a primary block, exactly one payload block, and any
number of extension blocks.
*/

use std::collections::HashSet;

use crate::block::{Block, BlockData};
use crate::block_flags::BlockFlags;
use crate::bundle_flags::BundleFlags;
use crate::bundle_id::BundleId;
use crate::creation_timestamp::CreationTimestamp;
use crate::crc::CrcType;
use crate::dtn_time::DtnTime;
use crate::eid::Eid;
use crate::error::Error;
use crate::primary_block::PrimaryBlock;

const MAX_RECURSION: usize = 32;

/// A complete bundle: one primary block, one payload block, and zero or more
/// extension blocks with unique numbers >= 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub primary: PrimaryBlock,
    pub payload: Block,
    pub extensions: Vec<Block>,
}

impl Bundle {
    /// Builds a new bundle carrying `payload` as its application data unit.
    /// `report_to` defaults to `source` when omitted; the CRC type of both
    /// primary and payload block defaults to CRC-16/X.25.
    pub fn create(
        destination: Eid,
        source: Eid,
        payload: Vec<u8>,
        lifetime_ms: u64,
        report_to: Option<Eid>,
        flags: Option<BundleFlags>,
    ) -> Result<Self, Error> {
        let report_to = report_to.unwrap_or_else(|| source.clone());
        let primary = PrimaryBlock::new(
            flags.unwrap_or_default(),
            CrcType::CRC16_X25,
            destination,
            source,
            report_to,
            CreationTimestamp::now(),
            lifetime_ms,
            None,
        )?;
        let payload = Block::new(
            1,
            BlockFlags::default(),
            CrcType::CRC16_X25,
            BlockData::Payload(payload.into_boxed_slice()),
        );
        Ok(Self {
            primary,
            payload,
            extensions: Vec::new(),
        })
    }

    /// Adds an extension block. A block number of 0 or 1 is replaced with
    /// `max(existing extension numbers, 1) + 1`; any other number must be
    /// unique among the bundle's extensions. Rejects a second payload block.
    pub fn add_extension(&mut self, mut block: Block) -> Result<(), Error> {
        if matches!(block.data, BlockData::Payload(_)) {
            return Err(Error::DuplicateBlockNumber(1));
        }
        if block.number <= 1 {
            block.number = self.extensions.iter().map(|b| b.number).max().unwrap_or(1) + 1;
        } else if self.extensions.iter().any(|b| b.number == block.number) {
            return Err(Error::DuplicateBlockNumber(block.number));
        }
        self.extensions.push(block);
        Ok(())
    }

    /// This bundle's identity: source, creation timestamp, and fragment
    /// offset if it is a fragment.
    pub fn id(&self) -> BundleId {
        BundleId::new(
            self.primary.source.clone(),
            self.primary.timestamp,
            self.primary.fragment.map(|f| f.offset),
        )
    }

    /// Whether this bundle's lifetime has elapsed as of `now`. A bundle with
    /// an unknown creation time never expires.
    pub fn is_expired(&self, now: DtnTime) -> bool {
        let creation_ms = self.primary.timestamp.time.millisecs();
        if creation_ms == 0 {
            return false;
        }
        now.millisecs() > creation_ms + self.primary.lifetime_ms
    }

    /// Encodes the bundle as an indefinite-length outer CBOR array:
    /// primary block, payload block, extension blocks, break.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let primary_bytes = self.primary.encode()?;
        let payload_bytes = self.payload.encode()?;
        let extension_bytes = self
            .extensions
            .iter()
            .map(Block::encode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(dtncore_cbor::encode::emit_array(None, |a| {
            a.emit(&dtncore_cbor::encode::Raw(&primary_bytes));
            a.emit(&dtncore_cbor::encode::Raw(&payload_bytes));
            for bytes in &extension_bytes {
                a.emit(&dtncore_cbor::encode::Raw(bytes));
            }
        }))
    }

    /// Decodes a bundle from its outer CBOR array, verifying that exactly
    /// one payload block is present and that all block numbers are unique.
    pub fn decode(data: &[u8]) -> Result<(Self, bool, usize), Error> {
        dtncore_cbor::decode::parse_array(data, |a, tags_shortest, tags| {
            let mut shortest = tags_shortest && tags.is_empty() && !a.is_definite();

            let mut primary = None;
            let mut payload = None;
            let mut extensions = Vec::new();
            let mut seen_numbers = HashSet::new();
            seen_numbers.insert(1u64);

            while let Some((s, item_len)) = a.try_parse_value(|mut value, item_shortest, item_tags| {
                let ss = value.skip(MAX_RECURSION)?;
                Ok::<_, Error>(ss && item_shortest && item_tags.is_empty())
            })? {
                let field_start = a.offset() - item_len;
                let raw = &data[field_start..field_start + item_len];

                if primary.is_none() {
                    let (block, block_shortest, len) = PrimaryBlock::decode(raw)?;
                    debug_assert_eq!(len, item_len);
                    shortest = shortest && s && block_shortest;
                    primary = Some(block);
                    continue;
                }

                let (block, block_shortest, len) = Block::decode(raw)?;
                debug_assert_eq!(len, item_len);
                shortest = shortest && s && block_shortest;

                match &block.data {
                    BlockData::Payload(_) => {
                        if payload.is_some() {
                            return Err(Error::DuplicateBlockNumber(1));
                        }
                        payload = Some(block);
                    }
                    _ => {
                        if !seen_numbers.insert(block.number) {
                            return Err(Error::DuplicateBlockNumber(block.number));
                        }
                        extensions.push(block);
                    }
                }
            }

            let primary = primary.ok_or(Error::InvalidCbor(dtncore_cbor::decode::Error::NeedMoreData(1)))?;
            let payload = payload.ok_or(Error::MissingPayload)?;

            Ok::<_, Error>((
                Self {
                    primary,
                    payload,
                    extensions,
                },
                shortest,
            ))
        })
        .map(|((bundle, shortest), len)| (bundle, shortest, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipn(node: u64, service: u64) -> Eid {
        Eid::Ipn { node, service }
    }

    #[test]
    fn round_trips_with_no_extensions() {
        let bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 3_600_000, None, None).unwrap();
        let bytes = bundle.encode().unwrap();
        let (decoded, shortest, len) = Bundle::decode(&bytes).unwrap();
        assert_eq!(decoded, bundle);
        assert!(shortest);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn outer_array_is_indefinite_length() {
        let bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        let bytes = bundle.encode().unwrap();
        assert_eq!(bytes[0], (4 << 5) | 31);
        assert_eq!(*bytes.last().unwrap(), 0xFF);
    }

    #[test]
    fn report_to_defaults_to_source() {
        let bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        assert_eq!(bundle.primary.report_to, ipn(1, 1));
    }

    #[test]
    fn round_trips_with_extension_blocks() {
        let mut bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        bundle
            .add_extension(Block::new(0, BlockFlags::default(), CrcType::None, BlockData::BundleAge(42)))
            .unwrap();
        bundle
            .add_extension(Block::new(
                0,
                BlockFlags::default(),
                CrcType::CRC32_CASTAGNOLI,
                BlockData::HopCount { limit: 32, count: 1 },
            ))
            .unwrap();
        assert_eq!(bundle.extensions[0].number, 2);
        assert_eq!(bundle.extensions[1].number, 3);

        let bytes = bundle.encode().unwrap();
        let (decoded, shortest, _) = Bundle::decode(&bytes).unwrap();
        assert_eq!(decoded, bundle);
        assert!(shortest);
    }

    #[test]
    fn add_extension_rejects_duplicate_number() {
        let mut bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        bundle
            .add_extension(Block::new(5, BlockFlags::default(), CrcType::None, BlockData::BundleAge(1)))
            .unwrap();
        let result = bundle.add_extension(Block::new(5, BlockFlags::default(), CrcType::None, BlockData::BundleAge(2)));
        assert!(matches!(result, Err(Error::DuplicateBlockNumber(5))));
    }

    #[test]
    fn add_extension_rejects_second_payload() {
        let mut bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        let result = bundle.add_extension(Block::new(0, BlockFlags::default(), CrcType::None, BlockData::Payload(Box::new([]))));
        assert!(matches!(result, Err(Error::DuplicateBlockNumber(1))));
    }

    #[test]
    fn decode_rejects_missing_payload() {
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
        let bytes = dtncore_cbor::encode::emit_array(None, |a| {
            a.emit(&dtncore_cbor::encode::Raw(&primary.encode().unwrap()));
        });
        assert!(matches!(Bundle::decode(&bytes), Err(Error::MissingPayload)));
    }

    #[test]
    fn bundle_id_reflects_source_and_timestamp() {
        let bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        let id = bundle.id();
        assert_eq!(id.source, ipn(1, 1));
        assert_eq!(id.timestamp, bundle.primary.timestamp);
        assert_eq!(id.fragment_offset, None);
    }

    #[test]
    fn unknown_creation_time_never_expires() {
        let mut bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 0, None, None).unwrap();
        bundle.primary.timestamp = CreationTimestamp::unknown();
        assert!(!bundle.is_expired(DtnTime::new(u64::MAX)));
    }

    #[test]
    fn expiry_is_relative_to_creation_and_lifetime() {
        let mut bundle = Bundle::create(ipn(2, 1), ipn(1, 1), b"hello".to_vec(), 1000, None, None).unwrap();
        bundle.primary.timestamp = CreationTimestamp {
            time: DtnTime::new(10_000),
            sequence_number: 0,
        };
        assert!(!bundle.is_expired(DtnTime::new(10_999)));
        assert!(bundle.is_expired(DtnTime::new(11_001)));
    }
}
