/*!
Canonical blocks: the payload block and the extension blocks that can be
attached alongside it.
*/

use crate::block_flags::BlockFlags;
use crate::block_type::BlockType;
use crate::crc::{self, CrcType};
use crate::eid::Eid;
use crate::error::{CaptureFieldErr, Error};
use dtncore_cbor::decode::Value;

const MAX_RECURSION: usize = 32;

/// The type-specific payload of a canonical block.
///
/// The variant a block decodes to is determined entirely by its wire type
/// code; there is no way to construct a `Block` whose type code and data
/// shape disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockData {
    /// The bundle's application data unit.
    Payload(Box<[u8]>),

    /// The EID of the node that last forwarded this bundle.
    PreviousNode(Eid),

    /// Microseconds elapsed since the bundle's creation.
    BundleAge(u64),

    /// Fragmentation hop-count: limit and current count.
    HopCount { limit: u64, count: u64 },

    /// An extension block of a type this implementation does not
    /// understand. `data` is the raw, still-encoded CBOR bytes of the
    /// block's data item, preserved so the bundle can be re-encoded
    /// unchanged.
    Opaque { block_type: u64, data: Box<[u8]> },
}

impl BlockData {
    /// The wire type code for this block's data.
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockData::Payload(_) => BlockType::Payload,
            BlockData::PreviousNode(_) => BlockType::PreviousNode,
            BlockData::BundleAge(_) => BlockType::BundleAge,
            BlockData::HopCount { .. } => BlockType::HopCount,
            BlockData::Opaque { block_type, .. } => BlockType::Unknown(*block_type),
        }
    }
}

/// A canonical block: the payload block or one of the extension blocks
/// attached to a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub flags: BlockFlags,
    pub crc_type: CrcType,
    pub data: BlockData,
}

impl Block {
    pub fn new(number: u64, flags: BlockFlags, crc_type: CrcType, data: BlockData) -> Self {
        Self {
            number,
            flags,
            crc_type,
            data,
        }
    }

    /// Encodes this block as a standalone, complete CBOR array, with a valid
    /// trailing CRC if `crc_type` is not `None`.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let has_crc = !matches!(self.crc_type, CrcType::None);
        let count = if has_crc { 6 } else { 5 };
        let body = dtncore_cbor::encode::emit_array(Some(count), |a| {
            a.emit(&u64::from(self.data.block_type()));
            a.emit(&self.number);
            a.emit(&self.flags);
            a.emit(&self.crc_type);
            match &self.data {
                BlockData::Payload(bytes) => {
                    a.emit(&dtncore_cbor::encode::Bytes(bytes));
                }
                BlockData::PreviousNode(eid) => {
                    a.emit(eid);
                }
                BlockData::BundleAge(age) => {
                    a.emit(age);
                }
                BlockData::HopCount { limit, count } => {
                    a.emit_array(Some(2), |a| {
                        a.emit(limit);
                        a.emit(count);
                    });
                }
                BlockData::Opaque { data, .. } => {
                    a.emit(&dtncore_cbor::encode::Raw(data));
                }
            }
            if has_crc {
                a.skip_value();
            }
        });
        crc::append_crc_value(self.crc_type, body).map_err(Error::from)
    }

    /// Decodes a block from its standalone CBOR array representation,
    /// verifying its CRC if one is present.
    pub fn decode(data: &[u8]) -> Result<(Self, bool, usize), Error> {
        dtncore_cbor::decode::parse_array(data, |a, mut shortest, tags| {
            shortest = shortest && tags.is_empty() && a.is_definite();

            let (raw_type, s1): (u64, bool) = a.parse().map_field_err("type")?;
            let (number, s2): (u64, bool) = a.parse().map_field_err("number")?;
            let (flags, s3): (BlockFlags, bool) = a.parse().map_field_err("flags")?;
            let (crc_type, s4): (CrcType, bool) = a.parse().map_field_err("crc_type")?;
            shortest = shortest && s1 && s2 && s3 && s4;

            let block_type = BlockType::from(raw_type);
            if matches!(block_type, BlockType::Payload) && number != 1 {
                return Err(Error::InvalidPayloadBlockNumber);
            }
            if !matches!(block_type, BlockType::Payload) && number == 0 {
                return Err(Error::InvalidBlockNumber(number, block_type));
            }

            let (block_data, sd) = match block_type {
                BlockType::Payload => {
                    let field_start = a.offset();
                    let ((bytes, s), _) = a.try_parse_value(|value, shortest, tags| match value {
                        Value::Bytes(r) => Ok((data[r.start + field_start..r.end + field_start].to_vec().into_boxed_slice(), shortest && tags.is_empty())),
                        _ => Err(Error::InvalidCbor(dtncore_cbor::decode::Error::IncorrectType(
                            "definite-length byte string".to_string(),
                            value.type_name(!tags.is_empty()),
                        ))),
                    })?
                    .ok_or(Error::InvalidCbor(dtncore_cbor::decode::Error::NeedMoreData(1)))?;
                    (BlockData::Payload(bytes), s)
                }
                BlockType::PreviousNode => {
                    let (eid, s): (Eid, bool) = a.parse().map_field_err("previous_node")?;
                    (BlockData::PreviousNode(eid), s)
                }
                BlockType::BundleAge => {
                    let (age, s): (u64, bool) = a.parse().map_field_err("bundle_age")?;
                    (BlockData::BundleAge(age), s)
                }
                BlockType::HopCount => {
                    let ((limit, count, s), _) = a.parse_array(|a, s, tags| {
                        let (limit, sl): (u64, bool) = a.parse().map_field_err("hop_limit")?;
                        let (count, sc): (u64, bool) = a.parse().map_field_err("hop_count")?;
                        Ok::<_, Error>((limit, count, s && tags.is_empty() && sl && sc))
                    })?;
                    (BlockData::HopCount { limit, count }, s)
                }
                BlockType::Unknown(t) => {
                    let field_start = a.offset();
                    let ((_, s), len) = a.try_parse_value(|mut value, shortest, tags| {
                        let ss = value.skip(MAX_RECURSION)?;
                        Ok::<_, Error>(((), ss && shortest && tags.is_empty()))
                    })?
                    .ok_or(Error::InvalidCbor(dtncore_cbor::decode::Error::NeedMoreData(1)))?;
                    let raw = data[field_start..field_start + len].to_vec().into_boxed_slice();
                    (BlockData::Opaque { block_type: t, data: raw }, s)
                }
            };
            shortest = shortest && sd;

            if has_trailing_crc(crc_type) {
                shortest = shortest && crc::parse_crc_value(data, a, crc_type)?;
            }

            Ok::<_, Error>((
                Self {
                    number,
                    flags,
                    crc_type,
                    data: block_data,
                },
                shortest,
            ))
        })
        .map(|((block, shortest), len)| (block, shortest, len))
    }
}

fn has_trailing_crc(crc_type: CrcType) -> bool {
    !matches!(crc_type, CrcType::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_block_round_trips_with_crc16() {
        let block = Block::new(1, BlockFlags::default(), CrcType::CRC16_X25, BlockData::Payload(b"Hello, DTN!".to_vec().into_boxed_slice()));
        let bytes = block.encode().unwrap();
        let (decoded, shortest, len) = Block::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert!(shortest);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn empty_payload_block_has_six_elements_and_verifies() {
        let block = Block::new(1, BlockFlags::default(), CrcType::CRC16_X25, BlockData::Payload(Box::new([])));
        let bytes = block.encode().unwrap();
        assert_eq!(bytes[0] >> 5, 4);
        assert_eq!(bytes[0] & 0x1F, 6);
        let (_, shortest, _) = Block::decode(&bytes).unwrap();
        assert!(shortest);
    }

    #[test]
    fn hop_count_round_trips() {
        let block = Block::new(3, BlockFlags::default(), CrcType::None, BlockData::HopCount { limit: 32, count: 2 });
        let bytes = block.encode().unwrap();
        let (decoded, _, _) = Block::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn previous_node_round_trips() {
        let block = Block::new(4, BlockFlags::default(), CrcType::None, BlockData::PreviousNode(Eid::Ipn { node: 1, service: 0 }));
        let bytes = block.encode().unwrap();
        let (decoded, _, _) = Block::decode(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn unknown_extension_type_preserved_opaquely() {
        let raw_data = dtncore_cbor::encode::emit_array(Some(2), |a| {
            a.emit(&1u64);
            a.emit(&2u64);
        });
        let block = Block::new(5, BlockFlags::default(), CrcType::None, BlockData::Opaque { block_type: 192, data: raw_data.clone().into_boxed_slice() });
        let bytes = block.encode().unwrap();
        let (decoded, _, _) = Block::decode(&bytes).unwrap();
        match decoded.data {
            BlockData::Opaque { block_type, data } => {
                assert_eq!(block_type, 192);
                assert_eq!(&*data, raw_data.as_slice());
            }
            _ => panic!("expected opaque block"),
        }
    }

    #[test]
    fn tampered_crc_is_rejected() {
        let block = Block::new(1, BlockFlags::default(), CrcType::CRC32_CASTAGNOLI, BlockData::Payload(b"data".to_vec().into_boxed_slice()));
        let mut bytes = block.encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Block::decode(&bytes).unwrap_err(),
            Error::InvalidCrc(crc::Error::IncorrectCrc)
        ));
    }

    #[test]
    fn payload_block_number_must_be_one() {
        let block = Block::new(2, BlockFlags::default(), CrcType::None, BlockData::Payload(Box::new([])));
        let bytes = block.encode().unwrap();
        assert!(matches!(Block::decode(&bytes).unwrap_err(), Error::InvalidPayloadBlockNumber));
    }
}
