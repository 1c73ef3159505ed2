/*!
This module provides functionality for handling Cyclic Redundancy Checks (CRCs)
for bundles, as specified in RFC 9171. It supports CRC-16/X.25 and CRC-32C and
provides functions for parsing and validating CRCs from incoming bundles, as
well as appending CRCs to outgoing bundles.
*/

use dtncore_cbor::decode::{Array, Value};
use thiserror::Error;

const X25: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);
const CASTAGNOLI: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// Errors that can occur during CRC processing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid CRC type {0}")]
    InvalidType(u64),

    #[error("block has unexpected CRC value length {0}")]
    InvalidLength(usize),

    #[error("block has a CRC value with no CRC type specified")]
    UnexpectedCrcValue,

    #[error("incorrect CRC value")]
    IncorrectCrc,

    #[error("missing CRC value")]
    MissingCrc,

    #[error(transparent)]
    InvalidCbor(#[from] dtncore_cbor::decode::Error),
}

/// The type of CRC used in a bundle or block.
#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrcType {
    #[default]
    None,
    CRC16_X25,
    CRC32_CASTAGNOLI,
    Unrecognised(u64),
}

impl From<u64> for CrcType {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::CRC16_X25,
            2 => Self::CRC32_CASTAGNOLI,
            v => Self::Unrecognised(v),
        }
    }
}

impl From<CrcType> for u64 {
    fn from(value: CrcType) -> Self {
        match value {
            CrcType::None => 0,
            CrcType::CRC16_X25 => 1,
            CrcType::CRC32_CASTAGNOLI => 2,
            CrcType::Unrecognised(v) => v,
        }
    }
}

impl dtncore_cbor::encode::ToCbor for CrcType {
    type Result = ();

    fn to_cbor(&self, encoder: &mut dtncore_cbor::encode::Encoder) -> Self::Result {
        encoder.emit(&u64::from(*self))
    }
}

impl dtncore_cbor::decode::FromCbor for CrcType {
    type Error = self::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        dtncore_cbor::decode::parse::<(u64, bool, usize)>(data)
            .map(|(v, shortest, len)| (v.into(), shortest, len))
            .map_err(Into::into)
    }
}

/// Parses and validates the CRC value trailing a block's CBOR array.
///
/// `data` is the raw byte slice of the entire block; `block` is the array
/// cursor positioned at the (final) CRC field. Returns whether the CRC field
/// was encoded in shortest form.
pub(crate) fn parse_crc_value(data: &[u8], block: &mut Array, crc_type: CrcType) -> Result<bool, Error> {
    let crc_start = block.offset();
    let crc_value = block
        .try_parse_value(|value, shortest, tags| {
            if let Value::Bytes(crc) = value {
                Ok((crc.start + crc_start..crc.end + crc_start, shortest && tags.is_empty()))
            } else {
                Err(Error::InvalidCbor(dtncore_cbor::decode::Error::IncorrectType(
                    "definite-length byte string".to_string(),
                    value.type_name(!tags.is_empty()),
                )))
            }
        })?
        .map(|(v, _)| v);
    let crc_end = block.offset();

    match (crc_type, crc_value) {
        (CrcType::None, None) => Ok(true),
        (CrcType::None, _) => Err(Error::UnexpectedCrcValue),
        (CrcType::CRC16_X25, Some((crc, shortest))) => {
            let crc_value = u16::from_be_bytes(
                data[crc.start..crc.end].try_into().map_err(|_| Error::InvalidLength(crc.len()))?,
            );
            let mut digest = X25.digest();
            if crc.start > 0 {
                digest.update(&data[0..crc.start]);
            }
            digest.update(&[0u8; 2]);
            if crc_end > crc.end {
                digest.update(&data[crc.end..crc_end]);
            }
            if crc_value != digest.finalize() {
                Err(Error::IncorrectCrc)
            } else {
                Ok(shortest)
            }
        }
        (CrcType::CRC32_CASTAGNOLI, Some((crc, shortest))) => {
            let crc_value = u32::from_be_bytes(
                data[crc.start..crc.end].try_into().map_err(|_| Error::InvalidLength(crc.len()))?,
            );
            let mut digest = CASTAGNOLI.digest();
            if crc.start > 0 {
                digest.update(&data[0..crc.start]);
            }
            digest.update(&[0u8; 4]);
            if crc_end > crc.end {
                digest.update(&data[crc.end..crc_end]);
            }
            if crc_value != digest.finalize() {
                Err(Error::IncorrectCrc)
            } else {
                Ok(shortest)
            }
        }
        (CrcType::Unrecognised(t), _) => Err(Error::InvalidType(t)),
        _ => Err(Error::MissingCrc),
    }
}

/// Appends a zeroed CRC placeholder of the right width, computes the CRC over
/// the resulting byte sequence, and overwrites the placeholder with the
/// result in big-endian byte order.
pub(crate) fn append_crc_value(crc_type: CrcType, mut data: Vec<u8>) -> Result<Vec<u8>, Error> {
    match crc_type {
        CrcType::None => {}
        CrcType::CRC16_X25 => {
            data.push(0x42);
            let mut digest = X25.digest();
            digest.update(&data);
            digest.update(&[0; 2]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        CrcType::CRC32_CASTAGNOLI => {
            data.push(0x44);
            let mut digest = CASTAGNOLI.digest();
            digest.update(&data);
            digest.update(&[0; 4]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        CrcType::Unrecognised(t) => return Err(Error::InvalidType(t)),
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25_test_vector() {
        let mut digest = X25.digest();
        digest.update(b"123456789");
        assert_eq!(digest.finalize(), 0x906E);
    }

    #[test]
    fn castagnoli_test_vector() {
        let mut digest = CASTAGNOLI.digest();
        digest.update(b"123456789");
        assert_eq!(digest.finalize(), 0xE306_9283);
    }

    #[test]
    fn append_then_parse_round_trips_crc16() {
        let body = dtncore_cbor::encode::emit_array(Some(3), |a| {
            a.emit(&1u64);
            a.emit(&2u64);
            a.skip_value();
        });
        let data = append_crc_value(CrcType::CRC16_X25, body).unwrap();
        dtncore_cbor::decode::parse_array(&data, |a, _, _| {
            let (_v, _s): (u64, bool) = a.parse()?;
            let (_v, _s): (u64, bool) = a.parse()?;
            let shortest = parse_crc_value(&data, a, CrcType::CRC16_X25)?;
            assert!(shortest);
            Ok::<_, Error>(())
        })
        .unwrap();
    }

    #[test]
    fn tampered_crc16_is_rejected() {
        let body = dtncore_cbor::encode::emit_array(Some(3), |a| {
            a.emit(&1u64);
            a.emit(&2u64);
            a.skip_value();
        });
        let mut data = append_crc_value(CrcType::CRC16_X25, body).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        let result = dtncore_cbor::decode::parse_array(&data, |a, _, _| {
            let (_v, _s): (u64, bool) = a.parse()?;
            let (_v, _s): (u64, bool) = a.parse()?;
            parse_crc_value(&data, a, CrcType::CRC16_X25)
        });
        assert!(matches!(result, Err(Error::IncorrectCrc)));
    }
}
