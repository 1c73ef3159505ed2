//! A canonical CBOR decoder for parsing byte streams.
//!
//! This module decodes data in the Concise Binary Object Representation
//! (CBOR) format, as specified in [RFC 8949](https://www.rfc-editor.org/rfc/rfc8949.html).
//! It accepts the full major-type grammar: definite and indefinite-length
//! items, semantic tags, and all seven major types.
//!
//! # Core Concepts
//!
//! There are two primary ways to use the decoder:
//!
//! 1. **Direct deserialization with [`FromCbor`]:** implement the trait for a
//!    type and call [`FromCbor::from_cbor`] to decode it straight from a byte
//!    slice.
//! 2. **Streaming parsing with the `parse_*` functions:** [`parse_value`],
//!    [`parse_array`] and [`parse_map`] walk the stream item by item without
//!    intermediate allocation, handing a [`Value`] to a caller-supplied
//!    closure.
//!
//! ```
//! use dtncore_cbor::decode::{self, FromCbor, Error};
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl FromCbor for Point {
//!     type Error = Error;
//!
//!     fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
//!         decode::parse_array(data, |a, shortest, _| {
//!             let (x, sx) = a.parse()?;
//!             let (y, sy) = a.parse()?;
//!             Ok((Point { x, y }, shortest && sx && sy))
//!         })
//!         .map(|((v, s), len)| (v, s, len))
//!     }
//! }
//!
//! let bytes = &[0x82, 0x0A, 0x33];
//! let (point, shortest, len) = Point::from_cbor(bytes).unwrap();
//! assert_eq!(point.x, 10);
//! assert_eq!(point.y, -20);
//! assert!(shortest);
//! assert_eq!(len, bytes.len());
//! ```

use num_traits::{FromPrimitive, ToPrimitive};
use std::ops::Range;
use std::str::Utf8Error;
use thiserror::Error;

/// An error that can occur during CBOR decoding.
#[derive(Error, Debug)]
pub enum Error {
    /// An encoded item's length exceeds `usize::MAX` or available memory.
    #[error("an encoded item requires more memory than available")]
    TooBig,

    /// The input data is incomplete and more bytes are needed to decode the value.
    #[error("need at least {0} more bytes to decode value")]
    NeedMoreData(usize),

    /// The input data contains extra, unread items after a sequence has been fully parsed.
    #[error("additional unread items in sequence")]
    AdditionalItems,

    /// An attempt was made to parse an item from a sequence that has already ended.
    #[error("no more items in sequence")]
    NoMoreItems,

    /// The CBOR item has an invalid minor type value for its major type.
    #[error("invalid minor-type value {0}")]
    InvalidMinorValue(u8),

    /// The CBOR item's type does not match the expected type.
    #[error("incorrect type, expecting {0}, found {1}")]
    IncorrectType(String, String),

    /// An indefinite-length string contains an invalid chunk (e.g., not a string type).
    #[error("chunked string contains an invalid chunk")]
    InvalidChunk,

    /// A simple value was found that is unassigned or reserved.
    #[error("invalid simple type {0}")]
    InvalidSimpleType(u8),

    /// An indefinite-length map is missing a value for a key.
    #[error("map has key but no value")]
    PartialMap,

    /// The maximum recursion depth was reached while decoding nested structures.
    #[error("maximum recursion depth reached")]
    MaxRecursion,

    /// A text string contains invalid UTF-8.
    #[error(transparent)]
    InvalidUtf8(#[from] Utf8Error),

    /// An integer conversion failed, typically due to an out-of-range value.
    #[error(transparent)]
    TryFromIntError(#[from] std::num::TryFromIntError),

    /// A floating-point conversion would result in a loss of precision.
    #[error("loss of floating-point precision")]
    PrecisionLoss,
}

/// A trait for types that can be decoded from a CBOR byte slice.
///
/// The library provides implementations for the common primitive types,
/// `String`, `Option<T>` and tuples.
pub trait FromCbor: Sized {
    type Error;

    /// Decodes an instance of the type from the beginning of a CBOR byte slice.
    ///
    /// On success, returns a tuple of the decoded value, whether it was
    /// encoded in its shortest canonical form, and the number of bytes
    /// consumed from `data`.
    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error>;
}

/// A generic, untyped CBOR sequence: a series of top-level data items, not
/// enclosed in an array.
pub type Sequence<'a> = super::decode_seq::Series<'a, 0>;
/// A [`Series`] over the elements of a CBOR array.
pub type Array<'a> = super::decode_seq::Series<'a, 1>;
/// A [`Series`] over the key/value pairs of a CBOR map.
pub type Map<'a> = super::decode_seq::Series<'a, 2>;
/// A stateful cursor for decoding a sequence of CBOR items.
pub use super::decode_seq::Series;

/// Represents a single, decoded CBOR data item.
pub enum Value<'a, 'b: 'a> {
    UnsignedInteger(u64),
    NegativeInteger(u64),
    Bytes(Range<usize>),
    ByteStream(Vec<Range<usize>>),
    Text(&'b str),
    TextStream(&'a [&'b str]),
    Array(&'a mut Array<'b>),
    Map(&'a mut Map<'b>),
    False,
    True,
    Null,
    Undefined,
    Simple(u8),
    Float(f64),
}

impl<'a, 'b: 'a> Value<'a, 'b> {
    /// Returns a human-readable string describing the type of the CBOR value.
    pub fn type_name(&self, tagged: bool) -> String {
        let prefix = if tagged { "tagged " } else { "untagged " }.to_string();
        match self {
            Value::UnsignedInteger(_) => prefix + "unsigned integer",
            Value::NegativeInteger(_) => prefix + "negative integer",
            Value::Bytes(_) => prefix + "definite-length byte string",
            Value::ByteStream(_) => prefix + "indefinite-length byte string",
            Value::Text(_) => prefix + "definite-length text string",
            Value::TextStream(_) => prefix + "indefinite-length text string",
            Value::Array(a) if a.is_definite() => prefix + "definite-length array",
            Value::Array(_) => prefix + "indefinite-length array",
            Value::Map(m) if m.is_definite() => prefix + "definite-length map",
            Value::Map(_) => prefix + "indefinite-length map",
            Value::False => prefix + "false",
            Value::True => prefix + "true",
            Value::Null => prefix + "null",
            Value::Undefined => prefix + "undefined",
            Value::Simple(v) => format!("{prefix}simple value {v}"),
            Value::Float(_) => prefix + "float",
        }
    }

    /// Skips over the content of the current value.
    ///
    /// For simple types this does nothing; for arrays and maps it consumes
    /// all nested items until the end of the sequence is reached.
    pub fn skip(&mut self, mut max_recursion: usize) -> Result<bool, Error> {
        match self {
            Value::Array(a) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                max_recursion -= 1;
                a.skip_to_end(max_recursion).map(|s| s && a.is_definite())
            }
            Value::Map(m) => {
                if max_recursion == 0 {
                    return Err(Error::MaxRecursion);
                }
                max_recursion -= 1;
                m.skip_to_end(max_recursion).map(|s| s && m.is_definite())
            }
            _ => Ok(true),
        }
    }
}

impl<'a, 'b: 'a> std::fmt::Debug for Value<'a, 'b> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::UnsignedInteger(n) => write!(f, "{n:?}"),
            Value::NegativeInteger(n) => write!(f, "-{n:?}"),
            Value::Bytes(b) => write!(f, "bytes[{b:?}]"),
            Value::ByteStream(b) => write!(f, "byte_stream{b:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::TextStream(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(f, "{a:?}"),
            Value::Map(m) => write!(f, "{m:?}"),
            Value::False => f.write_str("false"),
            Value::True => f.write_str("true"),
            Value::Null => f.write_str("null"),
            Value::Undefined => f.write_str("undefined"),
            Value::Simple(v) => write!(f, "simple value {v}"),
            Value::Float(v) => write!(f, "{v:?}"),
        }
    }
}

fn parse_tags(data: &[u8]) -> Result<(Vec<u64>, bool, usize), Error> {
    let mut tags = Vec::new();
    let mut offset = 0;
    let mut shortest = true;

    while let Some(marker) = data.get(offset) {
        match (marker >> 5, marker & 0x1F) {
            (6, minor) => {
                offset += 1;
                let (tag, s, o) = parse_uint_minor(minor, &data[offset..])?;
                tags.push(tag);
                shortest = shortest && s;
                offset += o;
            }
            _ => break,
        }
    }
    Ok((tags, shortest, offset))
}

fn to_array<const N: usize>(data: &[u8]) -> Result<[u8; N], Error> {
    match data.len().cmp(&N) {
        std::cmp::Ordering::Less => Err(Error::NeedMoreData(N - data.len())),
        std::cmp::Ordering::Equal => Ok(data.try_into().unwrap()),
        std::cmp::Ordering::Greater => Ok(data[0..N].try_into().unwrap()),
    }
}

fn parse_uint_minor(minor: u8, data: &[u8]) -> Result<(u64, bool, usize), Error> {
    match minor {
        24 => {
            if let Some(val) = data.first() {
                Ok((*val as u64, *val > 23, 1))
            } else {
                Err(Error::NeedMoreData(1))
            }
        }
        25 => {
            let v = u16::from_be_bytes(to_array(data)?);
            Ok((v as u64, v > u8::MAX as u16, 2))
        }
        26 => {
            let v = u32::from_be_bytes(to_array(data)?);
            Ok((v as u64, v > u16::MAX as u32, 4))
        }
        27 => {
            let v = u64::from_be_bytes(to_array(data)?);
            Ok((v, v > u32::MAX as u64, 8))
        }
        val if val < 24 => Ok((val as u64, true, 0)),
        _ => Err(Error::InvalidMinorValue(minor)),
    }
}

fn parse_data_minor(minor: u8, data: &[u8]) -> Result<(Range<usize>, bool, usize), Error> {
    let (data_len, shortest, len) = parse_uint_minor(minor, data)?;
    let data_len = data_len
        .checked_add(len as u64)
        .and_then(|data_len| (data_len <= usize::MAX as u64).then_some(data_len as usize))
        .ok_or(Error::TooBig)?;

    if data_len > data.len() {
        Err(Error::NeedMoreData(data_len - data.len()))
    } else {
        Ok((len..data_len, shortest, data_len))
    }
}

fn parse_data_chunked(major: u8, data: &[u8]) -> Result<(Vec<Range<usize>>, bool, usize), Error> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    let mut shortest = true;
    while let Some(v) = data.get(offset) {
        offset += 1;

        if *v == 0xFF {
            return Ok((chunks, shortest, offset));
        }

        if v >> 5 != major {
            return Err(Error::InvalidChunk);
        }

        let (chunk, s, chunk_len) = parse_data_minor(v & 0x1F, &data[offset..])?;
        chunks.push(chunk.start + offset..chunk.end + offset);
        shortest = shortest && s;
        offset += chunk_len;
    }

    Err(Error::NeedMoreData(1))
}

/// Parses a single CBOR value from a byte slice and processes it with a closure.
///
/// This is the core low-level parsing function: it consumes any leading
/// semantic tags, determines the major type of the next item, and hands a
/// [`Value`] to the closure `f`. On success it returns the closure's result
/// together with the total number of bytes consumed.
pub fn parse_value<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    let (tags, mut shortest, mut offset) = parse_tags(data)?;
    let Some(marker) = data.get(offset) else {
        return Err(Error::NeedMoreData(1).into());
    };
    offset += 1;

    match (marker >> 5, marker & 0x1F) {
        (0, minor) => {
            let (v, s, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::UnsignedInteger(v), shortest && s, &tags)
        }
        (1, minor) => {
            let (v, s, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            f(Value::NegativeInteger(v), shortest && s, &tags)
        }
        (2, 31) => {
            let (mut v, s, len) = parse_data_chunked(2, &data[offset..])?;
            for t in v.iter_mut() {
                t.start += offset;
                t.end += offset;
            }
            offset += len;
            f(Value::ByteStream(v), shortest && s, &tags)
        }
        (2, minor) => {
            let (t, s, len) = parse_data_minor(minor, &data[offset..])?;
            let t = t.start + offset..t.end + offset;
            offset += len;
            f(Value::Bytes(t), shortest && s, &tags)
        }
        (3, 31) => {
            let data = &data[offset..];
            let (v, s, len) = parse_data_chunked(3, data)?;
            offset += len;
            let mut t = Vec::with_capacity(v.len());
            for b in v {
                t.push(std::str::from_utf8(&data[b]).map_err(Into::into)?);
            }
            f(Value::TextStream(&t), shortest && s, &tags)
        }
        (3, minor) => {
            let data = &data[offset..];
            let (t, s, len) = parse_data_minor(minor, data)?;
            offset += len;
            f(
                Value::Text(std::str::from_utf8(&data[t]).map_err(Into::into)?),
                shortest && s,
                &tags,
            )
        }
        (4, 31) => {
            let mut a = Array::new(data, None, &mut offset);
            let r = f(Value::Array(&mut a), shortest, &tags)?;
            a.complete(r).map_err(Into::into)
        }
        (4, minor) => {
            let (count, s, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            if count > usize::MAX as u64 {
                return Err(Error::TooBig.into());
            }
            let mut a = Array::new(data, Some(count as usize), &mut offset);
            let r = f(Value::Array(&mut a), shortest && s, &tags)?;
            a.complete(r).map_err(Into::into)
        }
        (5, 31) => {
            let mut m = Map::new(data, None, &mut offset);
            let r = f(Value::Map(&mut m), true, &tags)?;
            m.complete(r).map_err(Into::into)
        }
        (5, minor) => {
            let (count, s, len) = parse_uint_minor(minor, &data[offset..])?;
            offset += len;
            if count > (usize::MAX as u64) / 2 {
                return Err(Error::TooBig.into());
            }
            let mut m = Map::new(data, Some((count * 2) as usize), &mut offset);
            let r = f(Value::Map(&mut m), shortest && s, &tags)?;
            m.complete(r).map_err(Into::into)
        }
        (6, _) => unreachable!(),
        (7, 20) => f(Value::False, shortest, &tags),
        (7, 21) => f(Value::True, shortest, &tags),
        (7, 22) => f(Value::Null, shortest, &tags),
        (7, 23) => f(Value::Undefined, shortest, &tags),
        (7, minor @ 0..=19) => f(Value::Simple(minor), shortest, &tags),
        (7, 24) => {
            let Some(v) = data.get(offset) else {
                return Err(Error::NeedMoreData(1).into());
            };
            offset += 1;
            if *v < 32 {
                return Err(Error::InvalidSimpleType(*v).into());
            }
            f(Value::Simple(*v), shortest, &tags)
        }
        (7, 25) => {
            let v = half::f16::from_be_bytes(to_array(&data[offset..])?);
            offset += 2;
            f(Value::Float(v.into()), shortest, &tags)
        }
        (7, 26) => {
            let v = f32::from_be_bytes(to_array(&data[offset..])?);
            offset += 4;
            if shortest {
                match v.classify() {
                    std::num::FpCategory::Nan
                    | std::num::FpCategory::Infinite
                    | std::num::FpCategory::Zero => {
                        shortest = false;
                    }
                    std::num::FpCategory::Subnormal | std::num::FpCategory::Normal => {
                        if let Some(v16) = <half::f16 as num_traits::FromPrimitive>::from_f32(v)
                            && <half::f16 as num_traits::ToPrimitive>::to_f32(&v16) == Some(v)
                        {
                            shortest = false;
                        }
                    }
                }
            }
            f(Value::Float(v.into()), shortest, &tags)
        }
        (7, 27) => {
            let v = f64::from_be_bytes(to_array(&data[offset..])?);
            offset += 8;
            if shortest {
                match v.classify() {
                    std::num::FpCategory::Nan
                    | std::num::FpCategory::Infinite
                    | std::num::FpCategory::Zero => {
                        shortest = false;
                    }
                    std::num::FpCategory::Subnormal | std::num::FpCategory::Normal => {
                        if let Some(v32) = f32::from_f64(v) {
                            if v32.to_f64() == Some(v) {
                                shortest = false;
                            }
                        } else if let Some(v16) =
                            <half::f16 as num_traits::FromPrimitive>::from_f64(v)
                            && <half::f16 as num_traits::ToPrimitive>::to_f64(&v16) == Some(v)
                        {
                            shortest = false;
                        }
                    }
                }
            }
            f(Value::Float(v), shortest, &tags)
        }
        (7, minor) => {
            return Err(Error::InvalidSimpleType(minor).into());
        }
        _ => unreachable!(),
    }
    .map(|r| (r, offset))
}

/// Parses a generic, untyped CBOR sequence from a byte slice.
///
/// A CBOR sequence is a series of top-level data items, not enclosed in an
/// array. This is used for concatenated CBOR objects.
pub fn parse_sequence<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Sequence) -> Result<T, E>,
    E: From<Error>,
{
    let mut offset = 0;
    let mut s = Sequence::new(data, None, &mut offset);
    let r = f(&mut s)?;
    s.complete(()).map(|_| (r, offset)).map_err(Into::into)
}

/// Parses a CBOR array from a byte slice.
///
/// Convenience wrapper around [`parse_value`] that ensures the next item in
/// the stream is an array, then hands an [`Array`] cursor to `f`.
pub fn parse_array<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    parse_value(data, |value, shortest, tags| match value {
        Value::Array(a) => f(a, shortest, tags),
        _ => {
            Err(Error::IncorrectType("array".to_string(), value.type_name(!tags.is_empty())).into())
        }
    })
}

/// Parses a CBOR map from a byte slice.
///
/// Convenience wrapper around [`parse_value`] that ensures the next item in
/// the stream is a map, then hands a [`Map`] cursor to `f`.
pub fn parse_map<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Map, bool, &[u64]) -> Result<T, E>,
    E: From<Error>,
{
    parse_value(data, |value, shortest, tags| match value {
        Value::Map(m) => f(m, shortest, tags),
        _ => Err(Error::IncorrectType("map".to_string(), value.type_name(!tags.is_empty())).into()),
    })
}

/// Decodes a single value implementing [`FromCbor`], discarding the
/// `shortest` and `len` outputs.
pub fn parse<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
    T::Error: From<self::Error>,
{
    T::from_cbor(data).map(|v| v.0)
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = self::Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v,shortest,len) = u64::from_cbor(data)?;
                    Ok((v.try_into()?, shortest, len))
                }
            }
        )*
    };
}

impl_uint_from_cbor!(u8, u16, u32, usize);

impl FromCbor for u64 {
    type Error = self::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |value, shortest, tags| match value {
            Value::UnsignedInteger(n) => Ok((n, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "untagged unsigned integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

macro_rules! impl_int_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = self::Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v,shortest,len) = i64::from_cbor(data)?;
                    Ok((v.try_into()?, shortest, len))
                }
            }
        )*
    };
}

impl_int_from_cbor!(i8, i16, i32, isize);

impl FromCbor for i64 {
    type Error = self::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |value, shortest, tags| match value {
            Value::UnsignedInteger(n) => Ok((i64::try_from(n)?, shortest && tags.is_empty())),
            Value::NegativeInteger(n) => {
                Ok((-1i64 - i64::try_from(n)?, shortest && tags.is_empty()))
            }
            value => Err(Error::IncorrectType(
                "untagged integer".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

macro_rules! impl_float_from_cbor {
    ($(($ty:ty, $convert_expr:expr)),*) => {
        $(
            impl FromCbor for $ty {
                type Error = self::Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v, shortest, len) = f64::from_cbor(data)?;
                    Ok((
                        $convert_expr(v).ok_or(Error::PrecisionLoss)?,
                        shortest,
                        len,
                    ))
                }
            }
        )*
    };
}

impl_float_from_cbor!(
    (half::f16, |v: f64| {
        <half::f16 as num_traits::FromPrimitive>::from_f64(v)
    }),
    (f32, f32::from_f64)
);

impl FromCbor for f64 {
    type Error = self::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |value, shortest, tags| match value {
            Value::Float(f) => Ok((f, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "untagged float".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl FromCbor for bool {
    type Error = self::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |value, shortest, tags| match value {
            Value::False => Ok((false, shortest && tags.is_empty())),
            Value::True => Ok((true, shortest && tags.is_empty())),
            value => Err(Error::IncorrectType(
                "untagged boolean".to_string(),
                value.type_name(!tags.is_empty()),
            )),
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl<T> FromCbor for Option<T>
where
    T: FromCbor,
    T::Error: From<self::Error>,
{
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        match parse_value(data, |value, shortest, tags| match value {
            Value::Undefined => Ok(Some(shortest && tags.is_empty())),
            _ => Ok(None),
        })? {
            (Some(shortest), len) => Ok((None, shortest, len)),
            (None, _) => T::from_cbor(data).map(|(v, shortest, len)| (Some(v), shortest, len)),
        }
    }
}

macro_rules! impl_tuple_from_cbor {
    ($(($tuple_ty:ty, $map_expr:expr)),*) => {
        $(
            impl<T> FromCbor for $tuple_ty
            where
                T: FromCbor,
                T::Error: From<self::Error>,
            {
                type Error = T::Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    T::from_cbor(data).map(|(value, shortest, length)| ($map_expr(value, shortest, length), shortest, length))
                }
            }
        )*
    };
}

impl_tuple_from_cbor!(
    ((T, bool, usize), |value, shortest, length| (
        value, shortest, length
    )),
    ((T, bool), |value, shortest, _length| (value, shortest)),
    ((T, usize), |value, _shortest, length| (value, length))
);
