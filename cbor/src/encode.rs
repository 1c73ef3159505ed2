//! A canonical CBOR encoder.
//!
//! This module encodes Rust values into the Concise Binary Object
//! Representation (CBOR) format, as specified in
//! [RFC 8949](https://www.rfc-editor.org/rfc/rfc8949.html), producing the
//! deterministic subset RFC 9171 §4.1 requires: shortest-form integers,
//! definite-length byte and text strings, maps with entries sorted by the
//! byte-wise lexicographic order of their encoded keys, and indefinite-length
//! arrays for the outermost bundle.
//!
//! # Core Concepts
//!
//! - [`ToCbor`]: implement this for a type to make it directly encodable.
//! - [`Encoder`]: a stateful encoder used to build the byte stream, including
//!   indefinite-length arrays and maps.
//!
//! ```
//! use dtncore_cbor::encode::{self, Encoder, ToCbor};
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl ToCbor for Point {
//!     type Result = ();
//!
//!     fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
//!         encoder.emit_array(Some(2), |a| {
//!             a.emit(&self.x);
//!             a.emit(&self.y);
//!         });
//!     }
//! }
//!
//! let point = Point { x: 10, y: -20 };
//! let (bytes, _) = encode::emit(&point);
//! assert_eq!(bytes, &[0x82, 0x0A, 0x33]);
//! ```

use std::ops::Range;

/// A trait for types that can be encoded into CBOR format.
///
/// The library provides implementations for the common primitive types,
/// `str`, `String`, slices, arrays, `Option<T>` and tuples up to 16 elements.
pub trait ToCbor {
    /// The result of encoding the value.
    ///
    /// For most types this is `()`. For types that wrap borrowed data (such
    /// as [`Bytes`] or [`Raw`]) this is a `Range<usize>` locating the encoded
    /// bytes within the buffer of the [`Encoder`] they were written to.
    type Result;

    /// Encodes the value into the given [`Encoder`].
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result;
}

/// A stateful, streaming encoder for building a CBOR byte stream.
pub struct Encoder {
    data: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new, empty `Encoder`.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Consumes the encoder and returns the generated CBOR byte vector.
    pub fn build(self) -> Vec<u8> {
        self.data
    }

    /// Returns the current length of the encoded data in bytes.
    #[inline]
    pub fn offset(&self) -> usize {
        self.data.len()
    }

    fn emit_extend(&mut self, b: &[u8]) -> Range<usize> {
        let start = self.offset();
        self.data.extend_from_slice(b);
        start..self.offset()
    }

    fn emit_uint_minor(&mut self, major: u8, val: u64) {
        const U8_MAX: u64 = (u8::MAX as u64) + 1;
        const U16_MAX: u64 = (u16::MAX as u64) + 1;
        const U32_MAX: u64 = (u32::MAX as u64) + 1;

        match val {
            0..24 => self.data.push((major << 5) | (val as u8)),
            24..U8_MAX => {
                self.data.push((major << 5) | 24u8);
                self.data.push(val as u8)
            }
            U8_MAX..U16_MAX => {
                self.data.push((major << 5) | 25u8);
                self.data.extend((val as u16).to_be_bytes())
            }
            U16_MAX..U32_MAX => {
                self.data.push((major << 5) | 26u8);
                self.data.extend((val as u32).to_be_bytes())
            }
            _ => {
                self.data.push((major << 5) | 27u8);
                self.data.extend(val.to_be_bytes())
            }
        }
    }

    /// Encodes a value that implements the [`ToCbor`] trait.
    pub fn emit<T>(&mut self, value: &T) -> T::Result
    where
        T: ToCbor + ?Sized,
    {
        value.to_cbor(self)
    }

    fn emit_raw<V>(&mut self, data: &V) -> Range<usize>
    where
        V: AsRef<[u8]> + ?Sized,
    {
        let start = self.offset();
        self.data.extend_from_slice(data.as_ref());
        start..self.offset()
    }

    fn emit_bytes<V>(&mut self, value: &V) -> Range<usize>
    where
        V: AsRef<[u8]> + ?Sized,
    {
        let value = value.as_ref();
        self.emit_uint_minor(2, value.len() as u64);
        self.emit_extend(value)
    }

    fn emit_string<V>(&mut self, value: &V) -> Range<usize>
    where
        V: AsRef<str> + ?Sized,
    {
        let value = value.as_ref().as_bytes();
        self.emit_uint_minor(3, value.len() as u64);
        self.emit_extend(value)
    }

    /// Emits an indefinite-length byte stream.
    pub fn emit_byte_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ByteStream),
    {
        let mut s = ByteStream::new(self);
        f(&mut s);
        s.end()
    }

    /// Emits an indefinite-length text stream.
    pub fn emit_text_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextStream),
    {
        let mut s = TextStream::new(self);
        f(&mut s);
        s.end()
    }

    /// Emits a CBOR array. `count` of `None` produces an indefinite-length
    /// array terminated with the break byte; `Some(n)` produces a
    /// definite-length array of exactly `n` items.
    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let mut a = Array::new(self, count);
        f(&mut a);
        a.end();
    }

    /// Fallible version of [`Encoder::emit_array`].
    pub fn try_emit_array<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Array) -> Result<(), E>,
    {
        let mut a = Array::new(self, count);
        f(&mut a)?;
        a.end();
        Ok(())
    }

    fn emit_array_slice<V, T>(&mut self, values: &V)
    where
        V: AsRef<[T]> + ?Sized,
        T: ToCbor + Sized,
    {
        let values = values.as_ref();
        let mut a = Array::new(self, Some(values.len()));
        for value in values {
            a.emit(value);
        }
        a.end()
    }

    /// Emits a CBOR map with entries sorted by the byte-wise lexicographic
    /// order of their encoded key. `count` of `None` produces an
    /// indefinite-length map; `Some(n)` a definite-length map of exactly `n`
    /// key/value pairs.
    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Map),
    {
        let mut m = Map::new(self, count);
        f(&mut m);
        m.end();
    }

    /// Fallible version of [`Encoder::emit_map`].
    pub fn try_emit_map<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Map) -> Result<(), E>,
    {
        let mut m = Map::new(self, count);
        f(&mut m)?;
        m.end();
        Ok(())
    }
}

/// A wrapper to encode a value with a CBOR tag. Tags can be nested.
pub struct Tagged<'a, const TAG: u64, T>(pub &'a T)
where
    T: ToCbor + ?Sized;

impl<'a, const TAG: u64, T> ToCbor for Tagged<'a, TAG, T>
where
    T: ToCbor + ?Sized,
{
    type Result = T::Result;

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_uint_minor(6, TAG);
        encoder.emit(self.0)
    }
}

/// Writes raw bytes directly into the stream without any CBOR encoding. Used
/// to embed pre-encoded CBOR data.
pub struct Raw<'a, V>(pub &'a V)
where
    V: AsRef<[u8]> + ?Sized;

impl<'a, V> ToCbor for Raw<'a, V>
where
    V: AsRef<[u8]> + ?Sized,
{
    type Result = Range<usize>;

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_raw(self.0)
    }
}

/// Encodes a byte slice as a definite-length CBOR byte string.
///
/// By default `&[u8]` encodes as a CBOR array of integers; use this wrapper
/// to encode it as a byte string instead.
pub struct Bytes<'a, V>(pub &'a V)
where
    V: AsRef<[u8]> + ?Sized;

impl<'a, V> ToCbor for Bytes<'a, V>
where
    V: AsRef<[u8]> + ?Sized,
{
    type Result = Range<usize>;

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_bytes(self.0)
    }
}

/// A helper for building an indefinite-length CBOR byte stream.
pub struct ByteStream<'a> {
    encoder: &'a mut Encoder,
}

impl<'a> ByteStream<'a> {
    fn new(encoder: &'a mut Encoder) -> Self {
        encoder.data.push((2 << 5) | 31);
        Self { encoder }
    }

    /// Emits a single, definite-length chunk of bytes into the stream.
    pub fn emit<V>(&mut self, value: &V)
    where
        V: AsRef<[u8]> + ?Sized,
    {
        self.encoder.emit_bytes(value);
    }

    fn end(self) {
        self.encoder.data.push(0xFF)
    }
}

/// A helper for building an indefinite-length CBOR text stream.
pub struct TextStream<'a> {
    encoder: &'a mut Encoder,
}

impl<'a> TextStream<'a> {
    fn new(encoder: &'a mut Encoder) -> Self {
        encoder.data.push((3 << 5) | 31);
        Self { encoder }
    }

    /// Emits a single, definite-length chunk of text into the stream.
    pub fn emit<V>(&mut self, value: &V)
    where
        V: AsRef<str> + ?Sized,
    {
        self.encoder.emit_string(value);
    }

    fn end(self) {
        self.encoder.data.push(0xFF)
    }
}

/// A helper for building a CBOR array, created by [`Encoder::emit_array`].
///
/// Unlike [`Map`], array elements are written straight into the enclosing
/// encoder's buffer as they are emitted: order is significant and is
/// preserved exactly as emitted.
pub struct Array<'a> {
    encoder: &'a mut Encoder,
    count: Option<usize>,
    idx: usize,
}

impl<'a> Array<'a> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Self {
        if let Some(count) = count {
            encoder.emit_uint_minor(4, count as u64);
        } else {
            encoder.data.push((4 << 5) | 31);
        }
        Self {
            encoder,
            count,
            idx: 0,
        }
    }

    /// Returns the number of bytes written for this array so far, including
    /// its header.
    pub fn offset(&self) -> usize {
        self.encoder.offset()
    }

    fn next_field(&mut self) -> &mut Encoder {
        self.idx += 1;
        if let Some(count) = self.count
            && self.idx > count
        {
            panic!("too many items added to definite-length array");
        }
        self.encoder
    }

    fn end(self) {
        let Some(count) = self.count else {
            return self.encoder.data.push(0xFF);
        };
        if self.idx != count {
            panic!(
                "definite-length array is short of items: {}, expected {}",
                self.idx, count
            );
        }
    }

    /// Skips emitting a value, advancing the item counter without writing
    /// anything. Only useful when building a definite-length array whose
    /// item is emitted by some other means.
    pub fn skip_value(&mut self) {
        self.next_field();
    }

    /// Emits a value into the array.
    pub fn emit<T>(&mut self, value: &T) -> T::Result
    where
        T: ToCbor + ?Sized,
    {
        self.next_field().emit(value)
    }

    /// Emits an indefinite-length byte stream into the array.
    pub fn emit_byte_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ByteStream),
    {
        self.next_field().emit_byte_stream(f)
    }

    /// Emits an indefinite-length text stream into the array.
    pub fn emit_text_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextStream),
    {
        self.next_field().emit_text_stream(f)
    }

    /// Emits a nested array into the array.
    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.next_field().emit_array(count, f)
    }

    /// Emits a nested map into the array.
    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Map),
    {
        self.next_field().emit_map(count, f)
    }

    /// Fallible version of [`Array::emit_array`].
    pub fn try_emit_array<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Array) -> Result<(), E>,
    {
        self.next_field().try_emit_array(count, f)
    }

    /// Fallible version of [`Array::emit_map`].
    pub fn try_emit_map<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Map) -> Result<(), E>,
    {
        self.next_field().try_emit_map(count, f)
    }
}

/// A helper for building a CBOR map, created by [`Encoder::emit_map`].
///
/// Each key and value is first encoded into a private scratch buffer; once
/// the caller is done emitting pairs, the entries are sorted by the
/// byte-wise lexicographic order of the encoded key and the sorted bytes are
/// appended to the enclosing encoder. This is what makes map encoding
/// deterministic regardless of the order the caller calls `emit` in.
///
/// Because of this buffering, a `Range<usize>` returned by a value emitted
/// into a map (e.g. via [`Bytes`] or [`Raw`]) is relative to that value's own
/// scratch buffer, not the final stream; nothing in this crate relies on
/// such a range once it has passed through a map.
pub struct Map<'a> {
    encoder: &'a mut Encoder,
    count: Option<usize>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl<'a> Map<'a> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Self {
        Self {
            encoder,
            count,
            entries: Vec::new(),
            pending_key: None,
        }
    }

    fn push_bytes(&mut self, bytes: Vec<u8>) {
        match self.pending_key.take() {
            None => self.pending_key = Some(bytes),
            Some(key) => self.entries.push((key, bytes)),
        }
    }

    fn scratch<T>(f: impl FnOnce(&mut Encoder) -> T) -> (Vec<u8>, T) {
        let mut e = Encoder::new();
        let r = f(&mut e);
        (e.build(), r)
    }

    fn end(self) {
        if self.pending_key.is_some() {
            panic!("map has key but no value");
        }
        if let Some(count) = self.count
            && self.entries.len() != count
        {
            panic!(
                "definite-length map is short of items: {}, expected {}",
                self.entries.len(),
                count
            );
        }
        let mut entries = self.entries;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(count) = self.count {
            self.encoder.emit_uint_minor(5, count as u64);
        } else {
            self.encoder.data.push((5 << 5) | 31);
        }
        for (k, v) in &entries {
            self.encoder.data.extend_from_slice(k);
            self.encoder.data.extend_from_slice(v);
        }
        if self.count.is_none() {
            self.encoder.data.push(0xFF);
        }
    }

    /// Emits a key or value into the map. Calls alternate: the first call in
    /// a pair emits a key, the second the corresponding value.
    pub fn emit<T>(&mut self, value: &T) -> T::Result
    where
        T: ToCbor + ?Sized,
    {
        let (bytes, r) = Self::scratch(|e| e.emit(value));
        self.push_bytes(bytes);
        r
    }

    /// Skips emitting a key or value, advancing the pair state without
    /// writing anything.
    pub fn skip_value(&mut self) {
        self.push_bytes(Vec::new());
    }

    /// Emits an indefinite-length byte stream as the next key or value.
    pub fn emit_byte_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ByteStream),
    {
        let (bytes, ()) = Self::scratch(|e| e.emit_byte_stream(f));
        self.push_bytes(bytes);
    }

    /// Emits an indefinite-length text stream as the next key or value.
    pub fn emit_text_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextStream),
    {
        let (bytes, ()) = Self::scratch(|e| e.emit_text_stream(f));
        self.push_bytes(bytes);
    }

    /// Emits a nested array as the next key or value.
    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let (bytes, ()) = Self::scratch(|e| e.emit_array(count, f));
        self.push_bytes(bytes);
    }

    /// Emits a nested map as the next key or value.
    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Map),
    {
        let (bytes, ()) = Self::scratch(|e| e.emit_map(count, f));
        self.push_bytes(bytes);
    }

    /// Fallible version of [`Map::emit_array`].
    pub fn try_emit_array<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Array) -> Result<(), E>,
    {
        let mut e = Encoder::new();
        e.try_emit_array(count, f)?;
        self.push_bytes(e.build());
        Ok(())
    }

    /// Fallible version of [`Map::emit_map`].
    pub fn try_emit_map<F, E>(&mut self, count: Option<usize>, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Map) -> Result<(), E>,
    {
        let mut e = Encoder::new();
        e.try_emit_map(count, f)?;
        self.push_bytes(e.build());
        Ok(())
    }
}

/// Blanket implementation for references, allowing `&T` to be encoded where `T` is encodable.
impl<T> ToCbor for &T
where
    T: ToCbor,
{
    type Result = T::Result;

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        (*self).to_cbor(encoder)
    }
}

macro_rules! impl_uint_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                type Result = ();
                fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                    encoder.emit_uint_minor(0, *self as u64)
                }
            }
        )*
    };
}

impl_uint_to_cbor!(u8, u16, u32, u64, usize);

macro_rules! impl_int_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                type Result = ();
                fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                    if *self >= 0 {
                        encoder.emit_uint_minor(0, *self as u64)
                    } else {
                        encoder.emit_uint_minor(1, self.unsigned_abs() as u64 - 1)
                    }
                }
            }
        )*
    };
}

impl_int_to_cbor!(i8, i16, i32, i64, isize);

fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f) == value => Some(f),
        _ => None,
    }
}

impl ToCbor for f64 {
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        if let Some(f) = lossless_float_coerce::<half::f16>(*self) {
            encoder.data.push((7 << 5) | 25);
            encoder.data.extend(f.to_be_bytes())
        } else if let Some(f) = lossless_float_coerce::<f32>(*self) {
            encoder.data.push((7 << 5) | 26);
            encoder.data.extend(f.to_be_bytes())
        } else {
            encoder.data.push((7 << 5) | 27);
            encoder.data.extend(self.to_be_bytes())
        }
    }
}

impl ToCbor for f32 {
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        if let Some(f) = lossless_float_coerce::<half::f16>(*self as f64) {
            encoder.data.push((7 << 5) | 25);
            encoder.data.extend(f.to_be_bytes())
        } else {
            encoder.data.push((7 << 5) | 26);
            encoder.data.extend(self.to_be_bytes())
        }
    }
}

impl ToCbor for half::f16 {
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.data.push((7 << 5) | 25);
        encoder.data.extend(self.to_be_bytes())
    }
}

impl ToCbor for bool {
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.data.push((7 << 5) | if *self { 21 } else { 20 })
    }
}

macro_rules! impl_string_to_cbor {
    ($( $value_type:ty),*) => {
        $(
            impl ToCbor for $value_type {
                type Result = Range<usize>;
                fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                    encoder.emit_string(self)
                }
            }
        )*
    };
}

impl_string_to_cbor!(str, String);

impl<T> ToCbor for [T]
where
    T: ToCbor,
{
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_array_slice(self)
    }
}

impl<T, const N: usize> ToCbor for [T; N]
where
    T: ToCbor,
{
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_array_slice(self)
    }
}

impl<T> ToCbor for Option<T>
where
    T: ToCbor,
{
    type Result = Option<T::Result>;
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        match self {
            Some(value) => Some(encoder.emit(value)),
            None => {
                encoder.data.push((7 << 5) | 23);
                None
            }
        }
    }
}

/// Encodes a single value into a `Vec<u8>`.
pub fn emit<T>(value: &T) -> (Vec<u8>, T::Result)
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::new();
    let r = e.emit(value);
    (e.build(), r)
}

macro_rules! impl_stream_emit_functions {
    ($(( $method:ident,  $stream_type:ty)),*) => {
        $(
            #[doc = concat!("Encodes a single ", stringify!($stream_type), " into a `Vec<u8>`.")]
            pub fn $method<F>(f: F) -> Vec<u8>
            where
                F: FnOnce(&mut $stream_type),
            {
                let mut e = Encoder::new();
                e.$method(f);
                e.build()
            }
        )*
    };
}

impl_stream_emit_functions!(
    (emit_byte_stream, ByteStream),
    (emit_text_stream, TextStream)
);

macro_rules! impl_collection_emit_functions {
    ($(( $method:ident, $try_method:ident,$collection_type:ty)),*) => {
        $(
            #[doc = concat!("Encodes a single ", stringify!($collection_type), " into a `Vec<u8>`.")]
            pub fn $method<F>(count: Option<usize>, f: F) -> Vec<u8>
            where
                F: FnOnce(&mut $collection_type),
            {
                let mut e = Encoder::new();
                e.$method(count, f);
                e.build()
            }

            #[doc = concat!("Encodes a single ", stringify!($collection_type), " into a `Vec<u8>` with a `Result` type.")]
            pub fn $try_method<F,E>(count: Option<usize>, f: F) -> Result<Vec<u8>,E>
            where
                F: FnOnce(&mut $collection_type) -> Result<(),E>,
            {
                let mut e = Encoder::new();
                e.$try_method(count, f)?;
                Ok(e.build())
            }
        )*
    };
}

impl_collection_emit_functions!(
    (emit_array, try_emit_array, Array),
    (emit_map, try_emit_map, Map)
);

macro_rules! impl_tuple_emit_functions {
    ( $len:expr; $( ($name:ident, $index:tt) ),* ) => {
        impl<$($name: ToCbor),*> ToCbor for ($($name,)*) {
            type Result = ();
            fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                encoder.emit_array(Some($len),|a| {
                    $( a.emit(&self.$index); )*
                })
            }
        }
    };
}

impl_tuple_emit_functions!(2; (T0, 0), (T1, 1));
impl_tuple_emit_functions!(3; (T0, 0), (T1, 1), (T2, 2));
impl_tuple_emit_functions!(4; (T0, 0), (T1, 1), (T2, 2), (T3, 3));
impl_tuple_emit_functions!(5; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4));
impl_tuple_emit_functions!(6; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5));
impl_tuple_emit_functions!(7; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6));
impl_tuple_emit_functions!(8; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7));
impl_tuple_emit_functions!(9; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8));
impl_tuple_emit_functions!(10; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9));
impl_tuple_emit_functions!(11; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10));
impl_tuple_emit_functions!(12; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10), (T11, 11));
impl_tuple_emit_functions!(13; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10), (T11, 11), (T12, 12));
impl_tuple_emit_functions!(14; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10), (T11, 11), (T12, 12), (T13, 13));
impl_tuple_emit_functions!(15; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10), (T11, 11), (T12, 12), (T13, 13), (T14, 14));
impl_tuple_emit_functions!(16; (T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6), (T7, 7), (T8, 8), (T9, 9), (T10, 10), (T11, 11), (T12, 12), (T13, 13), (T14, 14), (T15, 15));

#[cfg(test)]
pub(crate) fn emit_simple_value(value: u8) -> Vec<u8> {
    match value {
        20 | 21 | 23 | 24..=31 => panic!("invalid simple value, use bool or Option<T>"),
        _ => {
            let mut e = Encoder::new();
            e.emit_uint_minor(7, value as u64);
            e.build()
        }
    }
}
