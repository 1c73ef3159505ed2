use super::decode::*;

/// A stateful cursor over a CBOR sequence: a top-level sequence (`D = 0`), an
/// array (`D = 1`) or a map (`D = 2`, counted in key+value pairs).
///
/// `data` and `offset` are absolute into the buffer the enclosing
/// [`parse_value`] call was given, so a `Series` can be handed straight to a
/// nested call without re-slicing.
pub struct Series<'a, const D: usize> {
    data: &'a [u8],
    count: Option<usize>,
    offset: &'a mut usize,
    parsed: usize,
}

impl<'a, const D: usize> Series<'a, D> {
    pub(super) fn new(data: &'a [u8], count: Option<usize>, offset: &'a mut usize) -> Self {
        Self {
            data,
            count,
            offset,
            parsed: 0,
        }
    }

    /// The number of items (for a map, key+value pairs) if the sequence has a
    /// definite length.
    pub fn count(&self) -> Option<usize> {
        self.count.map(|c| c / if D == 0 { 1 } else { D })
    }

    pub fn is_definite(&self) -> bool {
        self.count.is_some()
    }

    pub fn offset(&self) -> usize {
        *self.offset
    }

    fn check_for_end(&mut self) -> Result<bool, Error> {
        if let Some(count) = self.count {
            Ok(self.parsed >= count)
        } else if *self.offset >= self.data.len() {
            if D == 0 {
                self.count = Some(self.parsed);
                Ok(true)
            } else {
                Err(Error::NeedMoreData(1))
            }
        } else if self.data[*self.offset] == 0xFF {
            if D == 2 && self.parsed % 2 == 1 {
                Err(Error::PartialMap)
            } else {
                *self.offset += 1;
                self.count = Some(self.parsed);
                Ok(true)
            }
        } else {
            Ok(false)
        }
    }

    /// Returns `Some(offset)` if the sequence has ended at the current
    /// position, without consuming anything further.
    pub fn end(&mut self) -> Result<Option<usize>, Error> {
        Ok(if self.check_for_end()? {
            Some(*self.offset)
        } else {
            None
        })
    }

    pub(super) fn complete<T>(mut self, r: T) -> Result<T, Error> {
        if self.check_for_end()? {
            Ok(r)
        } else {
            Err(Error::AdditionalItems)
        }
    }

    pub fn skip_value(&mut self, max_recursion: usize) -> Result<Option<bool>, Error> {
        self.try_parse_value(|mut value, shortest, tags| {
            value.skip(max_recursion).map(|s| s && shortest && tags.is_empty())
        })
        .map(|o| o.map(|(s, _)| s))
    }

    pub fn skip_to_end(&mut self, max_recursion: usize) -> Result<bool, Error> {
        let mut shortest = true;
        while let Some(s) = self.skip_value(max_recursion)? {
            shortest = shortest && s;
        }
        Ok(shortest)
    }

    pub fn try_parse_value<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        if self.check_for_end()? {
            Ok(None)
        } else {
            let item_start = *self.offset;
            let r = parse_value(&self.data[item_start..], f);
            if let Ok((_, len)) = r {
                self.parsed += 1;
                *self.offset += len;
            }
            r.map(Some)
        }
    }

    #[inline]
    pub fn parse_value<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(Value, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(f)?.ok_or_else(|| Error::NeedMoreData(1).into())
    }

    pub fn try_parse<T>(&mut self) -> Result<Option<T>, T::Error>
    where
        T: FromCbor,
        T::Error: From<Error>,
    {
        if self.check_for_end()? {
            Ok(None)
        } else {
            let (value, _shortest, len) = T::from_cbor(&self.data[*self.offset..])?;
            self.parsed += 1;
            *self.offset += len;
            Ok(Some(value))
        }
    }

    pub fn parse<T>(&mut self) -> Result<T, T::Error>
    where
        T: FromCbor,
        T::Error: From<Error>,
    {
        self.try_parse()?.ok_or_else(|| Error::NeedMoreData(1).into())
    }

    pub fn try_parse_array<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|value, shortest, tags| match value {
            Value::Array(a) => f(a, shortest, tags),
            _ => Err(
                Error::IncorrectType("Array".to_string(), value.type_name(!tags.is_empty())).into(),
            ),
        })
    }

    pub fn parse_array<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(&mut Array, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_array(f)?.ok_or_else(|| Error::NeedMoreData(1).into())
    }

    pub fn try_parse_map<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(&mut Map, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|value, shortest, tags| match value {
            Value::Map(m) => f(m, shortest, tags),
            _ => Err(
                Error::IncorrectType("Map".to_string(), value.type_name(!tags.is_empty())).into(),
            ),
        })
    }

    pub fn parse_map<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(&mut Map, bool, &[u64]) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_map(f)?.ok_or_else(|| Error::NeedMoreData(1).into())
    }
}

impl<const D: usize> std::fmt::Debug for Series<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} items parsed, definite={}>", self.parsed, self.is_definite())
    }
}
