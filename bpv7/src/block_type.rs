/*!
The canonical block type code, as carried on the wire and referenced by
[`crate::error::Error::InvalidBlockNumber`].
*/

/// The type code of a canonical block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlockType {
    Payload,
    PreviousNode,
    BundleAge,
    HopCount,
    Unknown(u64),
}

impl From<u64> for BlockType {
    fn from(value: u64) -> Self {
        match value {
            1 => Self::Payload,
            6 => Self::PreviousNode,
            7 => Self::BundleAge,
            10 => Self::HopCount,
            v => Self::Unknown(v),
        }
    }
}

impl From<BlockType> for u64 {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Payload => 1,
            BlockType::PreviousNode => 6,
            BlockType::BundleAge => 7,
            BlockType::HopCount => 10,
            BlockType::Unknown(v) => v,
        }
    }
}
