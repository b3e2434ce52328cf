use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree of height {height} cannot hold {requested} leaves")]
    Full { height: u8, requested: u64 },

    #[error("leaf index {index} out of range for {len} new leaves")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("snapshot frontier has {actual} levels, tree height is {expected}")]
    HeightMismatch { expected: usize, actual: usize },

    #[error("unsupported tree height {0}")]
    UnsupportedHeight(u8),
}
