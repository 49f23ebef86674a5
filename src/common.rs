//! Types needed in multiple modules

/// Enumeration of binary symbol values
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy)]
pub enum Bit {
    /// Binary symbol `0`
    Zero = 0,
    /// Binary symbol `1`
    One = 1,
}

impl Bit {
    /// Returns bit as an integer (`0` or `1`).
    #[must_use]
    pub fn as_usize(self) -> usize {
        self as usize
    }

    /// Returns `One` if `is_one` is `true`, and `Zero` otherwise.
    #[must_use]
    pub fn from_bool(is_one: bool) -> Self {
        if is_one {
            Bit::One
        } else {
            Bit::Zero
        }
    }
}

impl std::ops::BitXor for Bit {
    type Output = Bit;

    fn bitxor(self, rhs: Bit) -> Bit {
        Bit::from_bool(self != rhs)
    }
}

/// Custom error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid input error
    #[error("{0}")]
    InvalidInput(String),
    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Golden-Prime interleaver has no entry for the requested length
    #[error("No Golden-Prime interleaver of length {0}")]
    UnsupportedInterleaverLength(usize),
    /// File read/write error
    #[error("{0}")]
    FileReadWriteError(#[from] std::io::Error),
    /// Serde read/write error
    #[error("{0}")]
    SerdeReadWriteError(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests_of_bit {
    use super::*;
    use Bit::{One, Zero};

    #[test]
    fn test_as_usize() {
        assert_eq!(Zero.as_usize(), 0);
        assert_eq!(One.as_usize(), 1);
    }

    #[test]
    fn test_from_bool() {
        assert_eq!(Bit::from_bool(false), Zero);
        assert_eq!(Bit::from_bool(true), One);
    }

    #[test]
    fn test_bitxor() {
        assert_eq!(Zero ^ Zero, Zero);
        assert_eq!(Zero ^ One, One);
        assert_eq!(One ^ Zero, One);
        assert_eq!(One ^ One, Zero);
    }
}
