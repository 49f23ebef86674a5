//! Gray-coded QPSK mapping
//!
//! Bit pair `(b0, b1)` selects constellation point `CONSTELLATION[2 * b0 + b1]`, so that the four
//! points `1`, `j`, `-j`, `-1` carry the pairs `00`, `01`, `10`, `11`. Adjacent points differ in a
//! single bit.

use num_complex::Complex64;

use crate::{Bit, Error};

/// QPSK constellation, indexed by `2 * b0 + b1`
pub const CONSTELLATION: [Complex64; 4] = [
    Complex64::new(1.0, 0.0),
    Complex64::new(0.0, 1.0),
    Complex64::new(0.0, -1.0),
    Complex64::new(-1.0, 0.0),
];

/// Returns QPSK symbol for a pair of bits.
#[must_use]
pub fn modulate_pair(b0: Bit, b1: Bit) -> Complex64 {
    CONSTELLATION[(b0.as_usize() << 1) | b1.as_usize()]
}

/// Returns hard bit decisions `(b0, b1)` for a received QPSK symbol.
///
/// The symbol is rotated by `pi/4` so that the decision regions become the four quadrants.
#[must_use]
pub fn demodulate_pair(sym: Complex64) -> (Bit, Bit) {
    let rotated = sym * Complex64::from_polar(1.0, std::f64::consts::FRAC_PI_4);
    (Bit::from_bool(rotated.im < 0.0), Bit::from_bool(rotated.re < 0.0))
}

/// Returns QPSK symbols for a sequence of bits.
///
/// # Errors
///
/// Returns an error if `bits.len()` is odd.
///
/// # Examples
///
/// ```
/// use qofdm::{qpsk, Bit};
/// use Bit::{One, Zero};
///
/// let syms = qpsk::modulate(&[Zero, One, One, One])?;
/// assert_eq!(syms, [qpsk::CONSTELLATION[1], qpsk::CONSTELLATION[3]]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn modulate(bits: &[Bit]) -> Result<Vec<Complex64>, Error> {
    if bits.len() % 2 != 0 {
        return Err(Error::InvalidInput(format!(
            "Expected an even number of bits for QPSK mapping (found {})",
            bits.len()
        )));
    }
    Ok(bits
        .chunks_exact(2)
        .map(|pair| modulate_pair(pair[0], pair[1]))
        .collect())
}

/// Returns hard bit decisions for a sequence of QPSK symbols (two bits per symbol).
#[must_use]
pub fn demodulate(syms: &[Complex64]) -> Vec<Bit> {
    let mut bits = Vec::with_capacity(2 * syms.len());
    for &sym in syms {
        let (b0, b1) = demodulate_pair(sym);
        bits.push(b0);
        bits.push(b1);
    }
    bits
}
