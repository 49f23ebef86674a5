//! # Some useful functions for simulating the modem
//!
//! The [`random_bits`] function returns a given number of random bits; the [`test_frame_bits`]
//! function returns the deterministic payload both ends of a test link agree on; the
//! [`awgn_channel`] function adds complex white Gaussian noise to samples; the
//! [`frequency_offset`] function shifts samples in frequency; and the [`error_count`] function
//! returns the number of errors in a sequence with respect to a reference sequence.
//!
//! # Examples
//!
//! The code below illustrates the usage of the functions in this module.
//! ```
//! use num_complex::Complex64;
//! use qofdm::{qpsk, utils};
//!
//! let mut rng = rand::rng();
//! let bits = utils::test_frame_bits(40);
//! let syms = qpsk::modulate(&bits)?;
//! let syms = utils::frequency_offset(&syms, 10.0, 8000.0);
//! let syms = utils::awgn_channel(&syms, 0.01, &mut rng);
//! let bits_hat = qpsk::demodulate(&utils::frequency_offset(&syms, -10.0, 8000.0));
//! let err_count = utils::error_count(&bits_hat, &bits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::f64::consts::TAU;

use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::Bit;

/// Modulus of the test frame generator
const TEST_FRAME_MODULUS: u64 = 32768;

/// Returns given number of random bits.
///
/// # Parameters
///
/// - `num_bits`: Number of random bits to be generated.
///
/// # Returns
///
/// - `bits`: Random bits.
#[must_use]
pub fn random_bits(num_bits: usize) -> Vec<Bit> {
    random_bits_with_rng(num_bits, &mut rand::rng())
}

/// Returns given number of random bits drawn from a given generator.
pub fn random_bits_with_rng<R: Rng>(num_bits: usize, rng: &mut R) -> Vec<Bit> {
    (0 .. num_bits)
        .map(|_| Bit::from_bool(rng.random_bool(0.5)))
        .collect()
}

/// Returns the test frame payload of given length.
///
/// The bits come from the linear congruential generator `r <- (1103515245 r + 12345) mod 32768`
/// seeded with `1`, with bit `One` whenever `r > 16384`. The same bits start every test frame.
///
/// # Examples
///
/// ```
/// use qofdm::{utils, Bit};
///
/// assert_eq!(utils::test_frame_bits(4), [Bit::One, Bit::Zero, Bit::One, Bit::Zero]);
/// ```
#[must_use]
pub fn test_frame_bits(num_bits: usize) -> Vec<Bit> {
    let mut seed = 1u64;
    (0 .. num_bits)
        .map(|_| {
            seed = (1_103_515_245 * seed + 12345) % TEST_FRAME_MODULUS;
            Bit::from_bool(seed > TEST_FRAME_MODULUS / 2)
        })
        .collect()
}

/// Returns samples at the output of a complex AWGN channel.
///
/// # Parameters
///
/// - `samples`: Channel input.
///
/// - `noise_var`: Total noise variance per complex sample (half in each of the real and imaginary
///   parts).
///
/// - `rng`: Random number generator to be used.
///
/// # Returns
///
/// - `noisy`: Channel output.
pub fn awgn_channel<R: Rng>(samples: &[Complex64], noise_var: f64, rng: &mut R) -> Vec<Complex64> {
    let sigma = (noise_var / 2.0).sqrt();
    samples
        .iter()
        .map(|&x| {
            let noise = Complex64::new(
                rng.sample::<f64, _>(StandardNormal),
                rng.sample::<f64, _>(StandardNormal),
            );
            x + sigma * noise
        })
        .collect()
}

/// Returns samples shifted in frequency by `foff_hz`, with zero phase at the first sample.
#[must_use]
pub fn frequency_offset(
    samples: &[Complex64],
    foff_hz: f64,
    sample_rate_hz: f64,
) -> Vec<Complex64> {
    let w = TAU * foff_hz / sample_rate_hz;
    samples
        .iter()
        .enumerate()
        .map(|(n, &x)| {
            #[allow(clippy::cast_precision_loss)]
            let phase = w * n as f64;
            x * Complex64::from_polar(1.0, phase)
        })
        .collect()
}

/// Returns mean power of complex samples (zero for no samples).
#[must_use]
pub fn mean_power(samples: &[Complex64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = samples.len() as f64;
    samples.iter().map(Complex64::norm_sqr).sum::<f64>() / len
}

/// Returns number of errors in a sequence with respect to a reference sequence.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///
/// # Returns
///
/// - `err_count`: Number of positions in which the two sequences differ. If they are of different
///   lengths, then the longer sequence is effectively truncated to the length of the shorter one.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq
        .iter()
        .zip(seq.iter())
        .filter(|&(x, y)| x != y)
        .count()
}
