//! Conversion of received symbols to bit log-likelihood ratios
//!
//! LLR values follow the decoder convention: positive values indicate that `Zero` is more likely.

use num_complex::Complex64;

use crate::qpsk::CONSTELLATION;
use crate::Error;

/// Slope of the linear Jacobian-logarithm correction
const AJIAN: f64 = -0.249_041_631_954_36;

/// Magnitude difference beyond which the Jacobian-logarithm correction vanishes
const TJIAN: f64 = 2.506_817_404_209_44;

/// Starting value of the max-star accumulators
const METRIC_FLOOR: f64 = -1_000_000.0;

/// Returns the linear-log-MAP approximation of `ln(e^x + e^y)`.
///
/// For `|x - y| < TJIAN` the larger argument is corrected by `AJIAN * (|x - y| - TJIAN)`.
#[must_use]
pub fn max_star0(x: f64, y: f64) -> f64 {
    let diff = y - x;
    if diff > TJIAN {
        y
    } else if diff < -TJIAN {
        x
    } else if diff > 0.0 {
        y + AJIAN * (diff - TJIAN)
    } else {
        x - AJIAN * (diff + TJIAN)
    }
}

/// Returns log-likelihoods of the four QPSK points for each received symbol.
///
/// The likelihood of point `s` for symbol `r` with real fading amplitude `a` is
/// `-es_no * |r / mean_amp - a * s / mean_amp|^2`.
fn symbol_likelihoods(
    rx_syms: &[Complex64],
    rx_amps: &[f64],
    es_no: f64,
    mean_amp: f64,
) -> Vec<[f64; 4]> {
    rx_syms
        .iter()
        .zip(rx_amps)
        .map(|(&r, &amp)| {
            let mut likelihoods = [0.0; 4];
            for (likelihood, &s) in likelihoods.iter_mut().zip(CONSTELLATION.iter()) {
                let err = r / mean_amp - s * (amp / mean_amp);
                *likelihood = -es_no * err.norm_sqr();
            }
            likelihoods
        })
        .collect()
}

/// Returns code bit LLR values for received QPSK symbols.
///
/// # Parameters
///
/// - `rx_syms`: Received QPSK symbols, phase-corrected.
///
/// - `rx_amps`: Estimated fading amplitude of each symbol.
///
/// - `es_no`: Assumed ratio of symbol energy to noise power spectral density (linear).
///
/// - `mean_amp`: Mean amplitude of the received symbols, used to normalize both.
///
/// # Returns
///
/// - `llr`: Two LLR values per symbol, for bits `b0` and `b1` of the Gray mapping in
///   [`crate::qpsk`].
///
/// # Errors
///
/// Returns an error if `rx_syms` and `rx_amps` differ in length or if `mean_amp` is not positive.
///
/// # Examples
///
/// ```
/// use num_complex::Complex64;
/// use qofdm::llr;
///
/// let llr = llr::symbols_to_llrs(&[Complex64::new(0.0, -1.0)], &[1.0], 3.0, 1.0)?;
/// assert!(llr[0] < 0.0 && llr[1] > 0.0); // Bits `1`, `0`
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn symbols_to_llrs(
    rx_syms: &[Complex64],
    rx_amps: &[f64],
    es_no: f64,
    mean_amp: f64,
) -> Result<Vec<f64>, Error> {
    if rx_syms.len() != rx_amps.len() {
        return Err(Error::InvalidInput(format!(
            "Got {} symbols but {} amplitudes",
            rx_syms.len(),
            rx_amps.len()
        )));
    }
    if mean_amp.is_nan() || mean_amp <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Mean amplitude must be positive (found {mean_amp})"
        )));
    }
    let mut llr = Vec::with_capacity(2 * rx_syms.len());
    for likelihoods in symbol_likelihoods(rx_syms, rx_amps, es_no, mean_amp) {
        for mask in [0b10, 0b01] {
            let mut metric_one = METRIC_FLOOR;
            let mut metric_zero = METRIC_FLOOR;
            for (index, &likelihood) in likelihoods.iter().enumerate() {
                if index & mask == 0 {
                    metric_zero = max_star0(metric_zero, likelihood);
                } else {
                    metric_one = max_star0(metric_one, likelihood);
                }
            }
            llr.push(metric_zero - metric_one);
        }
    }
    Ok(llr)
}

/// Returns LLR values for BPSK soft decisions, with Es/N0 estimated from the decisions.
///
/// The soft decisions are normalized by their mean magnitude, the variance about the nearest
/// `+1`/`-1` point gives the Es/N0 estimate, and each soft decision is scaled by `4 * Es/N0`.
/// Positive soft decisions map to `Zero`.
///
/// # Errors
///
/// Returns an error if fewer than two soft decisions are given.
pub fn sd_to_llr(soft_decisions: &[f64]) -> Result<Vec<f64>, Error> {
    let n = soft_decisions.len();
    if n < 2 {
        return Err(Error::InvalidInput(format!(
            "Need at least two soft decisions to estimate Es/N0 (found {n})"
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f64;
    let mean = soft_decisions.iter().map(|x| x.abs()).sum::<f64>() / n_f;
    let (sum, sum_sq) = soft_decisions
        .iter()
        .map(|&sd| {
            let sign = if sd > 0.0 {
                1.0
            } else if sd < 0.0 {
                -1.0
            } else {
                0.0
            };
            sd / mean - sign
        })
        .fold((0.0, 0.0), |(sum, sum_sq), x| (sum + x, sum_sq + x * x));
    let est_var = (n_f * sum_sq - sum * sum) / (n_f * (n_f - 1.0));
    let est_es_n0 = 1.0 / (2.0 * est_var + 1e-3);
    Ok(soft_decisions
        .iter()
        .map(|&sd| 4.0 * est_es_n0 * sd)
        .collect())
}
