//! Complex band-pass filter for the transmitted waveform
//!
//! The filter is a Hamming-windowed sinc low-pass prototype shifted up to the centre of the
//! carrier band, so it passes the occupied band and removes the out-of-band spectral skirts of the
//! rectangular OFDM symbols. Filter memory carries over from one frame to the next.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::Error;

/// Number of taps of the transmit filter
pub const TX_BPF_NUM_TAPS: usize = 100;

/// Cutoff (Hz) of the low-pass prototype of the transmit filter
pub const TX_BPF_CUTOFF_HZ: f64 = 650.0;

/// Complex FIR filter with memory
#[derive(Clone, PartialEq, Debug)]
pub struct ComplexFir {
    /// Filter taps
    taps: Vec<Complex64>,
    /// Most recent inputs, as a circular buffer
    history: Vec<Complex64>,
    /// Position in `history` of the next input
    next: usize,
}

impl ComplexFir {
    /// Returns band-pass filter centred on `centre_hz`, built from a low-pass prototype.
    ///
    /// # Parameters
    ///
    /// - `num_taps`: Number of filter taps.
    ///
    /// - `cutoff_hz`: Cutoff frequency of the prototype, which is half the passband width.
    ///
    /// - `centre_hz`: Frequency to which the prototype is shifted.
    ///
    /// - `sample_rate_hz`: Sample rate.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_taps < 2` or if the cutoff is not in `(0, sample_rate_hz / 2)`.
    pub fn band_pass(
        num_taps: usize,
        cutoff_hz: f64,
        centre_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, Error> {
        if num_taps < 2 {
            return Err(Error::InvalidConfig(format!(
                "Filter needs at least two taps (found {num_taps})"
            )));
        }
        if !(cutoff_hz > 0.0 && cutoff_hz < sample_rate_hz / 2.0) {
            return Err(Error::InvalidConfig(format!(
                "Filter cutoff {cutoff_hz} Hz must be in (0, {}) Hz",
                sample_rate_hz / 2.0
            )));
        }
        let prototype = low_pass_prototype(num_taps, cutoff_hz / sample_rate_hz);
        let taps = prototype
            .iter()
            .enumerate()
            .map(|(n, &h)| {
                #[allow(clippy::cast_precision_loss)]
                let phase = 2.0 * PI * centre_hz / sample_rate_hz * n as f64;
                Complex64::from_polar(h, phase)
            })
            .collect();
        Ok(Self {
            taps,
            history: vec![Complex64::new(0.0, 0.0); num_taps],
            next: 0,
        })
    }

    /// Returns filtered samples, updating the filter memory.
    pub fn filter(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        let num_taps = self.taps.len();
        input
            .iter()
            .map(|&x| {
                self.history[self.next] = x;
                let mut acc = Complex64::new(0.0, 0.0);
                for (k, &tap) in self.taps.iter().enumerate() {
                    acc += tap * self.history[(self.next + num_taps - k) % num_taps];
                }
                self.next = (self.next + 1) % num_taps;
                acc
            })
            .collect()
    }

    /// Clears the filter memory.
    pub fn reset(&mut self) {
        self.history.fill(Complex64::new(0.0, 0.0));
        self.next = 0;
    }
}

/// Returns unity-DC-gain Hamming-windowed sinc taps for normalized cutoff `fc` (cycles/sample).
fn low_pass_prototype(num_taps: usize, fc: f64) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let span = (num_taps - 1) as f64;
    let taps: Vec<f64> = (0 .. num_taps)
        .map(|n| {
            #[allow(clippy::cast_precision_loss)]
            let n = n as f64;
            let x = 2.0 * fc * (n - span / 2.0);
            let sinc = if x == 0.0 {
                1.0
            } else {
                (PI * x).sin() / (PI * x)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n / span).cos();
            2.0 * fc * sinc * window
        })
        .collect();
    let gain: f64 = taps.iter().sum();
    taps.into_iter().map(|h| h / gain).collect()
}
