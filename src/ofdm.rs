//! OFDM modem with pilot-aided acquisition and tracking
//!
//! A modem frame has `Ns` rows of `Nc + 2` carriers. Row 0 is a known BPSK pilot row, and rows
//! `1 .. Ns` carry `Nc` QPSK symbols each between two zero guard carriers. Each row becomes `M`
//! time samples with an `Ncp`-sample cyclic prefix, and rows are concatenated.
//!
//! The demodulator keeps a buffer of about three frames of received samples so that it can use the
//! pilots of the previous, current and next frames. The caller must query [`Ofdm::nin`] before
//! every call to [`Ofdm::sync_search`] or [`Ofdm::demod`] and supply exactly that many samples; the
//! count changes by a quarter of a symbol whenever the receiver slips a sample-clock offset.
//!
//! # Examples
//!
//! ```
//! use qofdm::ofdm::{Ofdm, OfdmConfig};
//! use qofdm::sync::SyncState;
//! use qofdm::{utils, Bit};
//!
//! let mut tx = Ofdm::new(OfdmConfig::default())?;
//! let mut rx = Ofdm::new(OfdmConfig::default())?;
//! let frame_bits = utils::test_frame_bits(tx.bits_per_frame());
//! let samples = tx.modulate(&frame_bits)?.repeat(8);
//! let mut pos = 0;
//! while pos + rx.nin() <= samples.len() {
//!     let nin = rx.nin();
//!     let chunk = &samples[pos .. pos + nin];
//!     pos += nin;
//!     if rx.sync_state() == SyncState::Search {
//!         rx.sync_search(chunk)?;
//!         let rx_uw = vec![Bit::Zero; rx.layout().num_uw_bits()];
//!         rx.sync_state_machine(&rx_uw)?;
//!     } else {
//!         let rx_bits = rx.demod(chunk)?;
//!         let rx_uw = rx.layout().extract_uw(&rx_bits)?;
//!         rx.sync_state_machine(&rx_uw)?;
//!     }
//! }
//! assert_eq!(rx.sync_state(), SyncState::Synced);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::f64::consts::TAU;
use std::iter;
use std::ops::Range;

use log::debug;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::filter::{ComplexFir, TX_BPF_CUTOFF_HZ, TX_BPF_NUM_TAPS};
use crate::frame::FrameLayout;
use crate::sync::{FrameSync, SyncCommand, SyncState};
use crate::{qpsk, Bit, Error};

/// BPSK pilot values, of which the first `Nc + 2` are used
const PILOT_VALUES: [i8; 64] = [
    -1, -1, 1, 1, -1, -1, -1, 1, -1, 1, -1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, 1, -1, 1, -1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, -1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, 1, -1, 1, -1, 1, -1, -1, 1, -1,
    1, 1, 1, 1, -1, 1, -1, 1,
];

/// Gain of the per-frame frequency tracking loop
const FOFF_EST_GAIN: f64 = 0.05;

/// Noise bandwidth (Hz) to which the SNR estimate is normalized
const SNR_NOISE_BANDWIDTH_HZ: f64 = 3000.0;

/// Number of pilot observations (3 carriers in each of 4 pilot rows) behind each amplitude estimate
const NUM_PILOTS_PER_ESTIMATE: f64 = 12.0;

/// OFDM modem configuration
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct OfdmConfig {
    /// Number of data carriers `Nc`
    pub num_carriers: usize,
    /// Number of symbol rows per frame `Ns`, including the pilot row
    pub num_symbols_per_frame: usize,
    /// Bits per data symbol (only QPSK, i.e. `2`, is supported)
    pub bits_per_symbol: usize,
    /// Symbol period (s), excluding the cyclic prefix
    pub symbol_period_s: f64,
    /// Cyclic prefix duration (s)
    pub cyclic_prefix_s: f64,
    /// Sample rate (Hz)
    pub sample_rate_hz: f64,
    /// Centre of the carrier band (Hz)
    pub centre_hz: f64,
    /// Number of auxiliary text bits at the end of each frame
    pub num_txt_bits: usize,
    /// Width (samples) of the window searched by fine timing
    pub timing_window_width: usize,
    /// Normalized correlation peak above which acquisition is declared valid
    pub timing_mx_thresh: f64,
}

impl Default for OfdmConfig {
    fn default() -> Self {
        Self {
            num_carriers: 17,
            num_symbols_per_frame: 8,
            bits_per_symbol: 2,
            symbol_period_s: 0.018,
            cyclic_prefix_s: 0.002,
            sample_rate_hz: 8000.0,
            centre_hz: 1500.0,
            num_txt_bits: 4,
            timing_window_width: 11,
            timing_mx_thresh: 0.30,
        }
    }
}

/// Sizes derived from a valid configuration
#[derive(Clone, PartialEq, Debug)]
struct Sizing {
    /// Samples per symbol, excluding the cyclic prefix
    m: usize,
    /// Samples per cyclic prefix
    ncp: usize,
    /// Index of the lowest carrier, in units of the carrier spacing
    nlower: usize,
    /// Frame layout
    layout: FrameLayout,
}

impl OfdmConfig {
    /// Checks configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range, or if the derived frame layout or carrier
    /// band is impossible.
    pub fn validate(&self) -> Result<(), Error> {
        self.sizing().map(|_| ())
    }

    /// Returns symbol rate (Hz).
    #[must_use]
    pub fn symbol_rate_hz(&self) -> f64 {
        1.0 / self.symbol_period_s
    }

    /// Returns derived sizes after checking configuration.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_sign_loss)]
    fn sizing(&self) -> Result<Sizing, Error> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.num_carriers == 0 {
            return invalid("Number of carriers must be positive".to_string());
        }
        if self.num_carriers + 2 > PILOT_VALUES.len() {
            return invalid(format!(
                "At most {} carriers are supported (found {})",
                PILOT_VALUES.len() - 2,
                self.num_carriers
            ));
        }
        if self.num_symbols_per_frame < 2 {
            return invalid(format!(
                "Frame needs a pilot row and at least one data row (found {} rows)",
                self.num_symbols_per_frame
            ));
        }
        if self.bits_per_symbol != 2 {
            return invalid(format!(
                "Only QPSK (2 bits per symbol) is supported (found {})",
                self.bits_per_symbol
            ));
        }
        for (name, value) in [
            ("Symbol period", self.symbol_period_s),
            ("Cyclic prefix duration", self.cyclic_prefix_s),
            ("Sample rate", self.sample_rate_hz),
            ("Centre frequency", self.centre_hz),
            ("Timing threshold", self.timing_mx_thresh),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive and finite (found {value})"));
            }
        }
        if self.timing_window_width < 2 {
            return invalid(format!(
                "Timing window must be at least 2 samples wide (found {})",
                self.timing_window_width
            ));
        }
        let m = (self.sample_rate_hz * self.symbol_period_s).round();
        let ncp = (self.sample_rate_hz * self.cyclic_prefix_s).round();
        if m < 1.0 || ncp < 1.0 {
            return invalid(format!(
                "Symbol ({m} samples) and cyclic prefix ({ncp} samples) must both be nonempty"
            ));
        }
        if self.timing_window_width as f64 > m + ncp {
            return invalid(format!(
                "Timing window ({} samples) cannot exceed a symbol with its cyclic prefix ({} \
                samples)",
                self.timing_window_width,
                m + ncp
            ));
        }
        let rs = self.symbol_rate_hz();
        let nlower = ((self.centre_hz - rs * self.num_carriers as f64 / 2.0) / rs).floor();
        if nlower < 0.0 {
            return invalid(format!(
                "Carrier band centred on {} Hz extends below 0 Hz",
                self.centre_hz
            ));
        }
        if (nlower + self.num_carriers as f64 + 1.0) * rs >= self.sample_rate_hz / 2.0 {
            return invalid(format!(
                "Carrier band centred on {} Hz extends beyond {} Hz",
                self.centre_hz,
                self.sample_rate_hz / 2.0
            ));
        }
        let layout = FrameLayout::new(
            self.num_carriers,
            self.num_symbols_per_frame - 1,
            self.num_txt_bits,
        )?;
        Ok(Sizing {
            m: m as usize,
            ncp: ncp as usize,
            nlower: nlower as usize,
            layout,
        })
    }
}

/// Demodulator statistics
#[derive(Clone, PartialEq, Debug)]
pub struct OfdmStats {
    /// SNR estimate (dB) in a 3 kHz noise bandwidth, smoothed over calls
    pub snr_est_db: f64,
    /// Whether frame sync is `Trial` or `Synced`
    pub sync: bool,
    /// Frequency offset estimate (Hz)
    pub foff_hz: f64,
    /// Fine timing estimate (samples)
    pub timing_est: isize,
    /// Sample point within the cyclic prefix (samples)
    pub sample_point: isize,
    /// Sample clock offset (samples per sample)
    pub clock_offset: f64,
    /// Normalized correlation peak of the last timing estimate
    pub timing_mx: f64,
    /// Phase-corrected data symbols of the last frame
    pub rx_np: Vec<Complex64>,
    /// Amplitude estimates of the data symbols of the last frame
    pub rx_amp: Vec<f64>,
}

/// OFDM modem state
#[derive(Clone, Debug)]
pub struct Ofdm {
    /// Configuration
    config: OfdmConfig,
    /// Samples per symbol, excluding the cyclic prefix
    m: usize,
    /// Samples per cyclic prefix
    ncp: usize,
    /// Samples per symbol, including the cyclic prefix
    sym_len: usize,
    /// Samples per frame
    samples_per_frame: usize,
    /// Index of the lowest carrier, in units of the carrier spacing
    nlower: usize,
    /// Frame layout
    layout: FrameLayout,
    /// Pilot row
    pilots: Vec<Complex64>,
    /// Conjugated time-domain pilot symbol, with zeros in place of the cyclic prefix
    pilot_samples_conj: Vec<Complex64>,
    /// Energy normalization of the timing correlation
    timing_norm: f64,
    /// `carrier_phasors[c][r]` is `exp(j * (nlower + c) * 2 * pi * r / M)`
    carrier_phasors: Vec<Vec<Complex64>>,
    /// Transmit band-pass filter, if enabled
    tx_bpf: Option<ComplexFir>,
    /// Received samples
    rxbuf: Vec<Complex64>,
    /// Number of samples expected by the next call
    nin: usize,
    /// Whether fine timing is enabled
    timing_en: bool,
    /// Whether frequency offset estimation is enabled
    foff_est_en: bool,
    /// Whether per-carrier phase correction is enabled
    phase_est_en: bool,
    /// Whether the last timing estimate found a valid peak
    timing_valid: bool,
    /// Normalized correlation peak of the last timing estimate
    timing_mx: f64,
    /// Fine timing estimate (samples)
    timing_est: isize,
    /// Sample point (samples)
    sample_point: isize,
    /// Frequency offset estimate (Hz)
    foff_est_hz: f64,
    /// Most recent coarse frequency offset estimate (Hz)
    coarse_foff_est_hz: f64,
    /// Smoothed pilot-half correlation product
    foff_metric: Complex64,
    /// Smoothed mean amplitude of the data symbols
    mean_amp: f64,
    /// Signal power of the last frame
    sig_var: f64,
    /// Noise power of the last frame
    noise_var: f64,
    /// Smoothed SNR estimate (dB)
    snr_est_db: f64,
    /// Accumulated timing correction (samples)
    clock_offset_counter: isize,
    /// Phase-corrected data symbols of the last frame
    rx_np: Vec<Complex64>,
    /// Amplitude estimates of the data symbols of the last frame
    rx_amp: Vec<f64>,
    /// Frame and interleaver sync state machines
    sync: FrameSync,
}

impl Ofdm {
    /// Returns new modem for given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: OfdmConfig) -> Result<Self, Error> {
        let Sizing {
            m,
            ncp,
            nlower,
            layout,
        } = config.sizing()?;
        let nc = config.num_carriers;
        let sym_len = m + ncp;
        let samples_per_frame = config.num_symbols_per_frame * sym_len;
        let doc = TAU / m as f64;
        let carrier_phasors: Vec<Vec<Complex64>> = (0 .. nc + 2)
            .map(|c| {
                (0 .. m)
                    .map(|r| Complex64::from_polar(1.0, ((nlower + c) * r) as f64 * doc))
                    .collect()
            })
            .collect();
        let pilots: Vec<Complex64> = PILOT_VALUES[.. nc + 2]
            .iter()
            .map(|&p| Complex64::new(f64::from(p), 0.0))
            .collect();
        let mut ofdm = Self {
            config,
            m,
            ncp,
            sym_len,
            samples_per_frame,
            nlower,
            layout,
            pilots,
            pilot_samples_conj: Vec::new(),
            timing_norm: 0.0,
            carrier_phasors,
            tx_bpf: None,
            rxbuf: vec![Complex64::new(0.0, 0.0); 3 * samples_per_frame + 3 * sym_len],
            nin: samples_per_frame,
            timing_en: true,
            foff_est_en: true,
            phase_est_en: true,
            timing_valid: false,
            timing_mx: 0.0,
            timing_est: 0,
            sample_point: 0,
            foff_est_hz: 0.0,
            coarse_foff_est_hz: 0.0,
            foff_metric: Complex64::new(0.0, 0.0),
            mean_amp: 0.0,
            sig_var: 0.0,
            noise_var: 1.0,
            snr_est_db: 0.0,
            clock_offset_counter: 0,
            rx_np: Vec::new(),
            rx_amp: Vec::new(),
            sync: FrameSync::new(),
        };
        let pilot_samples: Vec<Complex64> = iter::repeat(Complex64::new(0.0, 0.0))
            .take(ncp)
            .chain(ofdm.idft(&ofdm.pilots))
            .collect();
        ofdm.timing_norm =
            sym_len as f64 * pilot_samples.iter().map(Complex64::norm_sqr).sum::<f64>();
        ofdm.pilot_samples_conj = pilot_samples.iter().map(Complex64::conj).collect();
        Ok(ofdm)
    }

    /// Returns configuration.
    #[must_use]
    pub fn config(&self) -> &OfdmConfig {
        &self.config
    }

    /// Returns frame layout.
    #[must_use]
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Returns samples per symbol, excluding the cyclic prefix.
    #[must_use]
    pub fn samples_per_symbol(&self) -> usize {
        self.m
    }

    /// Returns samples per cyclic prefix.
    #[must_use]
    pub fn cyclic_prefix_len(&self) -> usize {
        self.ncp
    }

    /// Returns samples per frame.
    #[must_use]
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Returns bits per frame.
    #[must_use]
    pub fn bits_per_frame(&self) -> usize {
        self.layout.bits_per_frame()
    }

    /// Returns index of the lowest carrier, in units of the carrier spacing.
    #[must_use]
    pub fn nlower(&self) -> usize {
        self.nlower
    }

    /// Returns number of samples the next call to `sync_search` or `demod` expects.
    #[must_use]
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Returns largest value `nin` can take.
    #[must_use]
    pub fn max_nin(&self) -> usize {
        self.samples_per_frame + self.sym_len / 4
    }

    /// Returns samples of one modem frame carrying given bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits.len()` is not the number of bits per frame.
    pub fn modulate(&mut self, bits: &[Bit]) -> Result<Vec<Complex64>, Error> {
        if bits.len() != self.bits_per_frame() {
            return Err(Error::InvalidInput(format!(
                "Expected {} bits per frame (found {})",
                self.bits_per_frame(),
                bits.len()
            )));
        }
        let syms = qpsk::modulate(bits)?;
        self.txframe(&syms)
    }

    /// Returns samples of one modem frame carrying given data symbols.
    ///
    /// The pilot row is inserted, each row is converted to time samples with a cyclic prefix, and
    /// the transmit band-pass filter is applied if enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if `syms.len()` is not the number of data symbols per frame.
    pub fn txframe(&mut self, syms: &[Complex64]) -> Result<Vec<Complex64>, Error> {
        let nc = self.config.num_carriers;
        if syms.len() != self.layout.syms_per_frame() {
            return Err(Error::InvalidInput(format!(
                "Expected {} symbols per frame (found {})",
                self.layout.syms_per_frame(),
                syms.len()
            )));
        }
        let zero = Complex64::new(0.0, 0.0);
        let mut samples = Vec::with_capacity(self.samples_per_frame);
        let rows = iter::once(self.pilots.clone()).chain(syms.chunks_exact(nc).map(|data| {
            iter::once(zero)
                .chain(data.iter().copied())
                .chain(iter::once(zero))
                .collect()
        }));
        for row in rows {
            let time = self.idft(&row);
            samples.extend_from_slice(&time[self.m - self.ncp ..]);
            samples.extend(time);
        }
        if let Some(bpf) = &mut self.tx_bpf {
            samples = bpf.filter(&samples);
        }
        Ok(samples)
    }

    /// Attempts frame acquisition on the latest samples.
    ///
    /// On success the modem resets its timing, adopts the coarse frequency estimate, and sets
    /// `nin` so that the next call starts on a frame boundary.
    ///
    /// # Returns
    ///
    /// - `timing_valid`: Whether a valid pilot correlation peak was found.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len()` differs from `nin()`.
    pub fn sync_search(&mut self, samples: &[Complex64]) -> Result<bool, Error> {
        self.push_samples(samples)?;
        let st = self.sym_len + self.samples_per_frame;
        let en = st + 2 * self.samples_per_frame;
        let (ct_est, timing_mx) = self.est_timing(&self.rxbuf[st .. en]);
        self.set_timing_metric(timing_mx);
        self.coarse_foff_est_hz = self.est_freq_offset(st + ct_est);
        debug!(
            "Acquisition: ct_est {ct_est}, coarse foff {:.2} Hz, timing_mx {timing_mx:.4}, \
            valid {}",
            self.coarse_foff_est_hz, self.timing_valid
        );
        if self.timing_valid {
            self.nin = self.samples_per_frame + ct_est;
            self.sample_point = 0;
            self.timing_est = 0;
            self.foff_est_hz = self.coarse_foff_est_hz;
        } else {
            self.nin = self.samples_per_frame;
        }
        Ok(self.timing_valid)
    }

    /// Attempts frame acquisition on real 16-bit samples scaled by `gain`.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len()` differs from `nin()`.
    pub fn sync_search_shorts(&mut self, samples: &[i16], gain: f64) -> Result<bool, Error> {
        self.sync_search(&shorts_to_complex(samples, gain))
    }

    /// Demodulates one frame from the latest samples.
    ///
    /// Updates fine timing, frequency offset, per-carrier phase and amplitude estimates, the
    /// signal and noise power estimates, and `nin` for the next call.
    ///
    /// # Returns
    ///
    /// - `bits`: Hard decisions on all bits of the frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len()` differs from `nin()`.
    pub fn demod(&mut self, samples: &[Complex64]) -> Result<Vec<Bit>, Error> {
        self.push_samples(samples)?;
        Ok(self.demod_core())
    }

    /// Demodulates one frame from real 16-bit samples scaled by `gain`.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len()` differs from `nin()`.
    pub fn demod_shorts(&mut self, samples: &[i16], gain: f64) -> Result<Vec<Bit>, Error> {
        self.demod(&shorts_to_complex(samples, gain))
    }

    /// Advances the frame sync state machine by one frame.
    ///
    /// # Parameters
    ///
    /// - `rx_uw`: Received UW bits of the frame (ignored while searching).
    ///
    /// # Errors
    ///
    /// Returns an error if `rx_uw.len()` is not the number of UW bits per frame.
    pub fn sync_state_machine(&mut self, rx_uw: &[Bit]) -> Result<SyncState, Error> {
        if rx_uw.len() != self.layout.num_uw_bits() {
            return Err(Error::InvalidInput(format!(
                "Expected {} UW bits (found {})",
                self.layout.num_uw_bits(),
                rx_uw.len()
            )));
        }
        let uw_errors = self.layout.uw_errors(rx_uw);
        let state = self.sync.step(self.timing_valid, uw_errors);
        if self.sync.last_state() == SyncState::Search && state == SyncState::Trial {
            self.clock_offset_counter = 0;
        }
        Ok(state)
    }

    /// Applies an operator sync command.
    pub fn set_sync(&mut self, cmd: SyncCommand) {
        self.sync.command(cmd);
    }

    /// Returns frame sync state.
    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Returns frame and interleaver sync state machines.
    #[must_use]
    pub fn frame_sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Returns frame and interleaver sync state machines for update.
    pub fn frame_sync_mut(&mut self) -> &mut FrameSync {
        &mut self.sync
    }

    /// Enables or disables fine timing. When disabled, the sample point is fixed at `Ncp - 1`.
    pub fn set_timing_enable(&mut self, enable: bool) {
        self.timing_en = enable;
        if !enable {
            self.sample_point = signed(self.ncp) - 1;
        }
    }

    /// Enables or disables frequency offset tracking.
    pub fn set_foff_est_enable(&mut self, enable: bool) {
        self.foff_est_en = enable;
    }

    /// Enables or disables per-carrier phase correction.
    pub fn set_phase_est_enable(&mut self, enable: bool) {
        self.phase_est_en = enable;
    }

    /// Overrides the frequency offset estimate (Hz).
    pub fn set_foff_est_hz(&mut self, foff_hz: f64) {
        self.foff_est_hz = foff_hz;
    }

    /// Enables or disables the transmit band-pass filter. Enabling clears the filter memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter cannot be built for the configured sample rate.
    pub fn set_tx_bpf(&mut self, enable: bool) -> Result<(), Error> {
        self.tx_bpf = if enable {
            Some(ComplexFir::band_pass(
                TX_BPF_NUM_TAPS,
                TX_BPF_CUTOFF_HZ,
                self.config.centre_hz,
                self.config.sample_rate_hz,
            )?)
        } else {
            None
        };
        Ok(())
    }

    /// Returns whether the last timing estimate found a valid peak.
    #[must_use]
    pub fn timing_valid(&self) -> bool {
        self.timing_valid
    }

    /// Returns frequency offset estimate (Hz).
    #[must_use]
    pub fn foff_est_hz(&self) -> f64 {
        self.foff_est_hz
    }

    /// Returns most recent coarse frequency offset estimate (Hz).
    #[must_use]
    pub fn coarse_foff_est_hz(&self) -> f64 {
        self.coarse_foff_est_hz
    }

    /// Returns fine timing estimate (samples).
    #[must_use]
    pub fn timing_est(&self) -> isize {
        self.timing_est
    }

    /// Returns sample point (samples).
    #[must_use]
    pub fn sample_point(&self) -> isize {
        self.sample_point
    }

    /// Returns smoothed mean amplitude of the data symbols.
    #[must_use]
    pub fn mean_amp(&self) -> f64 {
        self.mean_amp
    }

    /// Returns phase-corrected data symbols of the last frame.
    #[must_use]
    pub fn rx_np(&self) -> &[Complex64] {
        &self.rx_np
    }

    /// Returns amplitude estimates of the data symbols of the last frame.
    #[must_use]
    pub fn rx_amp(&self) -> &[f64] {
        &self.rx_amp
    }

    /// Returns demodulator statistics, updating the smoothed SNR estimate.
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&mut self) -> OfdmStats {
        let snr_est_db = 10.0
            * ((0.1 + self.sig_var / self.noise_var)
                * self.config.num_carriers as f64
                * self.config.symbol_rate_hz()
                / SNR_NOISE_BANDWIDTH_HZ)
                .log10();
        self.snr_est_db = 0.9 * self.snr_est_db + 0.1 * snr_est_db;
        let total = self.sync.frame_count() * self.samples_per_frame;
        let clock_offset = if total == 0 {
            0.0
        } else {
            self.clock_offset_counter as f64 / total as f64
        };
        OfdmStats {
            snr_est_db: self.snr_est_db,
            sync: matches!(self.sync.state(), SyncState::Trial | SyncState::Synced),
            foff_hz: self.foff_est_hz,
            timing_est: self.timing_est,
            sample_point: self.sample_point,
            clock_offset,
            timing_mx: self.timing_mx,
            rx_np: self.rx_np.clone(),
            rx_amp: self.rx_amp.clone(),
        }
    }

    /// Shifts `samples` into the receive buffer.
    fn push_samples(&mut self, samples: &[Complex64]) -> Result<(), Error> {
        if samples.len() != self.nin {
            return Err(Error::InvalidInput(format!(
                "Expected {} samples (found {})",
                self.nin,
                samples.len()
            )));
        }
        let keep = self.rxbuf.len() - self.nin;
        self.rxbuf.copy_within(self.nin .., 0);
        self.rxbuf[keep ..].copy_from_slice(samples);
        Ok(())
    }

    /// Demodulates the frame in the receive buffer.
    #[allow(clippy::cast_precision_loss)]
    fn demod_core(&mut self) -> Vec<Bit> {
        let nc = self.config.num_carriers;
        let ns = self.config.num_symbols_per_frame;
        let spf = self.samples_per_frame;
        let prev_timing_est = self.timing_est;
        let mut woff = self.woff();

        if self.timing_en {
            let half_window = self.config.timing_window_width / 2;
            let st = (self.sym_len + spf - half_window).saturating_add_signed(self.timing_est);
            let en = st + spf - 1 + self.sym_len + self.config.timing_window_width;
            let work = self.freq_shifted(st .. en, woff);
            let (ft_est, timing_mx) = self.est_timing(&work);
            self.set_timing_metric(timing_mx);
            self.timing_est += signed(ft_est) - signed(half_window);
            // Kept current so that acquisition can resume from it after a loss of sync
            self.coarse_foff_est_hz = self.est_freq_offset(st + ft_est);
            if self.foff_est_en && self.sync.frame_count() == 0 {
                self.foff_est_hz = self.coarse_foff_est_hz;
                woff = self.woff();
            }
            let ncp = signed(self.ncp);
            self.sample_point = self
                .sample_point
                .max(self.timing_est + ncp / 4)
                .min(self.timing_est + ncp);
        }

        // Previous pilot, this pilot, data rows, next pilot, and the pilot after that
        let sp = self.sample_point;
        let at = |start: usize| (start + 1).saturating_add_signed(sp);
        let mut rx_sym = Vec::with_capacity(ns + 3);
        rx_sym.push(self.sym_at(at(self.sym_len), woff));
        for rr in 0 ..= ns {
            rx_sym.push(self.sym_at(at(self.sym_len + spf + rr * self.sym_len), woff));
        }
        rx_sym.push(self.sym_at(at(self.sym_len + 3 * spf), woff));

        if self.foff_est_en {
            let this_pilot: Complex64 = rx_sym[1].iter().sum();
            let next_pilot: Complex64 = rx_sym[ns + 1].iter().sum();
            let freq_err_rect = this_pilot.conj() * next_pilot + 1e-6;
            let freq_err_hz =
                freq_err_rect.arg() * self.config.symbol_rate_hz() / (TAU * ns as f64);
            self.foff_est_hz += FOFF_EST_GAIN * freq_err_hz;
        }

        let mut phase_est = vec![10.0; nc + 2];
        let mut amp_est = vec![0.0; nc + 2];
        for i in 1 ..= nc {
            let mut acc = Complex64::new(0.0, 0.0);
            for row in [1, ns + 1, 0, ns + 2] {
                for j in i - 1 ..= i + 1 {
                    acc += rx_sym[row][j] * self.pilots[j].conj();
                }
            }
            phase_est[i] = acc.arg();
            amp_est[i] = (acc / NUM_PILOTS_PER_ESTIMATE).norm();
        }

        self.rx_np.clear();
        self.rx_amp.clear();
        for row in &rx_sym[2 ..= ns] {
            for i in 1 ..= nc {
                let corrected = if self.phase_est_en {
                    row[i] * Complex64::from_polar(1.0, -phase_est[i])
                } else {
                    row[i]
                };
                self.rx_np.push(corrected);
                self.rx_amp.push(amp_est[i]);
            }
        }
        let num_syms = self.rx_np.len() as f64;
        self.mean_amp = 0.9 * self.mean_amp + 0.1 * self.rx_amp.iter().sum::<f64>() / num_syms;

        self.nin = spf;
        if self.timing_en {
            self.clock_offset_counter += prev_timing_est - self.timing_est;
            let thresh = signed(self.sym_len / 8);
            let shift = signed(self.sym_len / 4);
            if self.timing_est > thresh {
                self.nin = spf + self.sym_len / 4;
                self.timing_est -= shift;
                self.sample_point -= shift;
            } else if self.timing_est < -thresh {
                self.nin = spf - self.sym_len / 4;
                self.timing_est += shift;
                self.sample_point += shift;
            }
        }
        self.update_signal_and_noise();
        debug!(
            "Demod: timing_est {}, sample_point {}, foff {:.2} Hz, mean_amp {:.3}, nin {}",
            self.timing_est, self.sample_point, self.foff_est_hz, self.mean_amp, self.nin
        );
        qpsk::demodulate(&self.rx_np)
    }

    /// Estimates signal power from all data symbols, and noise power from the quadrature spread
    /// of the symbols whose in-phase magnitude exceeds the signal RMS.
    #[allow(clippy::cast_precision_loss)]
    fn update_signal_and_noise(&mut self) {
        let sig_var =
            self.rx_np.iter().map(Complex64::norm_sqr).sum::<f64>() / self.rx_np.len() as f64;
        let sig_rms = sig_var.sqrt();
        let (n, sum_x, sum_xx) = self
            .rx_np
            .iter()
            .filter(|s| s.re.abs() > sig_rms)
            .fold((0.0, 0.0, 0.0), |(n, sum_x, sum_xx), s| {
                (n + 1.0, sum_x + s.im, sum_xx + s.im * s.im)
            });
        let noise_var = if n > 1.0 {
            (n * sum_xx - sum_x * sum_x) / (n * (n - 1.0))
        } else {
            1.0
        };
        self.sig_var = sig_var;
        self.noise_var = 2.0 * noise_var;
    }

    /// Returns frequency correction per sample (radians).
    fn woff(&self) -> f64 {
        TAU * self.foff_est_hz / self.config.sample_rate_hz
    }

    /// Records the normalized correlation peak of a timing estimate.
    fn set_timing_metric(&mut self, timing_mx: f64) {
        self.timing_mx = timing_mx;
        self.timing_valid = timing_mx > self.config.timing_mx_thresh;
    }

    /// Returns position and normalized magnitude of the best pilot correlation in `rx`.
    ///
    /// Each candidate position correlates against the pilot at that position and one frame later.
    #[allow(clippy::cast_precision_loss)]
    fn est_timing(&self, rx: &[Complex64]) -> (usize, f64) {
        let span = self.samples_per_frame + self.sym_len;
        let num_corr = rx.len().saturating_sub(span);
        let energy: f64 = rx.iter().map(Complex64::norm_sqr).sum();
        let av_level = 2.0 * (self.timing_norm * energy / rx.len() as f64).sqrt() + 1e-12;
        let mut best = (0, 0.0);
        for i in 0 .. num_corr {
            let corr_st = self.correlate_pilot(&rx[i .. i + self.sym_len]);
            let corr_en = self.correlate_pilot(
                &rx[i + self.samples_per_frame .. i + self.samples_per_frame + self.sym_len],
            );
            let corr = (corr_st.norm() + corr_en.norm()) / av_level;
            if corr > best.1 {
                best = (i, corr);
            }
        }
        best
    }

    /// Returns correlation of `rx` against the start of the pilot symbol.
    fn correlate_pilot(&self, rx: &[Complex64]) -> Complex64 {
        rx.iter()
            .zip(&self.pilot_samples_conj)
            .map(|(&x, &p)| x * p)
            .sum()
    }

    /// Returns coarse frequency offset estimate (Hz) for a pilot starting at `pos` in the
    /// receive buffer, updating the smoothed correlation product.
    ///
    /// The pilot symbol is split in halves, and the phase advance from the first half to the
    /// second half, in this frame and the next, gives the offset.
    #[allow(clippy::cast_precision_loss)]
    fn est_freq_offset(&mut self, pos: usize) -> f64 {
        let half = self.sym_len / 2;
        let halves = |start: usize| {
            let first = self.correlate_pilot(&self.rxbuf[start .. start + half]);
            let second: Complex64 = self.rxbuf[start + half .. start + 2 * half]
                .iter()
                .zip(&self.pilot_samples_conj[half ..])
                .map(|(&x, &p)| x * p)
                .sum();
            (first, second)
        };
        let (p1, p2) = halves(pos);
        let (p3, p4) = halves(pos + self.samples_per_frame);
        self.foff_metric = 0.9 * self.foff_metric + 0.1 * (p1.conj() * p2 + p3.conj() * p4);
        let half_sym_rate = self.config.sample_rate_hz / half as f64;
        half_sym_rate * (self.foff_metric + 1e-12).arg() / TAU
    }

    /// Returns receive buffer samples in `range`, each rotated by `-woff` times its index.
    #[allow(clippy::cast_precision_loss)]
    fn freq_shifted(&self, range: Range<usize>, woff: f64) -> Vec<Complex64> {
        range
            .map(|i| self.rxbuf[i] * Complex64::from_polar(1.0, -woff * i as f64))
            .collect()
    }

    /// Returns carrier values of the frequency-corrected symbol starting at `start`.
    fn sym_at(&self, start: usize, woff: f64) -> Vec<Complex64> {
        self.dft(&self.freq_shifted(start .. start + self.m, woff))
    }

    /// Returns `M` time samples for `Nc + 2` carrier values.
    #[allow(clippy::cast_precision_loss)]
    fn idft(&self, carriers: &[Complex64]) -> Vec<Complex64> {
        let scale = 1.0 / self.m as f64;
        (0 .. self.m)
            .map(|r| {
                carriers
                    .iter()
                    .zip(&self.carrier_phasors)
                    .map(|(&v, phasors)| v * phasors[r])
                    .sum::<Complex64>()
                    * scale
            })
            .collect()
    }

    /// Returns `Nc + 2` carrier values for `M` time samples.
    fn dft(&self, samples: &[Complex64]) -> Vec<Complex64> {
        self.carrier_phasors
            .iter()
            .map(|phasors| {
                samples
                    .iter()
                    .zip(phasors)
                    .map(|(&x, p)| x * p.conj())
                    .sum()
            })
            .collect()
    }
}

/// Returns complex samples for real 16-bit samples scaled by `gain`.
fn shorts_to_complex(samples: &[i16], gain: f64) -> Vec<Complex64> {
    samples
        .iter()
        .map(|&x| Complex64::new(gain * f64::from(x), 0.0))
        .collect()
}

/// Returns `x` as a signed sample offset.
#[allow(clippy::cast_possible_wrap)]
fn signed(x: usize) -> isize {
    x as isize
}

#[cfg(test)]
mod tests_of_ofdm {
    use super::*;
    use crate::utils;
    use float_eq::assert_float_eq;

    /// Returns noiseless sample stream of a repeated test frame, with the frame bits.
    fn test_stream(ofdm: &mut Ofdm, num_frames: usize) -> (Vec<Complex64>, Vec<Bit>) {
        let payload = utils::test_frame_bits(ofdm.layout().num_payload_bits());
        let txt = [Bit::One, Bit::Zero, Bit::One, Bit::One];
        let frame_bits = ofdm.layout().assemble_bits(&payload, &txt).unwrap();
        let frame_samples = ofdm.modulate(&frame_bits).unwrap();
        let stream = frame_samples
            .iter()
            .copied()
            .cycle()
            .take(num_frames * frame_samples.len())
            .collect();
        (stream, frame_bits)
    }

    /// Runs the receiver over `samples`, returning the sync state before each demodulated frame
    /// and the number of bit errors in it.
    fn receive(
        ofdm: &mut Ofdm,
        samples: &[Complex64],
        frame_bits: &[Bit],
    ) -> Vec<(SyncState, usize)> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos + ofdm.nin() <= samples.len() {
            let nin = ofdm.nin();
            let chunk = &samples[pos .. pos + nin];
            pos += nin;
            if ofdm.sync_state() == SyncState::Search {
                ofdm.sync_search(chunk).unwrap();
                let rx_uw = vec![Bit::Zero; ofdm.layout().num_uw_bits()];
                ofdm.sync_state_machine(&rx_uw).unwrap();
            } else {
                let state = ofdm.sync_state();
                let rx_bits = ofdm.demod(chunk).unwrap();
                frames.push((state, utils::error_count(&rx_bits, frame_bits)));
                let rx_uw = ofdm.layout().extract_uw(&rx_bits).unwrap();
                ofdm.sync_state_machine(&rx_uw).unwrap();
            }
        }
        frames
    }

    #[test]
    fn test_default_sizing() {
        let ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        assert_eq!(ofdm.samples_per_symbol(), 144);
        assert_eq!(ofdm.cyclic_prefix_len(), 16);
        assert_eq!(ofdm.samples_per_frame(), 8 * (144 + 16));
        assert_eq!(ofdm.bits_per_frame(), 238);
        assert_eq!(ofdm.layout().num_uw_bits(), 10);
        assert_eq!(ofdm.nlower(), 18);
        assert_eq!(ofdm.nin(), 1280);
        assert_eq!(ofdm.max_nin(), 1320);
        assert_eq!(ofdm.rxbuf.len(), 4320);
        assert_eq!(ofdm.pilots.len(), 19);
        assert_eq!(ofdm.sync_state(), SyncState::Search);
    }

    #[test]
    fn test_validate() {
        assert!(OfdmConfig::default().validate().is_ok());
        let invalid_configs = [
            OfdmConfig {
                num_carriers: 0,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                num_carriers: 63,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                num_symbols_per_frame: 1,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                bits_per_symbol: 1,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                cyclic_prefix_s: 0.0,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                num_txt_bits: 3,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                timing_mx_thresh: -0.1,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                timing_window_width: 1,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                timing_window_width: 161,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                timing_window_width: 3000,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                centre_hz: 100.0,
                ..OfdmConfig::default()
            },
            OfdmConfig {
                centre_hz: 3800.0,
                ..OfdmConfig::default()
            },
        ];
        for config in invalid_configs {
            assert!(config.validate().is_err());
            assert!(Ofdm::new(config).is_err());
        }
    }

    #[test]
    fn test_widest_timing_window() {
        let config = OfdmConfig {
            timing_window_width: 160,
            ..OfdmConfig::default()
        };
        assert!(config.validate().is_ok());
        let mut tx = Ofdm::new(config).unwrap();
        let mut rx = Ofdm::new(config).unwrap();
        let samples = tx.modulate(&utils::test_frame_bits(238)).unwrap().repeat(8);
        let mut pos = 0;
        let mut num_demods = 0;
        while pos + rx.nin() <= samples.len() {
            let nin = rx.nin();
            let chunk = &samples[pos .. pos + nin];
            pos += nin;
            let rx_uw = if rx.sync_state() == SyncState::Search {
                rx.sync_search(chunk).unwrap();
                vec![Bit::Zero; 10]
            } else {
                num_demods += 1;
                let rx_bits = rx.demod(chunk).unwrap();
                rx.layout().extract_uw(&rx_bits).unwrap()
            };
            rx.sync_state_machine(&rx_uw).unwrap();
        }
        assert!(num_demods > 0);
    }

    #[test]
    fn test_txframe() {
        let mut ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        assert!(ofdm.txframe(&[Complex64::new(1.0, 0.0); 118]).is_err());
        assert!(ofdm.modulate(&[Bit::Zero; 237]).is_err());
        let syms = qpsk::modulate(&utils::test_frame_bits(238)).unwrap();
        let samples = ofdm.txframe(&syms).unwrap();
        assert_eq!(samples.len(), 1280);
        // Each symbol starts with a copy of its last `Ncp` samples
        for row in samples.chunks_exact(160) {
            for k in 0 .. 16 {
                assert_float_eq!((row[k] - row[144 + k]).norm(), 0.0, abs <= 1e-12);
            }
        }
        // Data carriers come back out of the DFT
        let carriers = ofdm.dft(&samples[160 + 16 .. 320]);
        assert_float_eq!(carriers[0].norm(), 0.0, abs <= 1e-9);
        for (c, &sym) in syms[.. 17].iter().enumerate() {
            assert_float_eq!((carriers[c + 1] - sym).norm(), 0.0, abs <= 1e-9);
        }
        assert_float_eq!(carriers[18].norm(), 0.0, abs <= 1e-9);
    }

    #[test]
    fn test_noiseless_round_trip() {
        let mut tx = Ofdm::new(OfdmConfig::default()).unwrap();
        let mut rx = Ofdm::new(OfdmConfig::default()).unwrap();
        let (samples, frame_bits) = test_stream(&mut tx, 12);
        let frames = receive(&mut rx, &samples, &frame_bits);
        assert_eq!(rx.sync_state(), SyncState::Synced);
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[.. 4].iter().filter(|f| f.0 == SyncState::Trial).count(), 4);
        for &(_, num_errors) in &frames {
            assert_eq!(num_errors, 0);
        }
        assert_float_eq!(rx.foff_est_hz(), 0.0, abs <= 0.1);
        assert_eq!(rx.nin(), rx.samples_per_frame());
        let stats = rx.stats();
        assert!(stats.sync);
        assert_eq!(stats.rx_np.len(), 119);
        assert_eq!(stats.rx_amp.len(), 119);
        assert!(stats.snr_est_db.is_finite());
    }

    #[test]
    fn test_round_trip_with_frequency_offset() {
        let mut tx = Ofdm::new(OfdmConfig::default()).unwrap();
        let mut rx = Ofdm::new(OfdmConfig::default()).unwrap();
        let (samples, frame_bits) = test_stream(&mut tx, 12);
        let samples = utils::frequency_offset(&samples, 5.0, 8000.0);
        let frames = receive(&mut rx, &samples, &frame_bits);
        assert_eq!(rx.sync_state(), SyncState::Synced);
        for &(_, num_errors) in &frames {
            assert_eq!(num_errors, 0);
        }
        assert_float_eq!(rx.foff_est_hz(), 5.0, abs <= 1.0);
    }

    #[test]
    fn test_coarse_frequency_estimate() {
        let mut ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        let pilot_frame = ofdm.txframe(&[Complex64::new(0.0, 0.0); 119]).unwrap();
        let samples = utils::frequency_offset(&pilot_frame.repeat(8), 10.0, 8000.0);
        let mut pos = 0;
        for _ in 0 .. 4 {
            let nin = ofdm.nin();
            ofdm.sync_search(&samples[pos .. pos + nin]).unwrap();
            pos += nin;
        }
        assert!(ofdm.timing_valid());
        assert_float_eq!(ofdm.coarse_foff_est_hz(), 10.0, abs <= 1.5);
    }

    #[test]
    fn test_no_acquisition_on_silence() {
        let mut ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        let silence = vec![Complex64::new(0.0, 0.0); ofdm.nin()];
        assert!(!ofdm.sync_search(&silence).unwrap());
        assert_eq!(ofdm.nin(), ofdm.samples_per_frame());
    }

    #[test]
    fn test_nin_contract() {
        let mut ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        let too_long = vec![Complex64::new(0.0, 0.0); ofdm.nin() + 1];
        assert!(ofdm.sync_search(&too_long).is_err());
        assert!(ofdm.demod(&too_long[1 .. 100]).is_err());
        assert!(ofdm.demod_shorts(&[0; 10], 1.0).is_err());
        assert!(ofdm.sync_state_machine(&[Bit::Zero; 9]).is_err());
    }

    #[test]
    fn test_shorts() {
        let mut tx = Ofdm::new(OfdmConfig::default()).unwrap();
        let (samples, _) = test_stream(&mut tx, 3);
        #[allow(clippy::cast_possible_truncation)]
        let shorts: Vec<i16> = samples.iter().map(|x| (x.re * 8000.0) as i16).collect();
        let gain = 1.0 / 8000.0;
        let mut from_shorts = Ofdm::new(OfdmConfig::default()).unwrap();
        let mut from_complex = Ofdm::new(OfdmConfig::default()).unwrap();
        let complex = shorts_to_complex(&shorts, gain);
        let n = from_shorts.nin();
        assert_eq!(
            from_shorts.sync_search_shorts(&shorts[.. n], gain).unwrap(),
            from_complex.sync_search(&complex[.. n]).unwrap()
        );
        let n2 = from_shorts.nin();
        assert_eq!(
            from_shorts.demod_shorts(&shorts[n .. n + n2], gain).unwrap(),
            from_complex.demod(&complex[n .. n + n2]).unwrap()
        );
        assert_eq!(from_shorts.nin(), from_complex.nin());
        assert_float_eq!(from_shorts.foff_est_hz(), from_complex.foff_est_hz(), abs <= 1e-12);
    }

    #[test]
    fn test_estimator_toggles() {
        let mut tx = Ofdm::new(OfdmConfig::default()).unwrap();
        let mut rx = Ofdm::new(OfdmConfig::default()).unwrap();
        let (samples, _) = test_stream(&mut tx, 3);
        let n = rx.nin();
        assert!(rx.sync_search(&samples[.. n]).unwrap());
        rx.set_timing_enable(false);
        rx.set_foff_est_enable(false);
        rx.set_phase_est_enable(false);
        rx.set_foff_est_hz(2.5);
        assert_eq!(rx.sample_point(), 15);
        let n2 = rx.nin();
        rx.demod(&samples[n .. n + n2]).unwrap();
        assert_eq!(rx.sample_point(), 15);
        assert_eq!(rx.timing_est(), 0);
        assert_float_eq!(rx.foff_est_hz(), 2.5, abs <= 1e-12);
        assert_eq!(rx.nin(), rx.samples_per_frame());
        assert!(rx.rx_amp().iter().all(|&a| a > 0.0));
    }

    #[test]
    fn test_tx_bpf() {
        let mut plain = Ofdm::new(OfdmConfig::default()).unwrap();
        let mut filtered = Ofdm::new(OfdmConfig::default()).unwrap();
        filtered.set_tx_bpf(true).unwrap();
        let bits = utils::test_frame_bits(238);
        let a = plain.modulate(&bits).unwrap();
        let b = filtered.modulate(&bits).unwrap();
        assert_eq!(b.len(), a.len());
        assert!(a.iter().zip(&b).any(|(x, y)| (x - y).norm() > 1e-3));
        filtered.set_tx_bpf(false).unwrap();
        assert_eq!(filtered.modulate(&bits).unwrap(), a);
    }

    #[test]
    fn test_set_sync() {
        let mut ofdm = Ofdm::new(OfdmConfig::default()).unwrap();
        ofdm.set_sync(SyncCommand::Manualsync);
        assert_eq!(ofdm.frame_sync().mode(), crate::sync::SyncMode::Manual);
        ofdm.set_sync(SyncCommand::Unsync);
        assert_eq!(ofdm.sync_state(), SyncState::Search);
    }
}
