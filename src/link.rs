//! Interleaved LDPC-over-OFDM link
//!
//! On transmit, each block of data bits is LDPC-encoded and mapped to QPSK, the symbols of
//! `interleave_frames` codewords are permuted together by a Golden-Prime interleaver, and each
//! frame's share is framed with the UW and text bits and modulated. On receive, frames are
//! demodulated into a sliding window of symbols and amplitudes. Once the window is known to start
//! on an interleaver boundary (interleaver sync), each full window is de-interleaved, converted to
//! LLR values, and decoded.

use log::{debug, info, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::interleaver::{self, Interleaver};
use crate::ofdm::{Ofdm, OfdmConfig};
use crate::sync::SyncState;
use crate::{llr, qpsk, utils, Bit, DecoderOutput, Error, LdpcCode};

/// Link configuration
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Number of modem frames spanned by one interleaver window
    pub interleave_frames: usize,
    /// Maximum number of LDPC decoder iterations
    pub max_iter: usize,
    /// Es/N0 (linear) assumed when computing LLR values
    pub es_no: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interleave_frames: 1,
            max_iter: 100,
            es_no: 3.0,
        }
    }
}

impl LinkConfig {
    /// Checks configuration against the HRA (112, 112) code.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iter` is zero, if `es_no` is not positive, or if there is no
    /// Golden-Prime interleaver for `interleave_frames` codewords.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_for(&LdpcCode::hra_112_112())
    }

    /// Checks configuration against a given code.
    fn validate_for(&self, code: &LdpcCode) -> Result<(), Error> {
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig(
                "Maximum number of decoder iterations cannot be zero".to_string(),
            ));
        }
        if !(self.es_no.is_finite() && self.es_no > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "Es/N0 must be positive and finite (found {})",
                self.es_no
            )));
        }
        if self.interleave_frames == 0 {
            return Err(Error::InvalidConfig(
                "Interleaver must span at least one frame".to_string(),
            ));
        }
        interleaver::golden_prime_step(self.interleave_frames * code.coded_syms_per_frame())?;
        Ok(())
    }
}

/// Codewords decoded from one interleaver window
#[derive(Clone, PartialEq, Debug)]
pub struct DecodedWindow {
    /// Decoded data bits of all codewords, in transmit order
    pub data_bits: Vec<Bit>,
    /// Decoder iterations for each codeword
    pub iterations: Vec<usize>,
    /// Parity checks satisfied for each codeword
    pub parity_checks_passed: Vec<usize>,
    /// Estimate of the data bit errors left in the window, from the failed parity checks
    pub coded_errors_est: usize,
    /// De-interleaved payload symbols of the window
    pub codeword_syms: Vec<Complex64>,
}

/// Outcome of one receive call
#[derive(Clone, PartialEq, Debug)]
pub struct RxOutput {
    /// Frame sync state after the call
    pub sync_state: SyncState,
    /// Interleaver sync state after the call
    pub interleaver_state: SyncState,
    /// UW errors of the demodulated frame, if a frame was demodulated
    pub uw_errors: Option<usize>,
    /// Text bits of the demodulated frame, if a frame was demodulated
    pub txt_bits: Option<Vec<Bit>>,
    /// Decoded window, if a full interleaver window completed with this frame
    pub window: Option<DecodedWindow>,
}

/// Transmit and receive session for the LDPC-coded OFDM waveform
#[derive(Clone, Debug)]
pub struct LdpcOfdmLink {
    /// Link configuration
    config: LinkConfig,
    /// LDPC code
    code: LdpcCode,
    /// OFDM modem
    ofdm: Ofdm,
    /// Golden-Prime interleaver over the symbols of one window
    interleaver: Interleaver,
    /// Payload symbols of the most recent `interleave_frames` frames, oldest first
    codeword_syms: Vec<Complex64>,
    /// Amplitude estimates matching `codeword_syms`
    codeword_amps: Vec<f64>,
}

impl LdpcOfdmLink {
    /// Returns new link session.
    ///
    /// # Errors
    ///
    /// Returns an error if either configuration is invalid, or if a frame's payload does not hold
    /// exactly one codeword.
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::link::{LdpcOfdmLink, LinkConfig};
    /// use qofdm::ofdm::OfdmConfig;
    ///
    /// let link = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default())?;
    /// assert_eq!(link.data_bits_per_window(), 112);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(ofdm_config: OfdmConfig, config: LinkConfig) -> Result<Self, Error> {
        let code = LdpcCode::hra_112_112();
        config.validate_for(&code)?;
        let ofdm = Ofdm::new(ofdm_config)?;
        let coded_syms = code.coded_syms_per_frame();
        if ofdm.layout().num_payload_syms() != coded_syms {
            return Err(Error::InvalidConfig(format!(
                "Frame carries {} payload symbols but a codeword needs {coded_syms}",
                ofdm.layout().num_payload_syms()
            )));
        }
        let window_len = config.interleave_frames * coded_syms;
        let interleaver = Interleaver::golden_prime(window_len)?;
        Ok(Self {
            config,
            code,
            ofdm,
            interleaver,
            codeword_syms: vec![Complex64::new(0.0, 0.0); window_len],
            codeword_amps: vec![0.0; window_len],
        })
    }

    /// Returns link configuration.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Returns LDPC code.
    #[must_use]
    pub fn code(&self) -> &LdpcCode {
        &self.code
    }

    /// Returns OFDM modem.
    #[must_use]
    pub fn ofdm(&self) -> &Ofdm {
        &self.ofdm
    }

    /// Returns OFDM modem for setting toggles and sync commands.
    pub fn ofdm_mut(&mut self) -> &mut Ofdm {
        &mut self.ofdm
    }

    /// Returns number of samples the next call to `rx` expects.
    #[must_use]
    pub fn nin(&self) -> usize {
        self.ofdm.nin()
    }

    /// Returns number of data bits per interleaver window.
    #[must_use]
    pub fn data_bits_per_window(&self) -> usize {
        self.config.interleave_frames * self.code.data_bits_per_frame()
    }

    /// Returns number of text bits per interleaver window.
    #[must_use]
    pub fn txt_bits_per_window(&self) -> usize {
        self.config.interleave_frames * self.ofdm.layout().num_txt_bits()
    }

    /// Returns the test frame data bits for one window.
    #[must_use]
    pub fn test_window_bits(&self) -> Vec<Bit> {
        utils::test_frame_bits(self.code.data_bits_per_frame())
            .repeat(self.config.interleave_frames)
    }

    /// Returns samples of one interleaver window.
    ///
    /// # Parameters
    ///
    /// - `data_bits`: Data bits of all codewords in the window.
    ///
    /// - `txt_bits`: Text bits of all frames in the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of data bits or text bits per window is wrong.
    pub fn tx(&mut self, data_bits: &[Bit], txt_bits: &[Bit]) -> Result<Vec<Complex64>, Error> {
        if data_bits.len() != self.data_bits_per_window() {
            return Err(Error::InvalidInput(format!(
                "Expected {} data bits per window (found {})",
                self.data_bits_per_window(),
                data_bits.len()
            )));
        }
        if txt_bits.len() != self.txt_bits_per_window() {
            return Err(Error::InvalidInput(format!(
                "Expected {} text bits per window (found {})",
                self.txt_bits_per_window(),
                txt_bits.len()
            )));
        }
        let mut syms = Vec::with_capacity(self.interleaver.len());
        for data in data_bits.chunks_exact(self.code.data_bits_per_frame()) {
            syms.extend(qpsk::modulate(&self.code.encode(data)?)?);
        }
        let mut interleaved = Vec::with_capacity(self.interleaver.len());
        self.interleaver.interleave(&syms, &mut interleaved)?;
        let coded_syms = self.code.coded_syms_per_frame();
        let num_txt = self.ofdm.layout().num_txt_bits();
        let mut samples = Vec::with_capacity(
            self.config.interleave_frames * self.ofdm.samples_per_frame(),
        );
        for frame in 0 .. self.config.interleave_frames {
            let frame_syms = self.ofdm.layout().assemble_syms(
                &interleaved[frame * coded_syms .. (frame + 1) * coded_syms],
                &txt_bits[frame * num_txt .. (frame + 1) * num_txt],
            )?;
            samples.extend(self.ofdm.txframe(&frame_syms)?);
        }
        Ok(samples)
    }

    /// Processes `nin()` received samples.
    ///
    /// While searching, the samples are used for acquisition. Otherwise one frame is demodulated
    /// and its payload symbols enter the window; interleaver sync is attempted, and a full window
    /// is decoded when interleaver sync holds. The frame sync state machine advances on every call.
    /// A window that cannot be decoded is logged and skipped, with `window` left as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if `samples.len()` differs from `nin()`.
    pub fn rx(&mut self, samples: &[Complex64]) -> Result<RxOutput, Error> {
        let mut uw_errors = None;
        let mut txt_bits = None;
        let mut window = None;
        let rx_uw = if self.ofdm.sync_state() == SyncState::Search {
            self.ofdm.sync_search(samples)?;
            self.ofdm.layout().tx_uw().to_vec()
        } else {
            self.ofdm.demod(samples)?;
            let frame = self
                .ofdm
                .layout()
                .disassemble(self.ofdm.rx_np(), self.ofdm.rx_amp())?;
            let coded_syms = self.code.coded_syms_per_frame();
            let keep = self.codeword_syms.len() - coded_syms;
            self.codeword_syms.copy_within(coded_syms .., 0);
            self.codeword_syms[keep ..].copy_from_slice(&frame.payload_syms);
            self.codeword_amps.copy_within(coded_syms .., 0);
            self.codeword_amps[keep ..].copy_from_slice(&frame.payload_amps);
            // The frame is consumed either way, so a failed decode only loses the window
            window = self.process_window().unwrap_or_else(|err| {
                warn!("Window skipped: {err}");
                None
            });
            uw_errors = Some(self.ofdm.layout().uw_errors(&frame.rx_uw));
            txt_bits = Some(frame.txt_bits);
            frame.rx_uw
        };
        let sync_state = self.ofdm.sync_state_machine(&rx_uw)?;
        Ok(RxOutput {
            sync_state,
            interleaver_state: self.ofdm.frame_sync().interleaver_state(),
            uw_errors,
            txt_bits,
            window,
        })
    }

    /// Returns number of hard-decision errors in de-interleaved payload symbols, assuming every
    /// codeword carries the test frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `codeword_syms.len()` is not a multiple of the symbols per codeword.
    pub fn count_uncoded_errors(&self, codeword_syms: &[Complex64]) -> Result<usize, Error> {
        let coded_syms = self.code.coded_syms_per_frame();
        if codeword_syms.len() % coded_syms != 0 {
            return Err(Error::InvalidInput(format!(
                "Expected a multiple of {coded_syms} symbols (found {})",
                codeword_syms.len()
            )));
        }
        let tx_codeword = self
            .code
            .encode(&utils::test_frame_bits(self.code.data_bits_per_frame()))?;
        Ok(codeword_syms
            .chunks_exact(coded_syms)
            .map(|syms| utils::error_count(&qpsk::demodulate(syms), &tx_codeword))
            .sum())
    }

    /// De-interleaves the window, attempts interleaver sync, and decodes the window if it is
    /// complete.
    fn process_window(&mut self) -> Result<Option<DecodedWindow>, Error> {
        let mut syms_de = Vec::with_capacity(self.interleaver.len());
        let mut amps_de = Vec::with_capacity(self.interleaver.len());
        self.interleaver.deinterleave(&self.codeword_syms, &mut syms_de)?;
        self.interleaver.deinterleave(&self.codeword_amps, &mut amps_de)?;
        self.interleaver_sync(&syms_de, &amps_de)?;
        let frame_sync = self.ofdm.frame_sync();
        if frame_sync.interleaver_state() == SyncState::Synced
            && frame_sync.frame_count_interleaver() == self.config.interleave_frames
        {
            self.ofdm.frame_sync_mut().reset_frame_count_interleaver();
            return Ok(Some(self.decode_window(syms_de, &amps_de)?));
        }
        Ok(None)
    }

    /// Attempts interleaver sync by decoding the first codeword of the de-interleaved window.
    ///
    /// The frame being processed is not yet counted by frame sync, so the window is full once
    /// `frame_count() + 1` frames have been demodulated.
    fn interleaver_sync(&mut self, syms_de: &[Complex64], amps_de: &[f64]) -> Result<(), Error> {
        let frames = self.config.interleave_frames;
        let frame_sync = self.ofdm.frame_sync();
        if frame_sync.interleaver_state() != SyncState::Search
            || frame_sync.frame_count() + 1 < frames
        {
            return Ok(());
        }
        let coded_syms = self.code.coded_syms_per_frame();
        let output = self.decode_codeword(&syms_de[.. coded_syms], &amps_de[.. coded_syms])?;
        let num_errors = self
            .code
            .data_bits_per_frame()
            .saturating_sub(output.parity_checks_passed);
        debug!(
            "Interleaver sync attempt: {} iterations, {} parity checks passed",
            output.iterations, output.parity_checks_passed
        );
        if num_errors == 0 || frames == 1 {
            self.ofdm.frame_sync_mut().set_interleaver_synced(frames);
        }
        Ok(())
    }

    /// Decodes every codeword of a de-interleaved window.
    fn decode_window(
        &self,
        syms_de: Vec<Complex64>,
        amps_de: &[f64],
    ) -> Result<DecodedWindow, Error> {
        let coded_syms = self.code.coded_syms_per_frame();
        let num_data_bits = self.code.data_bits_per_frame();
        let mut data_bits = Vec::with_capacity(self.data_bits_per_window());
        let mut iterations = Vec::with_capacity(self.config.interleave_frames);
        let mut parity_checks_passed = Vec::with_capacity(self.config.interleave_frames);
        for (syms, amps) in syms_de.chunks_exact(coded_syms).zip(amps_de.chunks_exact(coded_syms)) {
            let output = self.decode_codeword(syms, amps)?;
            data_bits.extend_from_slice(output.data_bits(num_data_bits));
            iterations.push(output.iterations);
            parity_checks_passed.push(output.parity_checks_passed);
        }
        let coded_errors_est = parity_checks_passed
            .iter()
            .map(|&pcc| num_data_bits.saturating_sub(pcc))
            .sum();
        info!(
            "Decoded window: iterations {iterations:?}, parity checks passed \
            {parity_checks_passed:?}"
        );
        Ok(DecodedWindow {
            data_bits,
            iterations,
            parity_checks_passed,
            coded_errors_est,
            codeword_syms: syms_de,
        })
    }

    /// Decodes one codeword from its symbols and amplitude estimates.
    fn decode_codeword(
        &self,
        syms: &[Complex64],
        amps: &[f64],
    ) -> Result<DecoderOutput, Error> {
        let llrs = llr::symbols_to_llrs(syms, amps, self.config.es_no, self.ofdm.mean_amp())?;
        self.code.decode(&llrs, self.config.max_iter)
    }
}

#[cfg(test)]
mod tests_of_link {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn txt_bits(link: &LdpcOfdmLink) -> Vec<Bit> {
        [Bit::One, Bit::Zero]
            .iter()
            .copied()
            .cycle()
            .take(link.txt_bits_per_window())
            .collect()
    }

    /// Transmits `num_windows` windows of random data, returning the samples and the data.
    fn transmit(link: &mut LdpcOfdmLink, num_windows: usize) -> (Vec<Complex64>, Vec<Vec<Bit>>) {
        let mut rng = StdRng::seed_from_u64(11);
        let txt = txt_bits(link);
        let mut samples = Vec::new();
        let mut all_data = Vec::new();
        for _ in 0 .. num_windows {
            let data = utils::random_bits_with_rng(link.data_bits_per_window(), &mut rng);
            samples.extend(link.tx(&data, &txt).unwrap());
            all_data.push(data);
        }
        (samples, all_data)
    }

    /// Receives `samples`, returning all decoded windows.
    fn receive(link: &mut LdpcOfdmLink, samples: &[Complex64]) -> Vec<DecodedWindow> {
        let mut windows = Vec::new();
        let mut pos = 0;
        while pos + link.nin() <= samples.len() {
            let nin = link.nin();
            let output = link.rx(&samples[pos .. pos + nin]).unwrap();
            pos += nin;
            if let Some(txt) = &output.txt_bits {
                assert_eq!(*txt, [Bit::One, Bit::Zero, Bit::One, Bit::Zero]);
                assert_eq!(output.uw_errors, Some(0));
            }
            windows.extend(output.window);
        }
        windows
    }

    /// Checks that decoded windows are consecutive transmitted windows.
    fn check_windows(windows: &[DecodedWindow], all_data: &[Vec<Bit>], min_windows: usize) {
        assert!(windows.len() >= min_windows);
        let first = all_data
            .iter()
            .position(|data| *data == windows[0].data_bits)
            .unwrap();
        for (k, window) in windows.iter().enumerate() {
            assert_eq!(window.data_bits, all_data[first + k]);
            assert_eq!(window.coded_errors_est, 0);
            assert!(window.parity_checks_passed.iter().all(|&pcc| pcc == 112));
            assert!(window.iterations.iter().all(|&iter| iter == 1));
        }
    }

    /// Receives `samples` until the first decoded window, returning the number of frames
    /// demodulated so far and the window.
    fn receive_first_window(
        link: &mut LdpcOfdmLink,
        samples: &[Complex64],
    ) -> (usize, DecodedWindow) {
        let mut num_demods = 0;
        let mut pos = 0;
        while pos + link.nin() <= samples.len() {
            let nin = link.nin();
            let output = link.rx(&samples[pos .. pos + nin]).unwrap();
            pos += nin;
            if output.txt_bits.is_some() {
                num_demods += 1;
            }
            if let Some(window) = output.window {
                return (num_demods, window);
            }
        }
        panic!("No window decoded");
    }

    #[test]
    fn test_link_config() {
        assert!(LinkConfig::default().validate().is_ok());
        for interleave_frames in [1, 2, 4, 8, 16, 32] {
            let config = LinkConfig {
                interleave_frames,
                ..LinkConfig::default()
            };
            assert!(config.validate().is_ok());
        }
        let config = LinkConfig {
            interleave_frames: 3,
            ..LinkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::UnsupportedInterleaverLength(336))
        ));
        let config = LinkConfig {
            interleave_frames: 0,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
        let config = LinkConfig {
            max_iter: 0,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
        let config = LinkConfig {
            es_no: 0.0,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_new() {
        // 16 carriers leave 105 payload symbols per frame
        let ofdm_config = OfdmConfig {
            num_carriers: 16,
            ..OfdmConfig::default()
        };
        assert!(LdpcOfdmLink::new(ofdm_config, LinkConfig::default()).is_err());
        let link_config = LinkConfig {
            interleave_frames: 5,
            ..LinkConfig::default()
        };
        assert!(LdpcOfdmLink::new(OfdmConfig::default(), link_config).is_err());
        let link_config = LinkConfig {
            interleave_frames: 4,
            ..LinkConfig::default()
        };
        let link = LdpcOfdmLink::new(OfdmConfig::default(), link_config).unwrap();
        assert_eq!(link.data_bits_per_window(), 448);
        assert_eq!(link.txt_bits_per_window(), 16);
        assert_eq!(link.test_window_bits().len(), 448);
        assert_eq!(link.nin(), 1280);
        let copy = link.clone();
        assert_eq!(copy.data_bits_per_window(), 448);
    }

    #[test]
    fn test_tx() {
        let mut link = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let txt = txt_bits(&link);
        assert!(link.tx(&[Bit::Zero; 111], &txt).is_err());
        assert!(link.tx(&[Bit::Zero; 112], &txt[1 ..]).is_err());
        let samples = link.tx(&link.test_window_bits(), &txt).unwrap();
        assert_eq!(samples.len(), 1280);
    }

    #[test]
    fn test_rx_nin_contract() {
        let mut link = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        assert!(link.rx(&vec![Complex64::new(0.0, 0.0); 1279]).is_err());
        let output = link.rx(&vec![Complex64::new(0.0, 0.0); 1280]).unwrap();
        assert_eq!(output.sync_state, SyncState::Search);
        assert_eq!(output.interleaver_state, SyncState::Search);
        assert!(output.window.is_none() && output.txt_bits.is_none());
    }

    #[test]
    fn test_round_trip_one_frame_per_window() {
        let mut tx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let (samples, all_data) = transmit(&mut tx, 12);
        let windows = receive(&mut rx, &samples);
        check_windows(&windows, &all_data, 8);
        assert_eq!(rx.ofdm().sync_state(), SyncState::Synced);
        assert_eq!(rx.ofdm().frame_sync().interleaver_state(), SyncState::Synced);
    }

    #[test]
    fn test_round_trip_two_frames_per_window() {
        let config = LinkConfig {
            interleave_frames: 2,
            ..LinkConfig::default()
        };
        let mut tx = LdpcOfdmLink::new(OfdmConfig::default(), config).unwrap();
        let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), config).unwrap();
        let (samples, all_data) = transmit(&mut tx, 6);
        let windows = receive(&mut rx, &samples);
        check_windows(&windows, &all_data, 3);
        assert_eq!(rx.ofdm().frame_sync().interleaver_state(), SyncState::Synced);
    }

    #[test]
    fn test_first_window_one_frame_per_window() {
        let mut tx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let (samples, all_data) = transmit(&mut tx, 4);
        // Acquisition consumes frame 0, so the first demodulated frame is frame 1
        let (num_demods, window) = receive_first_window(&mut rx, &samples);
        assert_eq!(num_demods, 1);
        assert_eq!(window.data_bits, all_data[1]);
    }

    #[test]
    fn test_first_window_two_frames_per_window() {
        let config = LinkConfig {
            interleave_frames: 2,
            ..LinkConfig::default()
        };
        let mut tx = LdpcOfdmLink::new(OfdmConfig::default(), config).unwrap();
        let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), config).unwrap();
        let (samples, all_data) = transmit(&mut tx, 4);
        // Starting one frame in puts the first demodulated frame at the start of window 1
        let spf = tx.ofdm().samples_per_frame();
        let (num_demods, window) = receive_first_window(&mut rx, &samples[spf ..]);
        assert_eq!(num_demods, 2);
        assert_eq!(window.data_bits, all_data[1]);
        assert_eq!(rx.ofdm().frame_sync().interleaver_state(), SyncState::Synced);
    }

    #[test]
    fn test_rx_undecodable_window() {
        let mut link = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        link.ofdm_mut().frame_sync_mut().step(true, 0);
        assert_eq!(link.ofdm().sync_state(), SyncState::Trial);
        // Silence leaves the mean amplitude at zero, so no LLRs can be computed
        let nin = link.nin();
        let output = link.rx(&vec![Complex64::new(0.0, 0.0); nin]).unwrap();
        assert!(output.txt_bits.is_some());
        assert!(output.window.is_none());
        assert_eq!(output.interleaver_state, SyncState::Search);
        assert_eq!(link.ofdm().frame_sync().frame_count_interleaver(), 1);
        let nin = link.nin();
        assert!(link.rx(&vec![Complex64::new(0.0, 0.0); nin]).is_ok());
    }

    #[test]
    fn test_count_uncoded_errors() {
        let mut link = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let codeword = link.code().encode(&link.test_window_bits()).unwrap();
        let mut syms = qpsk::modulate(&codeword).unwrap();
        assert_eq!(link.count_uncoded_errors(&syms).unwrap(), 0);
        syms[0] = -syms[0];
        syms[5] = syms[5] * Complex64::new(0.0, 1.0);
        assert_eq!(link.count_uncoded_errors(&syms).unwrap(), 3);
        assert!(link.count_uncoded_errors(&syms[1 ..]).is_err());
        // Test frames through the link carry no uncoded errors
        let txt = txt_bits(&link);
        let data = link.test_window_bits();
        let mut samples = Vec::new();
        for _ in 0 .. 6 {
            samples.extend(link.tx(&data, &txt).unwrap());
        }
        let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default()).unwrap();
        let windows = receive(&mut rx, &samples);
        assert!(!windows.is_empty());
        for window in &windows {
            assert_eq!(rx.count_uncoded_errors(&window.codeword_syms).unwrap(), 0);
            assert_eq!(window.data_bits, data);
        }
    }
}
