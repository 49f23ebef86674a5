//! Simulator to evaluate performance of the LDPC-coded OFDM link over a complex AWGN channel
//!
//! Every run transmits a burst of test-frame windows through a fresh transmit and receive session,
//! with an optional fixed frequency offset and complex white Gaussian noise. Decoded windows are
//! compared against the test frame. Es/N0 is the ratio of energy per QPSK data symbol to noise
//! power spectral density, measured at the demodulator output.

use std::fs::File;

use itertools::Itertools;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::link::{LdpcOfdmLink, LinkConfig};
use crate::ofdm::OfdmConfig;
use crate::{utils, Bit, Error};

/// Parameters for LDPC-coded OFDM simulation over complex AWGN channel
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct SimParams {
    /// Number of frames spanned by one interleaver window
    pub interleave_frames: usize,
    /// Maximum number of LDPC decoder iterations
    pub max_iter: usize,
    /// Ratio (dB) of energy per data symbol to noise power spectral density
    pub es_over_n0_db: f64,
    /// Frequency offset (Hz) applied by the channel
    pub foff_hz: f64,
    /// Desired minimum number of codeword errors
    pub num_codeword_errors_min: u32,
    /// Number of interleaver windows to be transmitted per run
    pub num_windows_per_run: u32,
    /// Minimum number of runs to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs to be simulated
    pub num_runs_max: u32,
}

/// Results from LDPC-coded OFDM simulation over complex AWGN channel
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of runs simulated
    pub num_runs: u32,
    /// Number of interleaver windows transmitted
    pub num_windows_sent: u32,
    /// Number of codewords decoded
    pub num_codewords: u32,
    /// Number of decoded codewords with data bit errors
    pub num_codeword_errors: u32,
    /// Number of data bits decoded
    pub num_data_bits: u32,
    /// Number of data bit errors after decoding
    pub num_data_bit_errors: u32,
    /// Number of coded bits demodulated in decoded windows
    pub num_coded_bits: u32,
    /// Number of coded bit errors before decoding
    pub num_uncoded_bit_errors: u32,
}

impl SimResults {
    /// Returns initialized simulation results.
    #[must_use]
    pub fn new(params: &SimParams) -> Self {
        Self {
            params: *params,
            num_runs: 0,
            num_windows_sent: 0,
            num_codewords: 0,
            num_codeword_errors: 0,
            num_data_bits: 0,
            num_data_bit_errors: 0,
            num_coded_bits: 0,
            num_uncoded_bit_errors: 0,
        }
    }

    /// Returns bit error rate after decoding (zero if nothing was decoded).
    #[must_use]
    pub fn ber(&self) -> f64 {
        ratio(self.num_data_bit_errors, self.num_data_bits)
    }

    /// Returns codeword error rate (zero if nothing was decoded).
    #[must_use]
    pub fn fer(&self) -> f64 {
        ratio(self.num_codeword_errors, self.num_codewords)
    }

    /// Returns bit error rate before decoding (zero if nothing was decoded).
    #[must_use]
    pub fn uncoded_ber(&self) -> f64 {
        ratio(self.num_uncoded_bit_errors, self.num_coded_bits)
    }

    /// Returns `true` if the simulation can stop.
    #[must_use]
    pub fn run_complete(&self) -> bool {
        self.num_runs >= self.params.num_runs_max
            || (self.num_runs >= self.params.num_runs_min
                && self.num_codeword_errors >= self.params.num_codeword_errors_min)
    }

    /// Updates results with the outcome of one codeword.
    fn update_after_codeword(&mut self, num_data_bits: usize, num_data_bit_errors: usize) {
        self.num_codewords += 1;
        self.num_data_bits += to_u32(num_data_bits);
        self.num_data_bit_errors += to_u32(num_data_bit_errors);
        if num_data_bit_errors > 0 {
            self.num_codeword_errors += 1;
        }
    }
}

/// Runs simulations in parallel and saves results to a JSON file.
///
/// # Parameters
///
/// - `all_params`: Parameters for each simulation scenario of interest.
///
/// - `rng`: Random number generator from which each scenario's generator is seeded.
///
/// - `json_filename`: Name of JSON file to which all simulation results must be saved.
///
/// # Errors
///
/// Returns an error if any parameters are invalid, if a simulation fails, or if the results
/// cannot be saved.
pub fn run_awgn_sims<R: Rng>(
    all_params: &[SimParams],
    rng: &mut R,
    json_filename: &str,
) -> Result<(), Error> {
    for params in all_params {
        check_sim_params(params)?;
    }
    let seeds: Vec<u64> = all_params.iter().map(|_| rng.random()).collect();
    let all_results = all_params
        .par_iter()
        .zip(seeds)
        .map(|(params, seed)| run_awgn_sim(params, seed))
        .collect::<Result<Vec<SimResults>, Error>>()?;
    save_all_results(&all_results, json_filename)?;
    Ok(())
}

/// Runs one simulation scenario.
///
/// # Parameters
///
/// - `params`: Simulation parameters.
///
/// - `seed`: Seed of the noise generator.
///
/// # Errors
///
/// Returns an error if `params` is invalid.
pub fn run_awgn_sim(params: &SimParams, seed: u64) -> Result<SimResults, Error> {
    check_sim_params(params)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut results = SimResults::new(params);
    while !results.run_complete() {
        simulate_run(params, &mut rng, &mut results)?;
    }
    info!(
        "{}",
        [
            format!("Es/N0 {:.2} dB", params.es_over_n0_db),
            format!("BER {:.3e}", results.ber()),
            format!("FER {:.3e}", results.fer()),
            format!("uncoded BER {:.3e}", results.uncoded_ber()),
            format!("{} codewords", results.num_codewords),
        ]
        .iter()
        .join(", ")
    );
    Ok(results)
}

/// Saves simulation results to a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_all_results(all_results: &[SimResults], json_filename: &str) -> Result<(), Error> {
    let writer = File::create(json_filename)?;
    serde_json::to_writer_pretty(writer, all_results)?;
    Ok(())
}

/// Returns noise variance per complex sample for a given Es/N0 (dB) per data symbol.
///
/// Symbols are recovered with unit amplitude by an unnormalized DFT over `samples_per_symbol`
/// samples, which scales the per-sample noise variance by `samples_per_symbol`.
#[must_use]
pub fn noise_var(es_over_n0_db: f64, samples_per_symbol: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let m = samples_per_symbol as f64;
    1.0 / (m * 10f64.powf(es_over_n0_db / 10.0))
}

/// Checks validity of simulation parameters.
fn check_sim_params(params: &SimParams) -> Result<(), Error> {
    link_config(params).validate()?;
    if !(params.es_over_n0_db.is_finite() && params.foff_hz.is_finite()) {
        return Err(Error::InvalidInput(
            "Es/N0 and frequency offset must be finite".to_string(),
        ));
    }
    if params.num_windows_per_run == 0 {
        return Err(Error::InvalidInput(
            "Number of windows per run cannot be zero".to_string(),
        ));
    }
    if params.num_runs_min > params.num_runs_max {
        return Err(Error::InvalidInput(format!(
            "Minimum number of runs ({}) exceeds maximum number of runs ({})",
            params.num_runs_min, params.num_runs_max
        )));
    }
    Ok(())
}

/// Returns link configuration for simulation parameters.
fn link_config(params: &SimParams) -> LinkConfig {
    LinkConfig {
        interleave_frames: params.interleave_frames,
        max_iter: params.max_iter,
        ..LinkConfig::default()
    }
}

/// Simulates one run, updating the results.
fn simulate_run<R: Rng>(
    params: &SimParams,
    rng: &mut R,
    results: &mut SimResults,
) -> Result<(), Error> {
    let ofdm_config = OfdmConfig::default();
    let mut tx = LdpcOfdmLink::new(ofdm_config, link_config(params))?;
    let mut rx = LdpcOfdmLink::new(ofdm_config, link_config(params))?;
    let data_bits = tx.test_window_bits();
    let txt_bits = vec![Bit::Zero; tx.txt_bits_per_window()];
    let mut samples = Vec::new();
    for _ in 0 .. params.num_windows_per_run {
        samples.extend(tx.tx(&data_bits, &txt_bits)?);
    }
    let samples = utils::frequency_offset(&samples, params.foff_hz, ofdm_config.sample_rate_hz);
    let samples = utils::awgn_channel(
        &samples,
        noise_var(params.es_over_n0_db, tx.ofdm().samples_per_symbol()),
        rng,
    );

    let num_data_bits = rx.code().data_bits_per_frame();
    let mut pos = 0;
    while pos + rx.nin() <= samples.len() {
        let nin = rx.nin();
        let output = rx.rx(&samples[pos .. pos + nin])?;
        pos += nin;
        if let Some(window) = output.window {
            for data in window.data_bits.chunks_exact(num_data_bits) {
                let num_errors = utils::error_count(data, &data_bits[.. num_data_bits]);
                results.update_after_codeword(num_data_bits, num_errors);
            }
            results.num_coded_bits += to_u32(2 * window.codeword_syms.len());
            results.num_uncoded_bit_errors +=
                to_u32(rx.count_uncoded_errors(&window.codeword_syms)?);
        }
    }
    results.num_runs += 1;
    results.num_windows_sent += params.num_windows_per_run;
    Ok(())
}

/// Returns `num / den` (zero if `den` is zero).
fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

/// Returns count as `u32`, saturating.
fn to_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
