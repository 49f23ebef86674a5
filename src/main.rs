//! This crate simulates the BER-versus-SNR and FER-versus-SNR performance of the LDPC-coded,
//! Golden-Prime-interleaved OFDM modem over a complex AWGN channel with an optional frequency
//! offset. Simulation parameters are specified on the command line, and simulation results are
//! saved to a JSON file.
//!
//! Build the executable with `cargo build --release` and then run `./target/release/qofdm -h` for
//! help on the command-line interface. Set `RUST_LOG` to control log output (default `info`).

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

use anyhow::Result;
use clap::parser::ValueSource;
use clap::{crate_name, crate_version, value_parser, Arg, ArgMatches, Command};
use qofdm::sim;
use std::env;
use std::time::Instant;

/// Main function
fn main() -> Result<()> {
    let timer = Instant::now();
    initialise_logging();
    let mut rng = rand::rng();
    let matches = command_line_parser().get_matches();
    let json_filename = &json_filename_from_matches(&matches);
    sim::run_awgn_sims(&all_sim_params(&matches), &mut rng, json_filename)?;
    eprintln!("Elapsed time: {:.3?}", timer.elapsed());
    Ok(())
}

/// Initialises logging, showing `info` and above unless `RUST_LOG` says otherwise.
fn initialise_logging() {
    let log_var_name = "RUST_LOG";
    if env::var(log_var_name).is_err() {
        env::set_var(log_var_name, "info");
    }
    env_logger::init();
}

/// Returns command line parser.
fn command_line_parser() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Evaluates the performance of the LDPC-coded OFDM modem over a complex AWGN channel")
        .arg(interleave_frames())
        .arg(max_iter())
        .arg(first_snr_db())
        .arg(snr_step_db())
        .arg(num_snr())
        .arg(foff_hz())
        .arg(num_codeword_errors_min())
        .arg(num_windows_per_run())
        .arg(num_runs_min())
        .arg(num_runs_max())
        .arg(json_filename())
}

/// Returns argument for number of frames per interleaver window.
fn interleave_frames() -> Arg {
    Arg::new("interleave_frames")
        .short('i')
        .value_parser(value_parser!(usize))
        .default_value("1")
        .help("Number of frames per interleaver window")
}

/// Returns argument for maximum number of LDPC decoder iterations.
fn max_iter() -> Arg {
    Arg::new("max_iter")
        .short('t')
        .value_parser(value_parser!(usize))
        .default_value("100")
        .help("Maximum number of LDPC decoder iterations")
}

/// Returns argument for first Es/N0 (dB).
fn first_snr_db() -> Arg {
    Arg::new("first_snr_db")
        .short('r')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("0.0")
        .help("First Es/N0 (dB)")
}

/// Returns argument for Es/N0 step (dB).
fn snr_step_db() -> Arg {
    Arg::new("snr_step_db")
        .short('p')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("1.0")
        .help("Es/N0 step (dB)")
}

/// Returns argument for number of Es/N0 values.
fn num_snr() -> Arg {
    Arg::new("num_snr")
        .short('s')
        .value_parser(value_parser!(u32))
        .default_value("6")
        .help("Number of Es/N0 values")
}

/// Returns argument for channel frequency offset (Hz).
fn foff_hz() -> Arg {
    Arg::new("foff_hz")
        .short('o')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("0.0")
        .help("Channel frequency offset (Hz)")
}

/// Returns argument for desired minimum number of codeword errors.
fn num_codeword_errors_min() -> Arg {
    Arg::new("num_codeword_errors_min")
        .short('e')
        .value_parser(value_parser!(u32))
        .default_value("100")
        .help("Desired minimum number of codeword errors")
}

/// Returns argument for number of interleaver windows to be transmitted per run.
fn num_windows_per_run() -> Arg {
    Arg::new("num_windows_per_run")
        .short('b')
        .value_parser(value_parser!(u32))
        .default_value("50")
        .help("Number of interleaver windows to be transmitted per run")
}

/// Returns argument for minimum number of runs to be simulated.
fn num_runs_min() -> Arg {
    Arg::new("num_runs_min")
        .short('n')
        .value_parser(value_parser!(u32))
        .default_value("4")
        .help("Minimum number of runs to be simulated")
}

/// Returns argument for maximum number of runs to be simulated.
fn num_runs_max() -> Arg {
    Arg::new("num_runs_max")
        .short('x')
        .value_parser(value_parser!(u32))
        .default_value("40")
        .help("Maximum number of runs to be simulated")
}

/// Returns argument for name of JSON file to which results must be saved.
fn json_filename() -> Arg {
    Arg::new("json_filename")
        .short('f')
        .default_value("results.json")
        .help("Name of JSON file to which results must be saved")
}

/// Returns simulation parameters based on command-line arguments.
fn all_sim_params(matches: &ArgMatches) -> Vec<sim::SimParams> {
    let mut num_runs_min = num_runs_min_from_matches(matches);
    let mut num_runs_max = num_runs_max_from_matches(matches);
    if num_runs_min > num_runs_max {
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_min") {
            num_runs_min = num_runs_max;
        }
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_max") {
            num_runs_max = num_runs_min;
        }
    }
    // Every argument has a default value of its parsed type, so the getters below cannot fail
    all_es_over_n0_db_from_matches(matches)
        .into_iter()
        .map(|es_over_n0_db| sim::SimParams {
            interleave_frames: interleave_frames_from_matches(matches),
            max_iter: max_iter_from_matches(matches),
            es_over_n0_db,
            foff_hz: foff_hz_from_matches(matches),
            num_codeword_errors_min: num_codeword_errors_min_from_matches(matches),
            num_windows_per_run: num_windows_per_run_from_matches(matches),
            num_runs_min,
            num_runs_max,
        })
        .collect()
}

/// Returns number of frames per interleaver window.
fn interleave_frames_from_matches(matches: &ArgMatches) -> usize {
    *matches.get_one("interleave_frames").unwrap()
}

/// Returns maximum number of LDPC decoder iterations.
fn max_iter_from_matches(matches: &ArgMatches) -> usize {
    *matches.get_one("max_iter").unwrap()
}

/// Returns all Es/N0 (dB) values.
fn all_es_over_n0_db_from_matches(matches: &ArgMatches) -> Vec<f64> {
    let first_snr_db: f64 = *matches.get_one("first_snr_db").unwrap();
    let snr_step_db: f64 = *matches.get_one("snr_step_db").unwrap();
    let num_snr: u32 = *matches.get_one("num_snr").unwrap();
    (0 .. num_snr)
        .map(|n| first_snr_db + snr_step_db * f64::from(n))
        .collect()
}

/// Returns channel frequency offset (Hz).
fn foff_hz_from_matches(matches: &ArgMatches) -> f64 {
    *matches.get_one("foff_hz").unwrap()
}

/// Returns desired minimum number of codeword errors.
fn num_codeword_errors_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_codeword_errors_min").unwrap()
}

/// Returns number of interleaver windows to be transmitted per run.
fn num_windows_per_run_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_windows_per_run").unwrap()
}

/// Returns minimum number of runs to be simulated.
fn num_runs_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_min").unwrap()
}

/// Returns maximum number of runs to be simulated.
fn num_runs_max_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_max").unwrap()
}

/// Returns name of JSON file to which simulation results must be saved.
fn json_filename_from_matches(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("json_filename")
        .unwrap()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_line_for_test() -> Vec<&'static str> {
        vec![
            crate_name!(),
            "-i",
            "2",
            "-t",
            "50",
            "-r",
            "-1.0",
            "-p",
            "0.5",
            "-s",
            "5",
            "-o",
            "-7.5",
            "-e",
            "20",
            "-b",
            "30",
            "-n",
            "2",
            "-x",
            "8",
            "-f",
            "results.json",
        ]
    }

    #[test]
    fn test_command_line_parser() {
        assert!(command_line_parser()
            .try_get_matches_from(command_line_for_test())
            .is_ok());
        assert!(command_line_parser()
            .try_get_matches_from([crate_name!(), "-i", "two"])
            .is_err());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_all_sim_params() {
        let matches = command_line_parser().get_matches_from(command_line_for_test());
        let all_params = all_sim_params(&matches);
        let all_es_over_n0_db = [-1.0, -0.5, 0.0, 0.5, 1.0];
        assert_eq!(all_params.len(), 5);
        for (idx, &params) in all_params.iter().enumerate() {
            assert_eq!(params.interleave_frames, 2);
            assert_eq!(params.max_iter, 50);
            assert_eq!(params.es_over_n0_db, all_es_over_n0_db[idx]);
            assert_eq!(params.foff_hz, -7.5);
            assert_eq!(params.num_codeword_errors_min, 20);
            assert_eq!(params.num_windows_per_run, 30);
            assert_eq!(params.num_runs_min, 2);
            assert_eq!(params.num_runs_max, 8);
        }
        assert_eq!(json_filename_from_matches(&matches), "results.json");
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_all_sim_params_defaults() {
        let matches = command_line_parser().get_matches_from([crate_name!()]);
        let all_params = all_sim_params(&matches);
        assert_eq!(all_params.len(), 6);
        for (idx, &params) in all_params.iter().enumerate() {
            assert_eq!(params.interleave_frames, 1);
            assert_eq!(params.max_iter, 100);
            assert_eq!(params.es_over_n0_db, f64::from(u32::try_from(idx).unwrap()));
            assert_eq!(params.foff_hz, 0.0);
            assert_eq!(params.num_codeword_errors_min, 100);
            assert_eq!(params.num_windows_per_run, 50);
            assert_eq!(params.num_runs_min, 4);
            assert_eq!(params.num_runs_max, 40);
        }
        assert_eq!(json_filename_from_matches(&matches), "results.json");
    }

    #[test]
    fn test_all_sim_params_run_limits() {
        // A default limit gives way to an explicit one
        let matches = command_line_parser().get_matches_from([crate_name!(), "-x", "2"]);
        let all_params = all_sim_params(&matches);
        assert_eq!(all_params.len(), 6);
        assert!(all_params
            .iter()
            .all(|params| params.num_runs_min == 2 && params.num_runs_max == 2));
        let matches = command_line_parser().get_matches_from([crate_name!(), "-n", "50"]);
        assert!(all_sim_params(&matches)
            .iter()
            .all(|params| params.num_runs_min == 50 && params.num_runs_max == 50));
    }
}
