//! This crate implements a pilot-assisted OFDM modem for narrowband (about 1 kHz wide) digital
//! voice links, together with the forward error correction that protects its payload. A frame of
//! the modem comprises one row of BPSK pilots followed by rows of QPSK data on a small number of
//! carriers, each row carrying a cyclic prefix. The receiver acquires timing and frequency from the
//! pilots, tracks them frame by frame, and confirms frame sync with a unique word (UW) spread
//! through the frame. The payload of each frame is one codeword of a rate-1/2 (224, 112)
//! high-rate-repeat-accumulate (HRA) LDPC code, decoded by sum-product message passing from
//! log-likelihood ratios. Codewords may be spread over several frames by a Golden-Prime
//! interleaver so that a burst of fading corrupts only part of each codeword.
//!
//! # Examples
//!
//! ```
//! use qofdm::{LdpcOfdmLink, LinkConfig, OfdmConfig};
//!
//! let mut tx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default())?;
//! let mut rx = LdpcOfdmLink::new(OfdmConfig::default(), LinkConfig::default())?;
//! let data_bits = tx.test_window_bits();
//! let txt_bits = [qofdm::Bit::Zero; 4];
//! let mut samples = Vec::new();
//! for _ in 0 .. 8 {
//!     samples.extend(tx.tx(&data_bits, &txt_bits)?);
//! }
//! let mut num_windows = 0;
//! let mut pos = 0;
//! while pos + rx.nin() <= samples.len() {
//!     let nin = rx.nin();
//!     if let Some(window) = rx.rx(&samples[pos .. pos + nin])?.window {
//!         assert_eq!(window.data_bits, data_bits);
//!         num_windows += 1;
//!     }
//!     pos += nin;
//! }
//! assert!(num_windows > 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

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

mod common;
mod sumproduct;

pub mod codes;
pub mod filter;
pub mod frame;
pub mod interleaver;
pub mod ldpc;
pub mod link;
pub mod llr;
pub mod ofdm;
pub mod qpsk;
pub mod sim;
pub mod sync;
pub mod utils;

pub use common::{Bit, Error};
pub use interleaver::Interleaver;
pub use ldpc::{DecoderOutput, LdpcCode};
pub use link::{LdpcOfdmLink, LinkConfig};
pub use ofdm::{Ofdm, OfdmConfig};
