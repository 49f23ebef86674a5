//! Layout of the data symbols in one modem frame
//!
//! A modem frame carries `(Ns - 1) * Nc` QPSK symbols in row-major order. Unique-word (UW) symbols
//! sit at `floor((i + 1) * (Nc + 1) / 2)` for `i` in `[0, nuwbits / 2)`, so they are spread over
//! the data rows. The text symbols fill the end of the frame, and payload symbols fill every
//! remaining position in order.

use num_complex::Complex64;

use crate::{qpsk, Bit, Error};

/// Bits per QPSK symbol
const BPS: usize = 2;

/// Frame split into its fields at the receiver
#[derive(Clone, PartialEq, Debug)]
pub struct DisassembledFrame {
    /// Hard decisions on the UW bits
    pub rx_uw: Vec<Bit>,
    /// Payload symbols, phase-corrected
    pub payload_syms: Vec<Complex64>,
    /// Amplitude estimates of the payload symbols
    pub payload_amps: Vec<f64>,
    /// Hard decisions on the text bits
    pub txt_bits: Vec<Bit>,
}

/// Positions of the UW, payload and text fields in a modem frame
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FrameLayout {
    /// Number of QPSK symbols per frame
    syms_per_frame: usize,
    /// Symbol indices of the UW, in increasing order
    uw_sym_indices: Vec<usize>,
    /// Number of text symbols at the end of the frame
    num_txt_syms: usize,
    /// Transmitted UW bits
    tx_uw: Vec<Bit>,
}

impl FrameLayout {
    /// Returns frame layout for given frame dimensions.
    ///
    /// # Parameters
    ///
    /// - `num_carriers`: Number of data carriers `Nc`.
    ///
    /// - `num_data_rows`: Number of data rows `Ns - 1`.
    ///
    /// - `num_txt_bits`: Number of text bits at the end of the frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_txt_bits` is odd, if fewer than two UW bits remain, or if the UW
    /// would overlap the text symbols.
    pub fn new(
        num_carriers: usize,
        num_data_rows: usize,
        num_txt_bits: usize,
    ) -> Result<Self, Error> {
        if num_txt_bits % BPS != 0 {
            return Err(Error::InvalidConfig(format!(
                "Number of text bits ({num_txt_bits}) must be a multiple of {BPS}"
            )));
        }
        let uw_and_txt_bits = num_data_rows * BPS;
        if uw_and_txt_bits < num_txt_bits + BPS {
            return Err(Error::InvalidConfig(format!(
                "{num_data_rows} data rows leave no room for a unique word after {num_txt_bits} \
                text bits"
            )));
        }
        let num_uw_syms = (uw_and_txt_bits - num_txt_bits) / BPS;
        let syms_per_frame = num_data_rows * num_carriers;
        let num_txt_syms = num_txt_bits / BPS;
        let uw_sym_indices: Vec<usize> = (0 .. num_uw_syms)
            .map(|i| (i + 1) * (num_carriers + 1) / 2)
            .collect();
        if uw_sym_indices
            .last()
            .is_some_and(|&idx| idx + num_txt_syms >= syms_per_frame)
        {
            return Err(Error::InvalidConfig(format!(
                "Unique word symbols {uw_sym_indices:?} overlap the {num_txt_syms} text symbols \
                of a {syms_per_frame}-symbol frame"
            )));
        }
        Ok(Self {
            syms_per_frame,
            tx_uw: vec![Bit::Zero; num_uw_syms * BPS],
            uw_sym_indices,
            num_txt_syms,
        })
    }

    /// Returns number of bits per frame.
    #[must_use]
    pub fn bits_per_frame(&self) -> usize {
        self.syms_per_frame * BPS
    }

    /// Returns number of QPSK symbols per frame.
    #[must_use]
    pub fn syms_per_frame(&self) -> usize {
        self.syms_per_frame
    }

    /// Returns number of UW bits per frame.
    #[must_use]
    pub fn num_uw_bits(&self) -> usize {
        self.tx_uw.len()
    }

    /// Returns number of text bits per frame.
    #[must_use]
    pub fn num_txt_bits(&self) -> usize {
        self.num_txt_syms * BPS
    }

    /// Returns number of payload bits per frame.
    #[must_use]
    pub fn num_payload_bits(&self) -> usize {
        self.num_payload_syms() * BPS
    }

    /// Returns number of payload symbols per frame.
    #[must_use]
    pub fn num_payload_syms(&self) -> usize {
        self.syms_per_frame - self.uw_sym_indices.len() - self.num_txt_syms
    }

    /// Returns symbol indices of the UW.
    #[must_use]
    pub fn uw_sym_indices(&self) -> &[usize] {
        &self.uw_sym_indices
    }

    /// Returns transmitted UW bits.
    #[must_use]
    pub fn tx_uw(&self) -> &[Bit] {
        &self.tx_uw
    }

    /// Returns frame bits built from payload bits and text bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of payload or text bits is wrong.
    pub fn assemble_bits(
        &self,
        payload_bits: &[Bit],
        txt_bits: &[Bit],
    ) -> Result<Vec<Bit>, Error> {
        self.check_len("payload bits", payload_bits.len(), self.num_payload_bits())?;
        self.check_len("text bits", txt_bits.len(), self.num_txt_bits())?;
        let mut payload_pairs = payload_bits.chunks_exact(BPS);
        let mut uw_pairs = self.tx_uw.chunks_exact(BPS);
        let mut frame_bits = Vec::with_capacity(self.bits_per_frame());
        for is_uw in self.uw_mask() {
            let pair = if is_uw {
                uw_pairs.next()
            } else {
                payload_pairs.next()
            };
            frame_bits.extend_from_slice(pair.unwrap_or_default());
        }
        frame_bits.extend_from_slice(txt_bits);
        Ok(frame_bits)
    }

    /// Returns frame symbols built from payload symbols and text bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of payload symbols or text bits is wrong.
    pub fn assemble_syms(
        &self,
        payload_syms: &[Complex64],
        txt_bits: &[Bit],
    ) -> Result<Vec<Complex64>, Error> {
        self.check_len("payload symbols", payload_syms.len(), self.num_payload_syms())?;
        self.check_len("text bits", txt_bits.len(), self.num_txt_bits())?;
        let mut uw_syms = qpsk::modulate(&self.tx_uw)?.into_iter();
        let mut payload_syms = payload_syms.iter().copied();
        let mut frame_syms: Vec<Complex64> = self
            .uw_mask()
            .into_iter()
            .filter_map(|is_uw| {
                if is_uw {
                    uw_syms.next()
                } else {
                    payload_syms.next()
                }
            })
            .collect();
        frame_syms.extend(qpsk::modulate(txt_bits)?);
        Ok(frame_syms)
    }

    /// Returns UW bits extracted from the bits of a demodulated frame.
    ///
    /// # Errors
    ///
    /// Returns an error if `frame_bits.len()` is not the number of bits per frame.
    pub fn extract_uw(&self, frame_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        self.check_len("frame bits", frame_bits.len(), self.bits_per_frame())?;
        Ok(self
            .uw_sym_indices
            .iter()
            .flat_map(|&s| frame_bits[BPS * s .. BPS * (s + 1)].iter().copied())
            .collect())
    }

    /// Returns number of UW bit errors.
    #[must_use]
    pub fn uw_errors(&self, rx_uw: &[Bit]) -> usize {
        rx_uw
            .iter()
            .zip(&self.tx_uw)
            .filter(|&(rx, tx)| rx != tx)
            .count()
    }

    /// Splits the demodulated symbols of a frame into its fields.
    ///
    /// # Errors
    ///
    /// Returns an error if either input does not hold one value per frame symbol.
    pub fn disassemble(
        &self,
        rx_syms: &[Complex64],
        rx_amps: &[f64],
    ) -> Result<DisassembledFrame, Error> {
        self.check_len("received symbols", rx_syms.len(), self.syms_per_frame)?;
        self.check_len("received amplitudes", rx_amps.len(), self.syms_per_frame)?;
        let num_coded_syms = self.syms_per_frame - self.num_txt_syms;
        let mut rx_uw = Vec::with_capacity(self.num_uw_bits());
        let mut payload_syms = Vec::with_capacity(self.num_payload_syms());
        let mut payload_amps = Vec::with_capacity(self.num_payload_syms());
        for ((&sym, &amp), is_uw) in rx_syms.iter().zip(rx_amps).zip(self.uw_mask()) {
            if is_uw {
                let (b0, b1) = qpsk::demodulate_pair(sym);
                rx_uw.extend([b0, b1]);
            } else {
                payload_syms.push(sym);
                payload_amps.push(amp);
            }
        }
        Ok(DisassembledFrame {
            rx_uw,
            payload_syms,
            payload_amps,
            txt_bits: qpsk::demodulate(&rx_syms[num_coded_syms ..]),
        })
    }

    /// Returns, for each non-text symbol position, whether it holds a UW symbol.
    fn uw_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.syms_per_frame - self.num_txt_syms];
        for &s in &self.uw_sym_indices {
            mask[s] = true;
        }
        mask
    }

    /// Checks length of a frame field.
    fn check_len(&self, what: &str, found: usize, expected: usize) -> Result<(), Error> {
        if found == expected {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Expected {expected} {what} per frame (found {found})"
            )))
        }
    }
}
