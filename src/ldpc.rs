//! Systematic LDPC codes of the hybrid repeat-accumulate (HRA) family
//!
//! The parity-check matrix is `H = [A | T]`: `A` is a sparse matrix over the data bits, given as a
//! list of column indices per row, and `T` is the dual-diagonal accumulator over the parity bits.
//! Encoding is therefore a single pass over the rows, and decoding is sum-product message passing
//! over the graph of `H`.

use log::debug;

use crate::codes::{
    HRA_112_112_CODE_LENGTH, HRA_112_112_MAX_ITER, HRA_112_112_NUM_PARITY_BITS, HRA_112_112_ROWS,
};
use crate::sumproduct::{self, Graph};
use crate::{Bit, Error};

/// Number of code bits carried by one QPSK symbol
const BITS_PER_SYMBOL: usize = 2;

/// Result of a decode call
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DecoderOutput {
    /// Hard decisions on all code bits (data bits first)
    pub codeword: Vec<Bit>,
    /// Number of iterations actually run
    pub iterations: usize,
    /// Number of parity checks satisfied in the last iteration
    pub parity_checks_passed: usize,
}

impl DecoderOutput {
    /// Returns the leading `num_data_bits` decisions.
    #[must_use]
    pub fn data_bits(&self, num_data_bits: usize) -> &[Bit] {
        &self.codeword[.. num_data_bits.min(self.codeword.len())]
    }
}

/// Descriptor of an HRA LDPC code
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LdpcCode {
    /// Number of code bits
    code_length: usize,
    /// Number of parity bits (and parity checks)
    num_parity_bits: usize,
    /// Default maximum number of decoder iterations
    max_iter: usize,
    /// Data-bit column indices of each row of `A`
    h_rows: Vec<Vec<usize>>,
    /// Row indices of each data-bit column of `A`
    h_cols: Vec<Vec<usize>>,
    /// Decode graph of the full parity-check matrix
    graph: Graph,
}

impl LdpcCode {
    /// Returns the rate-1/2 HRA (112, 112) code used by the OFDM link.
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::LdpcCode;
    ///
    /// let code = LdpcCode::hra_112_112();
    /// assert_eq!(code.data_bits_per_frame(), 112);
    /// assert_eq!(code.coded_bits_per_frame(), 224);
    /// assert_eq!(code.coded_syms_per_frame(), 112);
    /// ```
    #[must_use]
    pub fn hra_112_112() -> Self {
        let h_rows: Vec<Vec<usize>> = HRA_112_112_ROWS
            .iter()
            .map(|row| row.iter().map(|&col| usize::from(col)).collect())
            .collect();
        Self::from_valid_rows(
            HRA_112_112_CODE_LENGTH,
            HRA_112_112_NUM_PARITY_BITS,
            HRA_112_112_MAX_ITER,
            h_rows,
        )
    }

    /// Returns HRA code with given sizes and data part of the parity-check matrix.
    ///
    /// # Parameters
    ///
    /// - `code_length`: Number of code bits.
    ///
    /// - `num_parity_bits`: Number of parity bits, which is also the number of rows of `H`. Must
    ///   be positive and less than `code_length`.
    ///
    /// - `max_iter`: Default maximum number of decoder iterations.
    ///
    /// - `h_rows`: For each of the `num_parity_bits` rows, the indices of the data bits (in
    ///   `[0, code_length - num_parity_bits)`) that participate in the check.
    ///
    /// # Errors
    ///
    /// Returns an error if the sizes are inconsistent, if a row is empty, or if a column index is
    /// out of range or repeated within a row.
    pub fn new(
        code_length: usize,
        num_parity_bits: usize,
        max_iter: usize,
        h_rows: &[Vec<usize>],
    ) -> Result<Self, Error> {
        if num_parity_bits == 0 || num_parity_bits >= code_length {
            return Err(Error::InvalidInput(format!(
                "Number of parity bits ({num_parity_bits}) must be in [1, {code_length})"
            )));
        }
        if h_rows.len() != num_parity_bits {
            return Err(Error::InvalidInput(format!(
                "Expected {num_parity_bits} rows in parity-check matrix (found {})",
                h_rows.len()
            )));
        }
        let num_data_bits = code_length - num_parity_bits;
        for (i_row, row) in h_rows.iter().enumerate() {
            let mut sorted = row.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if row.is_empty()
                || sorted.len() != row.len()
                || sorted.last().is_some_and(|&col| col >= num_data_bits)
            {
                return Err(Error::InvalidInput(format!(
                    "Row {i_row} of parity-check matrix must hold distinct data-bit indices in \
                    [0, {num_data_bits}), found {row:?}"
                )));
            }
        }
        Ok(Self::from_valid_rows(
            code_length,
            num_parity_bits,
            max_iter,
            h_rows.to_vec(),
        ))
    }

    /// Returns code built from validated rows.
    fn from_valid_rows(
        code_length: usize,
        num_parity_bits: usize,
        max_iter: usize,
        h_rows: Vec<Vec<usize>>,
    ) -> Self {
        let num_data_bits = code_length - num_parity_bits;
        let mut h_cols = vec![Vec::new(); num_data_bits];
        for (i_row, row) in h_rows.iter().enumerate() {
            for &col in row {
                h_cols[col].push(i_row);
            }
        }
        let all_vars_given_check: Vec<Vec<usize>> = h_rows
            .iter()
            .enumerate()
            .map(|(i_row, row)| {
                let mut vars = row.clone();
                if i_row > 0 {
                    vars.push(num_data_bits + i_row - 1);
                }
                vars.push(num_data_bits + i_row);
                vars
            })
            .collect();
        let graph = Graph::new(code_length, &all_vars_given_check);
        Self {
            code_length,
            num_parity_bits,
            max_iter,
            h_rows,
            h_cols,
            graph,
        }
    }

    /// Returns number of code bits.
    #[must_use]
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Returns number of parity bits.
    #[must_use]
    pub fn num_parity_bits(&self) -> usize {
        self.num_parity_bits
    }

    /// Returns default maximum number of decoder iterations.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Returns maximum number of data bits in a row of `A`.
    #[must_use]
    pub fn max_row_weight(&self) -> usize {
        self.h_rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns maximum number of rows of `A` touching one data bit.
    #[must_use]
    pub fn max_col_weight(&self) -> usize {
        self.h_cols.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns number of data bits per codeword.
    #[must_use]
    pub fn data_bits_per_frame(&self) -> usize {
        self.code_length - self.num_parity_bits
    }

    /// Returns number of code bits per codeword.
    #[must_use]
    pub fn coded_bits_per_frame(&self) -> usize {
        self.code_length
    }

    /// Returns number of QPSK symbols per codeword.
    #[must_use]
    pub fn coded_syms_per_frame(&self) -> usize {
        self.code_length / BITS_PER_SYMBOL
    }

    /// Returns codeword for given data bits.
    ///
    /// Parity bit `i` is the XOR of the data bits in row `i` of `A` and of parity bit `i - 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data_bits.len()` differs from [`Self::data_bits_per_frame`].
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::{Bit, LdpcCode};
    ///
    /// let code = LdpcCode::hra_112_112();
    /// let codeword = code.encode(&[Bit::Zero; 112])?;
    /// assert_eq!(codeword, [Bit::Zero; 224]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(&self, data_bits: &[Bit]) -> Result<Vec<Bit>, Error> {
        if data_bits.len() != self.data_bits_per_frame() {
            return Err(Error::InvalidInput(format!(
                "Expected {} data bits (found {})",
                self.data_bits_per_frame(),
                data_bits.len()
            )));
        }
        let mut codeword = Vec::with_capacity(self.code_length);
        codeword.extend_from_slice(data_bits);
        let mut prev = Bit::Zero;
        for row in &self.h_rows {
            prev = row.iter().fold(prev, |acc, &col| acc ^ data_bits[col]);
            codeword.push(prev);
        }
        Ok(codeword)
    }

    /// Returns best-effort codeword for given code bit LLR values.
    ///
    /// # Parameters
    ///
    /// - `code_bits_llr`: Log-likelihood-ratio (LLR) values for the code bits, with positive
    ///   values indicating that `Zero` is more likely.
    ///
    /// - `max_iter`: Maximum number of sum-product iterations.
    ///
    /// # Errors
    ///
    /// Returns an error only if `code_bits_llr.len()` differs from the code length; a failure to
    /// converge is reported through [`DecoderOutput::parity_checks_passed`].
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::{Bit, LdpcCode};
    ///
    /// let code = LdpcCode::hra_112_112();
    /// let data_bits: Vec<Bit> = (0 .. 112).map(|k| Bit::from_bool(k % 3 == 0)).collect();
    /// let llr: Vec<f64> = code
    ///     .encode(&data_bits)?
    ///     .iter()
    ///     .map(|&b| if b == Bit::One { -10.0 } else { 10.0 })
    ///     .collect();
    /// let output = code.decode(&llr, code.max_iter())?;
    /// assert_eq!(output.data_bits(112), data_bits);
    /// assert_eq!(output.parity_checks_passed, 112);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn decode(&self, code_bits_llr: &[f64], max_iter: usize) -> Result<DecoderOutput, Error> {
        self.check_llr_len(code_bits_llr)?;
        let output = sumproduct::decode(&self.graph, code_bits_llr, max_iter, None);
        debug!(
            "LDPC decode: {} iterations, {}/{} parity checks passed",
            output.iterations, output.parity_checks_passed, self.num_parity_bits
        );
        Ok(output)
    }

    /// Returns best-effort codeword, stopping as soon as the data bits match a known reference.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_bits_llr.len()` differs from the code length or
    /// `reference_data_bits.len()` differs from [`Self::data_bits_per_frame`].
    pub fn decode_with_reference(
        &self,
        code_bits_llr: &[f64],
        max_iter: usize,
        reference_data_bits: &[Bit],
    ) -> Result<DecoderOutput, Error> {
        self.check_llr_len(code_bits_llr)?;
        if reference_data_bits.len() != self.data_bits_per_frame() {
            return Err(Error::InvalidInput(format!(
                "Expected {} reference data bits (found {})",
                self.data_bits_per_frame(),
                reference_data_bits.len()
            )));
        }
        Ok(sumproduct::decode(
            &self.graph,
            code_bits_llr,
            max_iter,
            Some(reference_data_bits),
        ))
    }

    /// Checks number of LLR values passed to the decoder.
    fn check_llr_len(&self, code_bits_llr: &[f64]) -> Result<(), Error> {
        if code_bits_llr.len() == self.code_length {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Expected {} code bit LLR values (found {})",
                self.code_length,
                code_bits_llr.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests_of_ldpc_code {
    use super::*;
    use crate::utils;

    fn strong_llr(codeword: &[Bit], magnitude: f64) -> Vec<f64> {
        codeword
            .iter()
            .map(|&b| match b {
                Bit::Zero => magnitude,
                Bit::One => -magnitude,
            })
            .collect()
    }

    #[test]
    fn test_new() {
        assert!(LdpcCode::new(8, 0, 10, &[]).is_err());
        assert!(LdpcCode::new(8, 8, 10, &[]).is_err());
        assert!(LdpcCode::new(8, 4, 10, &[vec![0], vec![1], vec![2]]).is_err());
        assert!(LdpcCode::new(8, 4, 10, &[vec![0], vec![1], vec![2], vec![]]).is_err());
        assert!(LdpcCode::new(8, 4, 10, &[vec![0], vec![1], vec![2], vec![4]]).is_err());
        assert!(LdpcCode::new(8, 4, 10, &[vec![0], vec![1, 1], vec![2], vec![3]]).is_err());
        let code = LdpcCode::new(8, 4, 10, &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 0]])
            .unwrap();
        assert_eq!(code.data_bits_per_frame(), 4);
        assert_eq!(code.coded_syms_per_frame(), 4);
        assert_eq!(code.max_row_weight(), 2);
        assert_eq!(code.max_col_weight(), 2);
        assert_eq!(code.h_cols, [vec![0, 3], vec![0, 1], vec![1, 2], vec![2, 3]]);
    }

    #[test]
    fn test_hra_112_112() {
        let code = LdpcCode::hra_112_112();
        assert_eq!(code.code_length(), 224);
        assert_eq!(code.num_parity_bits(), 112);
        assert_eq!(code.max_iter(), 100);
        assert_eq!(code.max_row_weight(), 3);
        assert_eq!(code.max_col_weight(), 3);
        // Data edges plus two accumulator edges per row, less one for the first row
        assert_eq!(code.graph.num_edges(), 3 * 112 + 2 * 112 - 1);
    }

    #[test]
    fn test_encode() {
        let code = LdpcCode::new(8, 4, 10, &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 0]])
            .unwrap();
        assert!(code.encode(&[Bit::One; 3]).is_err());
        // Row sums 1, 1, 0, 0, accumulated
        let codeword = code
            .encode(&[Bit::One, Bit::Zero, Bit::One, Bit::One])
            .unwrap();
        assert_eq!(
            codeword[4 ..],
            [Bit::One, Bit::Zero, Bit::Zero, Bit::Zero]
        );
        let code = LdpcCode::hra_112_112();
        assert_eq!(code.encode(&[Bit::Zero; 112]).unwrap(), [Bit::Zero; 224]);
    }

    #[test]
    fn test_decode_clean() {
        let code = LdpcCode::hra_112_112();
        assert!(code.decode(&[1.0; 223], 10).is_err());
        let data_bits = utils::random_bits(112);
        let codeword = code.encode(&data_bits).unwrap();
        let output = code.decode(&strong_llr(&codeword, 8.0), 100).unwrap();
        assert_eq!(output.codeword, codeword);
        assert_eq!(output.iterations, 1);
        assert_eq!(output.parity_checks_passed, 112);
    }

    #[test]
    fn test_decode_weak_errors() {
        let code = LdpcCode::hra_112_112();
        let data_bits = utils::test_frame_bits(112);
        let codeword = code.encode(&data_bits).unwrap();
        let mut llr = strong_llr(&codeword, 4.0);
        for k in [3, 17, 40, 77, 101, 130, 170, 210] {
            llr[k] *= -0.5;
        }
        let output = code.decode(&llr, 100).unwrap();
        assert_eq!(output.codeword, codeword);
        assert_eq!(output.iterations, 3);
        assert_eq!(output.parity_checks_passed, 112);
    }

    #[test]
    fn test_decode_with_reference() {
        let code = LdpcCode::hra_112_112();
        let data_bits = utils::test_frame_bits(112);
        let codeword = code.encode(&data_bits).unwrap();
        let mut llr = strong_llr(&codeword, 4.0);
        llr[3] *= -0.5;
        assert!(code.decode_with_reference(&llr, 100, &data_bits[1 ..]).is_err());
        let output = code.decode_with_reference(&llr, 100, &data_bits).unwrap();
        assert_eq!(output.data_bits(112), data_bits);
        assert_eq!(output.iterations, 1);
        // The three checks on data bit 3 see its flipped channel sign
        assert_eq!(output.parity_checks_passed, 109);
    }
}
