//! Interleavers for spreading coded symbols across OFDM frames
//!
//! An [`Interleaver`] is a fixed permutation of `length` elements. The modem uses the Golden-Prime
//! family built by [`Interleaver::golden_prime`]: element `i` of the input moves to position
//! `(b * i) % length`, where the step `b` is a prime near `length / phi` that is relatively prime
//! to `length`. The step is read from a fixed table, so both ends of a link agree on it.

use crate::Error;

/// Golden-Prime steps, keyed by interleaver length
const GOLDEN_PRIME_STEPS: [(usize, usize); 17] = [
    (112, 71),
    (224, 139),
    (448, 277),
    (672, 419),
    (896, 557),
    (1120, 701),
    (1344, 839),
    (1568, 971),
    (1792, 1109),
    (2016, 1249),
    (2240, 1399),
    (2464, 1523),
    (2688, 1663),
    (2912, 1801),
    (3136, 1949),
    (3360, 2081),
    (3584, 2213),
];

/// Interleaver for sequences of a given length
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Interleaver {
    /// Length of input/output sequence
    pub(crate) length: usize,
    /// Input index for each output index (needed in interleaving)
    pub(crate) all_in_index_given_out_index: Vec<usize>,
    /// Output index for each input index (needed in deinterleaving)
    pub(crate) all_out_index_given_in_index: Vec<usize>,
}

impl Interleaver {
    /// Returns interleaver corresponding to a given permutation.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of the integers in `[0, L)`. Output element `k` of the interleaver is
    ///   input element `perm[k]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is empty or is not a permutation of `[0, perm.len())`.
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::Interleaver;
    ///
    /// let interleaver = Interleaver::new(&[2, 0, 3, 1])?;
    /// assert_eq!(interleaver.len(), 4);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(perm: &[usize]) -> Result<Self, Error> {
        if perm.is_empty() {
            return Err(Error::InvalidInput(
                "Permutation defining interleaver cannot be empty".to_string(),
            ));
        }
        let mut seen = vec![false; perm.len()];
        for &in_index in perm {
            if in_index >= perm.len() || seen[in_index] {
                return Err(Error::InvalidInput(format!(
                    "Expected permutation of all integers in the range [0, {}), found {:?}",
                    perm.len(),
                    perm
                )));
            }
            seen[in_index] = true;
        }
        Ok(Self::from_valid_perm(perm.to_vec()))
    }

    /// Returns Golden-Prime interleaver of a given length.
    ///
    /// # Parameters
    ///
    /// - `length`: Number of elements to be permuted. Must be one of the lengths in the
    ///   Golden-Prime table (`112 * interleave_frames` for the supported frame counts, among
    ///   others).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInterleaverLength`] if `length` has no table entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use qofdm::Interleaver;
    ///
    /// let interleaver = Interleaver::golden_prime(112)?;
    /// let mut output = Vec::new();
    /// interleaver.interleave(&(0 .. 112).collect::<Vec<usize>>(), &mut output)?;
    /// assert_eq!(output[71], 1); // Element 1 moves to position 71
    /// assert!(Interleaver::golden_prime(100).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn golden_prime(length: usize) -> Result<Self, Error> {
        let step = golden_prime_step(length)?;
        let mut perm_vec = vec![0; length];
        for in_index in 0 .. length {
            perm_vec[(step * in_index) % length] = in_index;
        }
        Ok(Self::from_valid_perm(perm_vec))
    }

    /// Returns length of input/output sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the interleaver has zero length (never the case for a constructed one).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Generates interleaver output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Interleaver input.
    ///
    /// - `output`: Buffer for interleaver output (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to the interleaver length.
    pub fn interleave<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        self.check_len(input.len(), "input")?;
        output.clear();
        output.extend(
            self.all_in_index_given_out_index
                .iter()
                .map(|&in_index| input[in_index]),
        );
        Ok(())
    }

    /// Generates interleaver input given its output.
    ///
    /// # Parameters
    ///
    /// - `output`: Interleaver output.
    ///
    /// - `input`: Buffer for interleaver input (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to the interleaver length.
    pub fn deinterleave<T: Copy>(&self, output: &[T], input: &mut Vec<T>) -> Result<(), Error> {
        self.check_len(output.len(), "output")?;
        input.clear();
        input.extend(
            self.all_out_index_given_in_index
                .iter()
                .map(|&out_index| output[out_index]),
        );
        Ok(())
    }

    /// Checks length of a sequence passed in or out of the interleaver.
    fn check_len(&self, len: usize, what: &str) -> Result<(), Error> {
        if len == self.length {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Invalid interleaver {what} length (expected {}, found {len})",
                self.length
            )))
        }
    }

    /// Returns interleaver corresponding to a valid permutation.
    fn from_valid_perm(all_in_index_given_out_index: Vec<usize>) -> Self {
        let length = all_in_index_given_out_index.len();
        let mut all_out_index_given_in_index = vec![0; length];
        for (out_index, &in_index) in all_in_index_given_out_index.iter().enumerate() {
            all_out_index_given_in_index[in_index] = out_index;
        }
        Self {
            length,
            all_in_index_given_out_index,
            all_out_index_given_in_index,
        }
    }
}

/// Returns Golden-Prime step for a given interleaver length.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInterleaverLength`] if `length` is not in the table.
pub fn golden_prime_step(length: usize) -> Result<usize, Error> {
    GOLDEN_PRIME_STEPS
        .iter()
        .find(|&&(len, _)| len == length)
        .map(|&(_, step)| step)
        .ok_or(Error::UnsupportedInterleaverLength(length))
}

/// Returns all interleaver lengths with a Golden-Prime table entry.
pub fn golden_prime_lengths() -> impl Iterator<Item = usize> {
    GOLDEN_PRIME_STEPS.iter().map(|&(len, _)| len)
}
