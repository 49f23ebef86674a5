//! Parity-check table of the rate-1/2 HRA (112, 112) code
//!
//! The code has `224` coded bits: `112` systematic bits followed by `112` parity bits. Its
//! parity-check matrix is `H = [A | T]`, where `T` is the `112 x 112` dual-diagonal accumulator
//! and `A` is the regular weight-3 systematic part listed here row by row. Every data column
//! also appears in exactly three rows, no two rows share more than one column, and no column
//! touches two adjacent rows, so the graph has no 4-cycles even through the accumulator.
//!
//! This table is a generated construction with the dimensions and degree profile of the published
//! FreeDV `HRA_112_112` matrix, not that matrix itself. Both ends of a link must use the same
//! table, so it does not interoperate with FreeDV decoders.

/// Number of coded bits
pub const HRA_112_112_CODE_LENGTH: usize = 224;

/// Number of parity bits (and of parity checks)
pub const HRA_112_112_NUM_PARITY_BITS: usize = 112;

/// Maximum number of decoder iterations
pub const HRA_112_112_MAX_ITER: usize = 100;

/// Systematic column indices of each parity check
pub const HRA_112_112_ROWS: [[u16; 3]; HRA_112_112_NUM_PARITY_BITS] = [
    [35, 48, 105],
    [34, 50, 89],
    [36, 72, 77],
    [9, 43, 83],
    [4, 41, 87],
    [9, 45, 78],
    [13, 58, 92],
    [0, 45, 96],
    [32, 40, 97],
    [35, 42, 84],
    [28, 62, 93],
    [36, 45, 75],
    [1, 49, 106],
    [33, 38, 90],
    [1, 52, 74],
    [34, 44, 76],
    [29, 48, 96],
    [20, 44, 78],
    [27, 39, 76],
    [33, 67, 103],
    [30, 64, 90],
    [29, 53, 86],
    [26, 56, 102],
    [22, 63, 98],
    [2, 44, 103],
    [5, 57, 111],
    [14, 73, 87],
    [32, 43, 103],
    [36, 65, 91],
    [11, 37, 105],
    [23, 40, 99],
    [4, 46, 77],
    [12, 55, 76],
    [33, 68, 95],
    [13, 40, 101],
    [14, 58, 82],
    [3, 64, 111],
    [35, 47, 78],
    [19, 50, 85],
    [16, 39, 81],
    [18, 49, 91],
    [13, 61, 77],
    [8, 56, 108],
    [3, 43, 102],
    [31, 63, 99],
    [12, 65, 105],
    [20, 47, 101],
    [17, 53, 97],
    [29, 64, 110],
    [32, 63, 107],
    [24, 69, 98],
    [16, 46, 80],
    [1, 73, 98],
    [10, 70, 94],
    [21, 57, 110],
    [25, 49, 104],
    [20, 61, 93],
    [7, 54, 108],
    [37, 42, 88],
    [18, 62, 95],
    [6, 66, 107],
    [31, 41, 81],
    [28, 42, 89],
    [9, 52, 108],
    [14, 74, 106],
    [6, 51, 104],
    [30, 68, 75],
    [10, 60, 100],
    [21, 39, 88],
    [8, 46, 97],
    [28, 51, 80],
    [19, 61, 83],
    [31, 67, 94],
    [23, 59, 85],
    [11, 71, 89],
    [22, 55, 101],
    [15, 71, 79],
    [7, 52, 111],
    [10, 37, 79],
    [25, 48, 86],
    [30, 50, 82],
    [8, 58, 100],
    [23, 69, 88],
    [5, 51, 107],
    [24, 72, 92],
    [25, 65, 109],
    [24, 74, 96],
    [4, 54, 90],
    [3, 60, 94],
    [17, 38, 83],
    [7, 59, 92],
    [17, 71, 95],
    [2, 62, 99],
    [26, 55, 80],
    [18, 54, 86],
    [22, 60, 104],
    [27, 66, 110],
    [19, 57, 93],
    [6, 72, 84],
    [11, 56, 75],
    [34, 59, 81],
    [2, 47, 85],
    [16, 68, 87],
    [5, 66, 106],
    [26, 69, 109],
    [12, 70, 79],
    [27, 41, 100],
    [21, 53, 84],
    [0, 38, 102],
    [15, 70, 82],
    [0, 73, 109],
    [15, 67, 91],
];

#[cfg(test)]
mod tests_of_table {
    use super::*;

    #[test]
    fn test_column_weights() {
        let num_data_bits = HRA_112_112_CODE_LENGTH - HRA_112_112_NUM_PARITY_BITS;
        let mut col_weights = vec![0; num_data_bits];
        for row in &HRA_112_112_ROWS {
            for &col in row {
                col_weights[usize::from(col)] += 1;
            }
        }
        assert!(col_weights.iter().all(|&w| w == 3));
    }

    #[test]
    fn test_no_four_cycles() {
        for (i, row_i) in HRA_112_112_ROWS.iter().enumerate() {
            assert!(row_i.windows(2).all(|w| w[0] < w[1]));
            for row_j in &HRA_112_112_ROWS[i + 1 ..] {
                let shared = row_i.iter().filter(|col| row_j.contains(col)).count();
                assert!(shared <= 1);
            }
        }
    }

    #[test]
    fn test_no_column_in_adjacent_rows() {
        for pair in HRA_112_112_ROWS.windows(2) {
            assert!(pair[0].iter().all(|col| !pair[1].contains(col)));
        }
    }
}
