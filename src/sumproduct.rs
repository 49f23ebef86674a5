//! Sum-product decoder on the bipartite graph of a sparse parity-check code
//!
//! The graph is held as flat edge arrays: edges are numbered check by check, each edge records the
//! variable node it reaches, and each variable node keeps the list of its edge numbers. The
//! topology depends only on the code and is built once; every decode call allocates fresh message
//! buffers indexed by edge number.

use crate::ldpc::DecoderOutput;
use crate::Bit;

/// Input magnitude below which `phi0` saturates
const PHI0_SMALL_INPUT: f64 = 9.08e-5;

/// Input magnitude above which `phi0` is zero
const PHI0_LARGE_INPUT: f64 = 10.0;

/// Topology of the decode graph
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct Graph {
    /// Number of variable nodes
    num_vars: usize,
    /// Edges of check `c` are numbered `check_first_edge[c] .. check_first_edge[c + 1]`
    check_first_edge: Vec<usize>,
    /// Variable node reached by each edge
    var_given_edge: Vec<usize>,
    /// Edges of variable `v` are `edges_given_var[var_first_edge[v] .. var_first_edge[v + 1]]`
    var_first_edge: Vec<usize>,
    /// Edge numbers grouped by variable node, in increasing check order
    edges_given_var: Vec<usize>,
}

impl Graph {
    /// Returns graph with `num_vars` variable nodes and one check node per entry of
    /// `all_vars_given_check`. All variable indices must be less than `num_vars`.
    pub(crate) fn new(num_vars: usize, all_vars_given_check: &[Vec<usize>]) -> Self {
        let mut check_first_edge = Vec::with_capacity(all_vars_given_check.len() + 1);
        let mut var_given_edge = Vec::new();
        check_first_edge.push(0);
        for vars in all_vars_given_check {
            var_given_edge.extend_from_slice(vars);
            check_first_edge.push(var_given_edge.len());
        }
        let mut var_degree = vec![0; num_vars];
        for &var in &var_given_edge {
            var_degree[var] += 1;
        }
        let mut var_first_edge = Vec::with_capacity(num_vars + 1);
        var_first_edge.push(0);
        for degree in var_degree {
            var_first_edge.push(var_first_edge[var_first_edge.len() - 1] + degree);
        }
        let mut fill = var_first_edge[.. num_vars].to_vec();
        let mut edges_given_var = vec![0; var_given_edge.len()];
        for (edge, &var) in var_given_edge.iter().enumerate() {
            edges_given_var[fill[var]] = edge;
            fill[var] += 1;
        }
        Self {
            num_vars,
            check_first_edge,
            var_given_edge,
            var_first_edge,
            edges_given_var,
        }
    }

    /// Returns number of check nodes.
    pub(crate) fn num_checks(&self) -> usize {
        self.check_first_edge.len() - 1
    }

    /// Returns number of variable nodes.
    pub(crate) fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Returns number of edges.
    pub(crate) fn num_edges(&self) -> usize {
        self.var_given_edge.len()
    }

    /// Returns edge numbers of a check node.
    fn check_edges(&self, check: usize) -> std::ops::Range<usize> {
        self.check_first_edge[check] .. self.check_first_edge[check + 1]
    }

    /// Returns edge numbers of a variable node.
    fn var_edges(&self, var: usize) -> &[usize] {
        &self.edges_given_var[self.var_first_edge[var] .. self.var_first_edge[var + 1]]
    }
}

/// Messages on the edges of the graph for one decode call
#[derive(Debug)]
struct Messages {
    /// `phi0` of the magnitude of each variable-to-check message
    var_to_check: Vec<f64>,
    /// Sign of each variable-to-check message (`One` for negative)
    var_to_check_sign: Vec<Bit>,
    /// Each check-to-variable message
    check_to_var: Vec<f64>,
}

impl Messages {
    /// Returns messages initialized from channel LLR values.
    fn new(graph: &Graph, llr: &[f64]) -> Self {
        let mut var_to_check = vec![0.0; graph.num_edges()];
        let mut var_to_check_sign = vec![Bit::Zero; graph.num_edges()];
        for (var, &llr_val) in llr.iter().enumerate().take(graph.num_vars()) {
            for &edge in graph.var_edges(var) {
                var_to_check[edge] = phi0(llr_val.abs());
                var_to_check_sign[edge] = Bit::from_bool(llr_val < 0.0);
            }
        }
        Self {
            var_to_check,
            var_to_check_sign,
            check_to_var: vec![0.0; graph.num_edges()],
        }
    }

    /// Updates all check-to-variable messages and returns number of satisfied checks.
    fn update_check_nodes(&mut self, graph: &Graph) -> usize {
        let mut num_satisfied = 0;
        for check in 0 .. graph.num_checks() {
            let mut sign = Bit::Zero;
            let mut phi_sum = 0.0;
            for edge in graph.check_edges(check) {
                phi_sum += self.var_to_check[edge];
                sign = sign ^ self.var_to_check_sign[edge];
            }
            if sign == Bit::Zero {
                num_satisfied += 1;
            }
            for edge in graph.check_edges(check) {
                let magnitude = phi0(phi_sum - self.var_to_check[edge]);
                self.check_to_var[edge] = match sign ^ self.var_to_check_sign[edge] {
                    Bit::Zero => magnitude,
                    Bit::One => -magnitude,
                };
            }
        }
        num_satisfied
    }

    /// Updates all variable-to-check messages and writes hard decisions.
    fn update_var_nodes(&mut self, graph: &Graph, llr: &[f64], bits: &mut [Bit]) {
        for (var, bit) in bits.iter_mut().enumerate() {
            let edges = graph.var_edges(var);
            let total = llr[var] + edges.iter().map(|&e| self.check_to_var[e]).sum::<f64>();
            *bit = Bit::from_bool(total < 0.0);
            for &edge in edges {
                let extrinsic = total - self.check_to_var[edge];
                self.var_to_check[edge] = phi0(extrinsic.abs());
                self.var_to_check_sign[edge] = Bit::from_bool(extrinsic <= 0.0);
            }
        }
    }
}

/// Runs sum-product decoding and returns the best-effort codeword.
///
/// Iterations stop early when every parity check is satisfied, or, if `reference` is given, when
/// the leading `reference.len()` hard decisions equal `reference`.
pub(crate) fn decode(
    graph: &Graph,
    llr: &[f64],
    max_iter: usize,
    reference: Option<&[Bit]>,
) -> DecoderOutput {
    let mut messages = Messages::new(graph, llr);
    let mut bits = vec![Bit::Zero; graph.num_vars()];
    let mut iterations = max_iter;
    let mut parity_checks_passed = 0;
    for i_iter in 0 .. max_iter {
        parity_checks_passed = messages.update_check_nodes(graph);
        messages.update_var_nodes(graph, llr, &mut bits);
        let reference_matched = reference.is_some_and(|r| bits[.. r.len()] == *r);
        if reference_matched || parity_checks_passed == graph.num_checks() {
            iterations = i_iter + 1;
            break;
        }
    }
    DecoderOutput {
        codeword: bits,
        iterations,
        parity_checks_passed,
    }
}

/// Returns `phi0(x) = ln((e^x + 1) / (e^x - 1))`, the self-inverse log-domain map used in check
/// node updates, with saturation outside `[9.08e-5, 10]`.
pub(crate) fn phi0(x: f64) -> f64 {
    if x > PHI0_LARGE_INPUT {
        0.0
    } else if x < PHI0_SMALL_INPUT {
        10.0
    } else {
        let z = x.exp();
        ((z + 1.0) / (z - 1.0)).ln()
    }
}

#[cfg(test)]
mod tests_of_graph {
    use super::*;

    fn hamming_graph() -> Graph {
        // Parity checks of the (7, 4) Hamming code
        Graph::new(
            7,
            &[vec![0, 1, 2, 4], vec![1, 2, 3, 5], vec![0, 1, 3, 6]],
        )
    }

    #[test]
    fn test_new() {
        let graph = hamming_graph();
        assert_eq!(graph.num_checks(), 3);
        assert_eq!(graph.num_vars(), 7);
        assert_eq!(graph.num_edges(), 12);
        assert_eq!(graph.check_edges(1), 4 .. 8);
        assert_eq!(graph.var_edges(1), [1, 4, 9]);
        assert_eq!(graph.var_edges(6), [11]);
    }

    #[test]
    fn test_decode_corrects_single_error() {
        let graph = hamming_graph();
        // Codeword 1011000 with bit 2 received weakly in error
        let mut llr: Vec<f64> = [1, 0, 1, 1, 0, 0, 0]
            .iter()
            .map(|&b| if b == 1 { -3.0 } else { 3.0 })
            .collect();
        llr[2] = 0.5;
        let output = decode(&graph, &llr, 20, None);
        assert_eq!(output.iterations, 2);
        assert_eq!(output.parity_checks_passed, 3);
        assert_eq!(
            output.codeword,
            [
                Bit::One,
                Bit::Zero,
                Bit::One,
                Bit::One,
                Bit::Zero,
                Bit::Zero,
                Bit::Zero
            ]
        );
    }

    #[test]
    fn test_decode_zero_iterations() {
        let output = decode(&hamming_graph(), &[1.0; 7], 0, None);
        assert_eq!(output.iterations, 0);
        assert_eq!(output.parity_checks_passed, 0);
        assert_eq!(output.codeword, [Bit::Zero; 7]);
    }
}
