/*
    Aero Mission, aircraft mission phase assembly
    Copyright (C) 2026 The aero-mission developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TranscriptionError {
    #[snafu(display("a transcription needs at least one segment"))]
    NoSegments,
    #[snafu(display("collocation order must be at least one, got {order}"))]
    InvalidOrder { order: usize },
    #[snafu(display("{num_segments} segments but {num_orders} orders were provided"))]
    OrderMismatch {
        num_segments: usize,
        num_orders: usize,
    },
    #[snafu(display("an analytic phase needs at least two nodes, got {num_nodes}"))]
    TooFewNodes { num_nodes: usize },
}

/// How a phase is discretized in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transcription {
    /// Radau pseudospectral collocation on equally sized segments.
    Radau {
        num_segments: usize,
        /// Collocation order of each segment.
        orders: Vec<usize>,
        /// Segment boundaries share a single state node.
        compressed: bool,
    },
    /// No collocation: the states are computed in closed form at a fixed set of nodes.
    Analytic { num_nodes: usize },
}

impl Transcription {
    /// A Radau transcription, `orders` is either a single order for every segment or one per segment.
    pub fn radau(
        num_segments: usize,
        orders: &[usize],
        compressed: bool,
    ) -> Result<Self, TranscriptionError> {
        ensure!(num_segments > 0, NoSegmentsSnafu);
        let orders = match orders.len() {
            1 => vec![orders[0]; num_segments],
            n if n == num_segments => orders.to_vec(),
            n => {
                return OrderMismatchSnafu {
                    num_segments,
                    num_orders: n,
                }
                .fail()
            }
        };
        if let Some(order) = orders.iter().find(|o| **o == 0) {
            return InvalidOrderSnafu { order: *order }.fail();
        }
        Ok(Self::Radau {
            num_segments,
            orders,
            compressed,
        })
    }

    pub fn analytic(num_nodes: usize) -> Result<Self, TranscriptionError> {
        ensure!(num_nodes >= 2, TooFewNodesSnafu { num_nodes });
        Ok(Self::Analytic { num_nodes })
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self, Self::Analytic { .. })
    }

    /// Checks a transcription which may have been built without its constructor.
    pub fn validate(&self) -> Result<(), TranscriptionError> {
        match self {
            Self::Radau {
                num_segments,
                orders,
                ..
            } => {
                ensure!(*num_segments > 0, NoSegmentsSnafu);
                ensure!(
                    orders.len() == *num_segments,
                    OrderMismatchSnafu {
                        num_segments: *num_segments,
                        num_orders: orders.len(),
                    }
                );
                match orders.iter().find(|o| **o == 0) {
                    Some(order) => InvalidOrderSnafu { order: *order }.fail(),
                    None => Ok(()),
                }
            }
            Self::Analytic { num_nodes } => {
                ensure!(*num_nodes >= 2, TooFewNodesSnafu { num_nodes: *num_nodes });
                Ok(())
            }
        }
    }

    /// Builds the node layout of this transcription, which should be valid.
    pub fn grid(&self) -> Grid {
        match self {
            Self::Radau {
                num_segments,
                orders,
                compressed,
            } => Grid::radau(*num_segments, orders, *compressed),
            Self::Analytic { num_nodes } => Grid::analytic(*num_nodes),
        }
    }
}

impl fmt::Display for Transcription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radau {
                num_segments,
                orders,
                compressed,
            } => write!(
                f,
                "Radau({num_segments} segments, orders {orders:?}{})",
                if *compressed { ", compressed" } else { "" }
            ),
            Self::Analytic { num_nodes } => write!(f, "Analytic({num_nodes} nodes)"),
        }
    }
}

/// Legendre-Gauss-Radau points of the provided order on [-1, 1), including -1.
///
/// The interior points are the roots of the Jacobi polynomial P^(0,1)_{n-1}, found as the
/// eigenvalues of its Jacobi matrix.
pub fn lgr_nodes(order: usize) -> Vec<f64> {
    let m = order.saturating_sub(1);
    let mut nodes = vec![-1.0];
    if m == 0 {
        return nodes;
    }
    let mut jacobi = DMatrix::<f64>::zeros(m, m);
    for k in 0..m {
        let kf = k as f64;
        jacobi[(k, k)] = 1.0 / ((2.0 * kf + 1.0) * (2.0 * kf + 3.0));
        if k > 0 {
            let off = (kf * (kf + 1.0)).sqrt() / (2.0 * kf + 1.0);
            jacobi[(k, k - 1)] = off;
            jacobi[(k - 1, k)] = off;
        }
    }
    let mut roots: Vec<f64> = SymmetricEigen::new(jacobi).eigenvalues.iter().copied().collect();
    roots.sort_by(|a, b| a.total_cmp(b));
    nodes.extend(roots);
    nodes
}

/// Lagrange differentiation matrix of the provided nodes, computed from barycentric weights.
pub fn differentiation_matrix(nodes: &[f64]) -> DMatrix<f64> {
    let n = nodes.len();
    let weights: Vec<f64> = (0..n)
        .map(|j| {
            1.0 / (0..n)
                .filter(|k| *k != j)
                .map(|k| nodes[j] - nodes[k])
                .product::<f64>()
        })
        .collect();
    let mut d = DMatrix::zeros(n, n);
    for i in 0..n {
        let mut diag = 0.0;
        for j in 0..n {
            if i != j {
                d[(i, j)] = (weights[j] / weights[i]) / (nodes[i] - nodes[j]);
                diag -= d[(i, j)];
            }
        }
        d[(i, i)] = diag;
    }
    d
}

/// One segment of a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Index of the first node of this segment in the grid.
    pub first_node: usize,
    pub num_nodes: usize,
    /// Phase tau at the start and end of the segment.
    pub tau_bounds: (f64, f64),
    /// Derivative with respect to the segment tau, `num_nodes` x `num_nodes`.
    pub diff: DMatrix<f64>,
}

impl Segment {
    /// Ratio of the segment tau span to the phase tau span, i.e. d(phase tau) / d(segment tau).
    pub fn dtau_ratio(&self) -> f64 {
        (self.tau_bounds.1 - self.tau_bounds.0) / 2.0
    }
}

/// The node layout of a phase.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    /// Phase tau in [-1, 1] of every node, segment boundaries appear in both segments.
    pub tau: Vec<f64>,
    pub segments: Vec<Segment>,
    /// Index of the state input value of each node.
    pub state_input_map: Vec<usize>,
    pub num_state_inputs: usize,
    /// Whether the nodes are collocated (Radau) or computed in closed form.
    pub collocated: bool,
    pub compressed: bool,
}

impl Grid {
    fn radau(num_segments: usize, orders: &[usize], compressed: bool) -> Self {
        let mut tau = Vec::new();
        let mut segments = Vec::with_capacity(num_segments);
        let mut state_input_map = Vec::new();
        let mut next_input = 0;
        let width = 2.0 / num_segments as f64;
        for (s, order) in orders.iter().enumerate() {
            let lo = -1.0 + width * s as f64;
            let hi = if s + 1 == num_segments { 1.0 } else { lo + width };
            let mut local = lgr_nodes(*order);
            local.push(1.0);
            let first_node = tau.len();
            for (j, x) in local.iter().enumerate() {
                tau.push(lo + (x + 1.0) * (hi - lo) / 2.0);
                if compressed && s > 0 && j == 0 {
                    // Shared with the last node of the previous segment
                    state_input_map.push(next_input - 1);
                } else {
                    state_input_map.push(next_input);
                    next_input += 1;
                }
            }
            segments.push(Segment {
                first_node,
                num_nodes: local.len(),
                tau_bounds: (lo, hi),
                diff: differentiation_matrix(&local),
            });
        }
        Self {
            tau,
            segments,
            state_input_map,
            num_state_inputs: next_input,
            collocated: true,
            compressed,
        }
    }

    fn analytic(num_nodes: usize) -> Self {
        let tau: Vec<f64> = (0..num_nodes)
            .map(|i| -1.0 + 2.0 * i as f64 / num_nodes.saturating_sub(1).max(1) as f64)
            .collect();
        Self {
            tau,
            segments: Vec::new(),
            state_input_map: (0..num_nodes).collect(),
            num_state_inputs: num_nodes,
            collocated: false,
            compressed: false,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.tau.len()
    }

    /// Number of collocation equations per state.
    pub fn num_collocation_nodes(&self) -> usize {
        self.segments.iter().map(|s| s.num_nodes - 1).sum()
    }

    /// Expands state input values to every node.
    pub fn expand_states(&self, inputs: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.num_nodes(), |i, _| inputs[self.state_input_map[i]])
    }

    /// Tau of every state input node.
    pub fn state_input_tau(&self) -> Vec<f64> {
        let mut tau = vec![0.0; self.num_state_inputs];
        for (i, idx) in self.state_input_map.iter().enumerate() {
            tau[*idx] = self.tau[i];
        }
        tau
    }

    /// Time of every node given the phase initial time and duration.
    pub fn times(&self, t_initial: f64, t_duration: f64) -> DVector<f64> {
        DVector::from_fn(self.num_nodes(), |i, _| {
            t_initial + (self.tau[i] + 1.0) / 2.0 * t_duration
        })
    }

    /// Time derivative of values given at every node, segment by segment.
    pub fn differentiate(&self, values: &DVector<f64>, t_duration: f64) -> DVector<f64> {
        let mut rates = DVector::zeros(self.num_nodes());
        if !self.collocated {
            let n = self.num_nodes();
            for i in 0..n {
                let (a, b) = if i == 0 {
                    (0, 1)
                } else if i + 1 == n {
                    (n - 2, n - 1)
                } else {
                    (i - 1, i + 1)
                };
                let dt = (self.tau[b] - self.tau[a]) / 2.0 * t_duration;
                rates[i] = if dt.abs() > 0.0 {
                    (values[b] - values[a]) / dt
                } else {
                    0.0
                };
            }
            return rates;
        }
        for seg in &self.segments {
            let dt_dstau = t_duration / 2.0 * seg.dtau_ratio();
            let local = values.rows(seg.first_node, seg.num_nodes);
            let derivative = &seg.diff * local;
            for j in 0..seg.num_nodes {
                rates[seg.first_node + j] = if dt_dstau.abs() > 0.0 {
                    derivative[j] / dt_dstau
                } else {
                    0.0
                };
            }
        }
        rates
    }

    /// Radau defects `D x - (dt/dtau) f` at every collocation node, in state units.
    pub fn defects(
        &self,
        state_all_nodes: &DVector<f64>,
        rates_all_nodes: &DVector<f64>,
        t_duration: f64,
    ) -> DVector<f64> {
        let mut defects = DVector::zeros(self.num_collocation_nodes());
        let mut k = 0;
        for seg in &self.segments {
            let dt_dstau = t_duration / 2.0 * seg.dtau_ratio();
            let local = state_all_nodes.rows(seg.first_node, seg.num_nodes);
            let derivative = &seg.diff * local;
            for j in 0..seg.num_nodes - 1 {
                defects[k] = derivative[j] - dt_dstau * rates_all_nodes[seg.first_node + j];
                k += 1;
            }
        }
        defects
    }

    /// Mismatch of the duplicated segment boundary nodes, only non empty when uncompressed.
    pub fn continuity_residuals(&self, state_inputs: &DVector<f64>) -> Vec<f64> {
        if self.compressed || !self.collocated {
            return Vec::new();
        }
        self.segments
            .windows(2)
            .map(|pair| {
                let last = pair[0].first_node + pair[0].num_nodes - 1;
                state_inputs[self.state_input_map[pair[1].first_node]]
                    - state_inputs[self.state_input_map[last]]
            })
            .collect()
    }
}

/// Linear interpolation of evenly spaced values spanning the phase onto the provided tau.
pub fn interp_tau(ys: &[f64], tau: &[f64]) -> DVector<f64> {
    match ys.len() {
        0 => DVector::zeros(tau.len()),
        1 => DVector::from_element(tau.len(), ys[0]),
        n => DVector::from_iterator(
            tau.len(),
            tau.iter().map(|t| {
                let x = (t + 1.0) / 2.0 * (n - 1) as f64;
                let i = (x.floor() as usize).min(n - 2);
                let frac = x - i as f64;
                ys[i] + frac * (ys[i + 1] - ys[i])
            }),
        ),
    }
}
