//! Institution Network Generator
//!
//! Builds the exposure graph the cascade runs over: an undirected simple
//! graph of `n` institutions where every unordered pair is linked
//! independently with a fixed probability (Erdős–Rényi), plus one capital
//! buffer per institution drawn uniformly from a configured range.
//!
//! ## Reproducibility
//! All draws come from a single RNG. With a seed the generator uses
//! `ChaCha8Rng::seed_from_u64`, so the same `(n, p, range, seed)` always
//! yields the same network. Draw order is every pair `(i, j)` with `i < j`
//! in lexicographic order, then buffers `0..n`.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use serde::Serialize;
use tracing::debug;

use crate::error::{ContagionError, Result};

/// Undirected exposure network with per-institution capital buffers.
///
/// Adjacency lists are sorted and symmetric, with no self-loops or
/// duplicate edges. The network is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    adjacency: Vec<Vec<usize>>,
    buffers: Vec<f64>,
}

impl Network {
    /// Builds a network from explicit adjacency lists and buffers.
    pub fn new(mut adjacency: Vec<Vec<usize>>, buffers: Vec<f64>) -> Result<Self> {
        let n = adjacency.len();
        if n == 0 {
            return Err(ContagionError::invalid("network must contain at least one institution"));
        }
        if buffers.len() != n {
            return Err(ContagionError::invalid(format!(
                "expected {} buffers, got {}",
                n,
                buffers.len()
            )));
        }
        for (i, &b) in buffers.iter().enumerate() {
            if !b.is_finite() || b < 0.0 {
                return Err(ContagionError::invalid(format!(
                    "buffer of institution {} must be finite and non-negative, got {}",
                    i, b
                )));
            }
        }

        for (i, neighbors) in adjacency.iter_mut().enumerate() {
            neighbors.sort_unstable();
            if neighbors.windows(2).any(|w| w[0] == w[1]) {
                return Err(ContagionError::invalid(format!(
                    "institution {} lists a neighbor more than once",
                    i
                )));
            }
            if let Some(&j) = neighbors.iter().find(|&&j| j >= n) {
                return Err(ContagionError::invalid(format!(
                    "institution {} links to {} which is out of range [0, {})",
                    i, j, n
                )));
            }
            if neighbors.binary_search(&i).is_ok() {
                return Err(ContagionError::invalid(format!("self-loop on institution {}", i)));
            }
        }

        for (i, neighbors) in adjacency.iter().enumerate() {
            for &j in neighbors {
                if adjacency[j].binary_search(&i).is_err() {
                    return Err(ContagionError::invalid(format!(
                        "edge {} -> {} has no reverse edge",
                        i, j
                    )));
                }
            }
        }

        Ok(Self { adjacency, buffers })
    }

    /// Builds a network of `buffers.len()` institutions from an edge list.
    pub fn from_edges(edges: &[(usize, usize)], buffers: Vec<f64>) -> Result<Self> {
        let n = buffers.len();
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(ContagionError::invalid(format!(
                    "edge ({}, {}) is out of range [0, {})",
                    a, b, n
                )));
            }
            if a == b {
                return Err(ContagionError::invalid(format!("self-loop on institution {}", a)));
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        Self::new(adjacency, buffers)
    }

    /// Draws a random network from `rng`.
    pub fn generate_with_rng(
        n: usize,
        edge_probability: f64,
        buffer_range: (f64, f64),
        rng: &mut impl Rng,
    ) -> Result<Self> {
        validate_generator_params(n, edge_probability, buffer_range)?;

        let edge = Bernoulli::new(edge_probability)
            .map_err(|e| ContagionError::invalid(format!("edge probability: {}", e)))?;
        let buffer = Uniform::new(buffer_range.0, buffer_range.1);

        let mut adjacency = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                if edge.sample(rng) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        let buffers: Vec<f64> = (0..n).map(|_| buffer.sample(rng)).collect();

        let network = Self { adjacency, buffers };
        debug!(
            institutions = n,
            edges = network.edge_count(),
            isolated = network.isolated_count(),
            "generated network"
        );
        Ok(network)
    }

    /// Returns a copy with every buffer multiplied by `factor`.
    pub fn with_scaled_buffers(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ContagionError::invalid(format!(
                "buffer scale must be positive and finite, got {}",
                factor
            )));
        }
        Ok(Self {
            adjacency: self.adjacency.clone(),
            buffers: self.buffers.iter().map(|b| b * factor).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }

    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjacency[i]
    }

    pub fn buffer(&self, i: usize) -> f64 {
        self.buffers[i]
    }

    pub fn buffers(&self) -> &[f64] {
        &self.buffers
    }

    pub fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        a < self.len() && self.adjacency[a].binary_search(&b).is_ok()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn isolated_count(&self) -> usize {
        self.adjacency.iter().filter(|a| a.is_empty()).count()
    }

    /// Loss a failed institution passes to each neighbor: its whole buffer
    /// split evenly across its links. Zero for isolated institutions.
    pub fn loss_per_link(&self, i: usize) -> f64 {
        match self.degree(i) {
            0 => 0.0,
            d => self.buffers[i] / d as f64,
        }
    }
}

/// Generates a network, seeded when `rng_seed` is given and from OS
/// entropy otherwise.
pub fn generate(
    n: usize,
    edge_probability: f64,
    buffer_range: (f64, f64),
    rng_seed: Option<u64>,
) -> Result<Network> {
    let mut rng = match rng_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    Network::generate_with_rng(n, edge_probability, buffer_range, &mut rng)
}

pub(crate) fn validate_generator_params(
    n: usize,
    edge_probability: f64,
    buffer_range: (f64, f64),
) -> Result<()> {
    if n < 1 {
        return Err(ContagionError::invalid("n must be at least 1"));
    }
    if !(edge_probability > 0.0 && edge_probability <= 1.0) {
        return Err(ContagionError::invalid(format!(
            "edge probability must lie in (0, 1], got {}",
            edge_probability
        )));
    }
    let (low, high) = buffer_range;
    if !(low.is_finite() && high.is_finite()) || low < 0.0 || low >= high {
        return Err(ContagionError::invalid(format!(
            "buffer range must satisfy 0 <= low < high, got ({}, {})",
            low, high
        )));
    }
    Ok(())
}
