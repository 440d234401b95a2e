//! Failure Cascade Engine
//!
//! Propagates institution failures through an exposure network in
//! synchronous rounds until a round produces no new failures.
//!
//! ## Cascade Mechanics
//! 1. Round 0: the shocked institutions are marked Failed
//! 2. Round r: every institution that failed in round r-1 splits its whole
//!    buffer evenly across its links and passes one share to each neighbor
//!    that has not failed yet
//! 3. A neighbor whose accumulated loss reaches its buffer fails in round r
//!    and transmits in round r+1; a smaller positive loss leaves it Stressed
//! 4. Stop when a round adds no failures (at most `n` such rounds)
//!
//! ## Circuit Breaker
//! With the breaker enabled, an institution freezes once its accumulated
//! loss reaches `freeze_threshold * buffer`. A freeze takes effect from the
//! round after it triggers: an institution that was already frozen when it
//! failed transmits nothing, while one that freezes in the same round it
//! fails still delivers the loss staged by that failure. `is_silenced`
//! deliberately compares `frozen < failed` so a same-round freeze never
//! cancels a loss that was already staged.
//!
//! ## Rounding
//! Buffer and freeze comparisons allow a relative slack of `LOSS_TOLERANCE`,
//! so a sum of shares that equals a buffer in exact arithmetic counts as
//! reaching it at any buffer scale.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{ContagionError, Result};
use crate::network::Network;

pub const DEFAULT_FREEZE_THRESHOLD: f64 = 0.5;

/// Relative slack applied when comparing accumulated loss to a level.
pub const LOSS_TOLERANCE: f64 = 1e-12;

fn reaches(loss: f64, level: f64) -> bool {
    loss >= level - LOSS_TOLERANCE * level
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Solvent,
    Stressed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeOptions {
    pub enable_circuit_breaker: bool,
    /// Fraction of the buffer at which an institution freezes, in (0, 1].
    pub freeze_threshold: f64,
    /// Cap on evaluated rounds, counting the final quiet round.
    pub max_rounds: Option<usize>,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            enable_circuit_breaker: false,
            freeze_threshold: DEFAULT_FREEZE_THRESHOLD,
            max_rounds: None,
        }
    }
}

impl CascadeOptions {
    pub fn with_circuit_breaker(mut self, enabled: bool) -> Self {
        self.enable_circuit_breaker = enabled;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.freeze_threshold > 0.0 && self.freeze_threshold <= 1.0) {
            return Err(ContagionError::invalid(format!(
                "freeze threshold must lie in (0, 1], got {}",
                self.freeze_threshold
            )));
        }
        if self.max_rounds == Some(0) {
            return Err(ContagionError::invalid("max_rounds must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Institution {
    buffer: f64,
    status: Status,
    accumulated_loss: f64,
    failed_round: Option<usize>,
    frozen_round: Option<usize>,
}

impl Institution {
    fn new(buffer: f64) -> Self {
        Self {
            buffer,
            status: Status::Solvent,
            accumulated_loss: 0.0,
            failed_round: None,
            frozen_round: None,
        }
    }

    fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// Frozen strictly before the round it failed in.
    fn is_silenced(&self) -> bool {
        match (self.frozen_round, self.failed_round) {
            (Some(frozen), Some(failed)) => frozen < failed,
            _ => false,
        }
    }
}

struct CascadeSimulation<'a> {
    network: &'a Network,
    options: &'a CascadeOptions,
    institutions: Vec<Institution>,
    rounds: Vec<Vec<usize>>,
    round_losses: Vec<f64>,
}

impl<'a> CascadeSimulation<'a> {
    fn new(network: &'a Network, initial_failed: &[usize], options: &'a CascadeOptions) -> Result<Self> {
        options.validate()?;

        let n = network.len();
        if initial_failed.is_empty() {
            return Err(ContagionError::invalid("initial_failed must not be empty"));
        }
        if let Some(&bad) = initial_failed.iter().find(|&&i| i >= n) {
            return Err(ContagionError::invalid(format!(
                "initial failure {} is out of range [0, {})",
                bad, n
            )));
        }

        let mut shock = initial_failed.to_vec();
        shock.sort_unstable();
        shock.dedup();

        let mut institutions: Vec<Institution> =
            network.buffers().iter().map(|&b| Institution::new(b)).collect();
        for &i in &shock {
            institutions[i].status = Status::Failed;
            institutions[i].failed_round = Some(0);
        }

        Ok(Self {
            network,
            options,
            institutions,
            rounds: vec![shock],
            round_losses: vec![0.0],
        })
    }

    /// Runs one propagation round and returns the newly failed institutions.
    fn run_round(&mut self, round: usize) -> Vec<usize> {
        let n = self.network.len();
        let mut incoming = vec![0.0; n];
        let mut delivered = 0.0;

        for &source in &self.rounds[round - 1] {
            if self.options.enable_circuit_breaker && self.institutions[source].is_silenced() {
                trace!(round, institution = source, "frozen source transmits nothing");
                continue;
            }
            let share = self.network.loss_per_link(source);
            if share == 0.0 {
                continue;
            }
            for &target in self.network.neighbors(source) {
                if !self.institutions[target].is_failed() {
                    incoming[target] += share;
                    delivered += share;
                }
            }
        }

        let mut newly_failed = Vec::new();
        for (j, &loss) in incoming.iter().enumerate() {
            if loss <= 0.0 {
                continue;
            }
            let inst = &mut self.institutions[j];
            inst.accumulated_loss += loss;
            if reaches(inst.accumulated_loss, inst.buffer) {
                inst.status = Status::Failed;
                inst.failed_round = Some(round);
                newly_failed.push(j);
                trace!(round, institution = j, loss = inst.accumulated_loss, "institution failed");
            } else {
                inst.status = Status::Stressed;
            }
        }

        if self.options.enable_circuit_breaker {
            let threshold = self.options.freeze_threshold;
            for (j, inst) in self.institutions.iter_mut().enumerate() {
                if inst.frozen_round.is_none()
                    && inst.accumulated_loss > 0.0
                    && reaches(inst.accumulated_loss, threshold * inst.buffer)
                {
                    inst.frozen_round = Some(round);
                    trace!(round, institution = j, "circuit breaker froze institution");
                }
            }
        }

        self.round_losses.push(delivered);
        debug!(round, new_failures = newly_failed.len(), delivered, "cascade round");
        newly_failed
    }

    fn run(mut self) -> Result<CascadeResult> {
        let mut round = 1;
        loop {
            if let Some(max_rounds) = self.options.max_rounds {
                if round > max_rounds {
                    return Err(ContagionError::NonConvergence { max_rounds });
                }
            }
            let newly_failed = self.run_round(round);
            if newly_failed.is_empty() {
                break;
            }
            self.rounds.push(newly_failed);
            round += 1;
        }

        let result = CascadeResult {
            rounds: self.rounds,
            statuses: self.institutions.iter().map(|i| i.status).collect(),
            accumulated_loss: self.institutions.iter().map(|i| i.accumulated_loss).collect(),
            frozen: self.institutions.iter().map(|i| i.frozen_round.is_some()).collect(),
            round_losses: self.round_losses,
        };
        info!(
            failures = result.total_failures(),
            depth = result.cascade_depth(),
            stressed = result.stressed_count(),
            "cascade settled"
        );
        Ok(result)
    }
}

/// Outcome of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeResult {
    /// Failures per round, ascending. Index 0 is the initial shock.
    pub rounds: Vec<Vec<usize>>,
    pub statuses: Vec<Status>,
    pub accumulated_loss: Vec<f64>,
    /// Whether the circuit breaker froze each institution.
    pub frozen: Vec<bool>,
    /// Loss delivered in each evaluated round, including the final quiet
    /// round. Index 0 is the shock and carries no loss.
    pub round_losses: Vec<f64>,
}

impl CascadeResult {
    pub fn total_failures(&self) -> usize {
        self.rounds.iter().map(Vec::len).sum()
    }

    /// Number of rounds after the shock that produced failures.
    pub fn cascade_depth(&self) -> usize {
        self.rounds.len() - 1
    }

    pub fn failures_per_round(&self) -> Vec<usize> {
        self.rounds.iter().map(Vec::len).collect()
    }

    pub fn stressed_count(&self) -> usize {
        self.statuses.iter().filter(|&&s| s == Status::Stressed).count()
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen.iter().filter(|&&f| f).count()
    }

    pub fn failure_fraction(&self) -> f64 {
        self.total_failures() as f64 / self.statuses.len() as f64
    }

    pub fn is_systemic_collapse(&self) -> bool {
        self.total_failures() == self.statuses.len()
    }

    pub fn is_contained(&self) -> bool {
        self.cascade_depth() == 0
    }

    pub fn print_trace(&self) {
        for (round, failed) in self.rounds.iter().enumerate() {
            let label = if round == 0 { "shock".to_string() } else { format!("round {}", round) };
            println!("  {:9} {:3} failed  {:?}", label, failed.len(), failed);
        }
        println!();
        println!("  Total failures:          {} / {}", self.total_failures(), self.statuses.len());
        println!("  Cascade depth:           {} rounds", self.cascade_depth());
        println!("  Stressed survivors:      {}", self.stressed_count());
        println!("  Frozen by breaker:       {}", self.frozen_count());
    }
}

/// Runs the cascade from `initial_failed` to its fixed point.
pub fn run_cascade(
    network: &Network,
    initial_failed: &[usize],
    options: &CascadeOptions,
) -> Result<CascadeResult> {
    CascadeSimulation::new(network, initial_failed, options)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(buffers: Vec<f64>) -> Network {
        Network::from_edges(&[(0, 1), (1, 2), (2, 3), (3, 4)], buffers).unwrap()
    }

    #[test]
    fn test_path_cascade_halts_at_stressed_node() {
        let net = path(vec![1.0; 5]);
        let result = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();

        assert_eq!(result.rounds, vec![vec![0], vec![1]]);
        assert_eq!(
            result.statuses,
            vec![Status::Failed, Status::Failed, Status::Stressed, Status::Solvent, Status::Solvent]
        );
        assert!((result.accumulated_loss[1] - 1.0).abs() < 1e-12);
        assert!((result.accumulated_loss[2] - 0.5).abs() < 1e-12);
        assert_eq!(result.accumulated_loss[3], 0.0);
        assert_eq!(result.accumulated_loss[4], 0.0);
        assert_eq!(result.total_failures(), 2);
    }

    #[test]
    fn test_path_cascade_with_weak_tail() {
        let net = path(vec![1.0, 1.0, 0.4, 0.4, 0.4]);
        let result = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();

        assert_eq!(result.rounds, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(result.statuses[3], Status::Stressed);
        assert_eq!(result.statuses[4], Status::Solvent);
        assert!((result.accumulated_loss[3] - 0.2).abs() < 1e-12);
        assert_eq!(result.cascade_depth(), 2);
        assert_eq!(result.round_losses.len(), 4);
        assert!((result.round_losses[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_breaker_keeps_loss_staged_in_failure_round() {
        let net = path(vec![1.0, 1.0, 0.4, 0.4, 0.4]);
        let options = CascadeOptions::default().with_circuit_breaker(true);
        let result = run_cascade(&net, &[0], &options).unwrap();

        assert_eq!(result.rounds, vec![vec![0], vec![1], vec![2]]);
        assert!(result.frozen[1]);
        assert!(result.frozen[2]);
        assert!(!result.frozen[0]);
        assert!(!result.frozen[4]);
    }

    #[test]
    fn test_breaker_silences_institution_frozen_before_failing() {
        // 2 is stressed past half its buffer in round 1 and fails in round 2.
        let net = Network::from_edges(
            &[(0, 2), (5, 1), (1, 2), (2, 3)],
            vec![0.6, 1.0, 1.0, 0.3, 1.0, 1.0],
        )
        .unwrap();

        let open = run_cascade(&net, &[0, 5], &CascadeOptions::default()).unwrap();
        assert_eq!(open.rounds, vec![vec![0, 5], vec![1], vec![2], vec![3]]);

        let options = CascadeOptions::default().with_circuit_breaker(true);
        let guarded = run_cascade(&net, &[0, 5], &options).unwrap();
        assert_eq!(guarded.rounds, vec![vec![0, 5], vec![1], vec![2]]);
        assert_eq!(guarded.statuses[3], Status::Solvent);
        assert_eq!(guarded.accumulated_loss[3], 0.0);
        assert_eq!(guarded.statuses[4], Status::Solvent);
    }

    #[test]
    fn test_simultaneous_shocks_sum_in_round_one() {
        let net = Network::from_edges(&[(0, 2), (1, 2)], vec![0.5, 0.5, 1.0]).unwrap();

        let single = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();
        assert_eq!(single.statuses[2], Status::Stressed);

        let double = run_cascade(&net, &[1, 0], &CascadeOptions::default()).unwrap();
        assert_eq!(double.rounds, vec![vec![0, 1], vec![2]]);
        assert!((double.accumulated_loss[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rounded_share_sum_reaches_buffer() {
        // 0.1 + 0.1 + 0.7 rounds to just below 0.9.
        let net = Network::from_edges(&[(0, 3), (1, 3), (2, 3)], vec![0.1, 0.1, 0.7, 0.9]).unwrap();
        let options = CascadeOptions::default();

        let base = run_cascade(&net, &[0, 1, 2], &options).unwrap();
        assert_eq!(base.rounds, vec![vec![0, 1, 2], vec![3]]);

        for factor in [1.7, 5.0, 10.0] {
            let scaled = net.with_scaled_buffers(factor).unwrap();
            let result = run_cascade(&scaled, &[0, 1, 2], &options).unwrap();
            assert_eq!(result.total_failures(), base.total_failures());
        }
    }

    #[test]
    fn test_rounded_share_sum_reaches_freeze_threshold() {
        // 3 takes 0.1 + 0.1 + 0.7 against a 1.8 buffer: exactly half.
        let net = Network::from_edges(&[(0, 3), (1, 3), (2, 3)], vec![0.1, 0.1, 0.7, 1.8]).unwrap();
        let options = CascadeOptions::default().with_circuit_breaker(true);
        let result = run_cascade(&net, &[0, 1, 2], &options).unwrap();

        assert_eq!(result.statuses[3], Status::Stressed);
        assert!(result.frozen[3]);
    }

    #[test]
    fn test_isolated_shock_propagates_nothing() {
        let net = Network::from_edges(&[(1, 2)], vec![1.0, 0.1, 0.1]).unwrap();
        let result = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();

        assert_eq!(result.rounds, vec![vec![0]]);
        assert!(result.is_contained());
        assert_eq!(result.statuses[1], Status::Solvent);
        assert_eq!(result.statuses[2], Status::Solvent);
    }

    #[test]
    fn test_zero_buffer_isolated_institution_survives() {
        let net = Network::from_edges(&[(0, 1)], vec![1.0, 1.0, 0.0]).unwrap();
        let result = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();
        assert_eq!(result.statuses[2], Status::Solvent);
    }

    #[test]
    fn test_duplicate_shocks_collapse() {
        let net = path(vec![1.0; 5]);
        let result = run_cascade(&net, &[0, 0], &CascadeOptions::default()).unwrap();
        assert_eq!(result.rounds[0], vec![0]);
    }

    #[test]
    fn test_full_collapse_on_complete_graph() {
        let edges: Vec<(usize, usize)> =
            (0..4).flat_map(|i| ((i + 1)..4).map(move |j| (i, j))).collect();
        let net = Network::from_edges(&edges, vec![3.0, 1.0, 1.0, 1.0]).unwrap();
        let result = run_cascade(&net, &[0], &CascadeOptions::default()).unwrap();

        assert!(result.is_systemic_collapse());
        assert_eq!(result.rounds, vec![vec![0], vec![1, 2, 3]]);
        assert!((result.failure_fraction() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_shock_sets() {
        let net = path(vec![1.0; 5]);
        let options = CascadeOptions::default();
        assert!(matches!(
            run_cascade(&net, &[], &options),
            Err(ContagionError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            run_cascade(&net, &[5], &options),
            Err(ContagionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_options() {
        let net = path(vec![1.0; 5]);
        let zero_cap = CascadeOptions::default().with_max_rounds(0);
        assert!(run_cascade(&net, &[0], &zero_cap).is_err());

        let bad_threshold = CascadeOptions { freeze_threshold: 1.5, ..Default::default() };
        assert!(run_cascade(&net, &[0], &bad_threshold).is_err());
    }

    #[test]
    fn test_round_cap_reports_non_convergence() {
        let net = path(vec![1.0, 1.0, 0.4, 0.4, 0.4]);

        let capped = CascadeOptions::default().with_max_rounds(2);
        assert!(matches!(
            run_cascade(&net, &[0], &capped),
            Err(ContagionError::NonConvergence { max_rounds: 2 })
        ));

        let enough = CascadeOptions::default().with_max_rounds(3);
        assert!(run_cascade(&net, &[0], &enough).is_ok());
    }
}
