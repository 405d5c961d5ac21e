//! The recursive coevolution simulator: one loop-free attempt per draw
//! stream, wrapped in a rejection-sampling driver that conditions the
//! accepted symbiont tree on surviving to the present.
use crate::event::{CoevolutionRates, EventRates};
use crate::host::{HostTree, NodeId};
use crate::tree::{EventKind, SymbiontNode, SymbiontTree};
use anyhow::{bail, ensure};
use rand::Rng;
use rand_distr::{Exp, StandardNormal};
use std::collections::HashMap;

/// Cap on the events simulated within one attempt, guarding the recursion
/// against degenerate rate regimes.
const DEFAULT_MAX_EVENTS: u64 = 10_000;
/// Cap on the attempts rejected to whole-tree extinction before giving up.
const DEFAULT_MAX_ATTEMPTS: u64 = 100_000;

/// Bookkeeping owned by a single attempt. Fresh at the start of every retry,
/// discarded entirely on rejection, so no attempt ever observes another's
/// partial state.
#[derive(Clone, Debug, Default)]
struct AttemptState {
    associations: HashMap<String, String>,
    /// Running per-host-tip counters behind the `symbiont<i>.<k>` labels.
    symbiont_counts: Vec<u32>,
    extinct_count: u32,
    log_likelihood: f64,
    events: u64,
}

impl AttemptState {
    fn new(external_count: usize) -> Self {
        AttemptState {
            symbiont_counts: vec![0; external_count],
            ..Default::default()
        }
    }
}

/// An accepted simulation: the symbiont tree and the attempt bookkeeping
/// that survives it, owned by the caller from here on.
#[derive(Clone, Debug)]
pub struct Simulated {
    pub tree: SymbiontTree,
    /// Symbiont tip taxon to host tip taxon, one entry per surviving tip.
    pub associations: HashMap<String, String>,
    /// Accumulated log-probability of the host-switch target choices,
    /// `ln(1/candidates)` per switch.
    pub log_likelihood: f64,
    /// Attempts consumed, counting the accepted one.
    pub attempts: u64,
}

/// Fate of one simulated lineage.
enum Lineage {
    Extinct,
    Survived(SymbiontNode),
}

/// The attempt blew its event budget before reaching the present; rejected
/// like an ordinary extinction, distinct from a fatal inconsistency.
struct AttemptOverrun;

/// Combination rule for the two sub-lineages of a node: both survive and
/// become its children, one survives and replaces it, none survive and the
/// lineage is lost. No node ever keeps a single child.
fn combine(mut node: SymbiontNode, child1: Lineage, child2: Lineage) -> Lineage {
    match (child1, child2) {
        (Lineage::Survived(child1), Lineage::Survived(child2)) => {
            node.attach(child1, child2);
            Lineage::Survived(node)
        }
        (Lineage::Survived(only), Lineage::Extinct)
        | (Lineage::Extinct, Lineage::Survived(only)) => Lineage::Survived(only),
        (Lineage::Extinct, Lineage::Extinct) => Lineage::Extinct,
    }
}

/// A validated coevolution parameterization, reusable across host trees and
/// draw streams.
#[derive(Clone, Debug)]
pub struct Coevolution {
    rates: EventRates,
    clock_rate: f64,
    relaxed_stdev: Option<f64>,
    keep_extinctions: bool,
    annotate: bool,
    max_events: u64,
    max_attempts: u64,
    verbosity: u8,
}

impl Coevolution {
    pub fn new(
        rates: &CoevolutionRates,
        clock_rate: f64,
        relaxed_stdev: Option<f64>,
    ) -> anyhow::Result<Self> {
        //! Annotated simulation: event tags, per-node clock rates, host
        //! linkage, tip associations and the host-switch log-probability are
        //! all recorded. `relaxed_stdev` enables the lognormal relaxed clock.
        if let Some(stdev) = relaxed_stdev {
            ensure!(
                stdev.is_finite() && stdev >= 0.,
                "relaxed-clock stdev must be finite and non-negative, got {}",
                stdev
            );
        }
        Ok(Coevolution {
            rates: EventRates::new(rates, clock_rate)?,
            clock_rate,
            relaxed_stdev,
            keep_extinctions: false,
            annotate: true,
            max_events: DEFAULT_MAX_EVENTS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            verbosity: 0,
        })
    }

    pub fn topology_only(
        rates: &CoevolutionRates,
        clock_rate: f64,
    ) -> anyhow::Result<Self> {
        //! Same branching process, no bookkeeping: for when only the tree
        //! shape is required. Does not support the relaxed clock or kept
        //! extinctions.
        Ok(Coevolution {
            annotate: false,
            ..Coevolution::new(rates, clock_rate, None)?
        })
    }

    /// Keep lost lineages as labelled `extinct_symbiont<n>` leaves instead of
    /// splicing them out. Ignored in topology-only mode.
    pub fn keep_extinctions(mut self, keep: bool) -> Self {
        self.keep_extinctions = keep && self.annotate;
        self
    }

    pub fn max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Simulate from scratch: the origin lineage is the host root and the
    /// origin height is drawn past the root, redrawn on every attempt.
    pub fn simulate<R: Rng>(
        &self,
        host: &HostTree,
        rng: &mut R,
    ) -> anyhow::Result<Simulated> {
        let root_height = host.height_of(host.root());
        ensure!(
            root_height > 0.,
            "cannot draw an origin past a host root at height {}",
            root_height
        );
        self.rejection_sample(host, host.root(), None, rng)
    }

    /// Simulate from a given origin lineage and height, rejection-retrying
    /// until a symbiont tree survives to the present.
    pub fn simulate_from<R: Rng>(
        &self,
        host: &HostTree,
        origin: NodeId,
        origin_height: f64,
        rng: &mut R,
    ) -> anyhow::Result<Simulated> {
        ensure!(origin < host.node_count(), "origin {} out of bounds", origin);
        ensure!(
            origin_height.is_finite() && origin_height >= host.height_of(origin),
            "origin height {} below the origin lineage at {}",
            origin_height,
            host.height_of(origin)
        );
        if let Some(parent) = host.parent_of(origin) {
            // the origin lineage only exists below its parent's branch point
            ensure!(
                origin_height <= host.height_of(parent),
                "origin height {} above the branch point of lineage {} at {}",
                origin_height,
                origin,
                host.height_of(parent)
            );
        }
        self.rejection_sample(host, origin, Some(origin_height), rng)
    }

    /// One attempt, loop-free and deterministic given its draw stream.
    /// `None` when the whole tree went extinct or the event budget ran out.
    pub fn simulate_once<R: Rng>(
        &self,
        host: &HostTree,
        origin: NodeId,
        origin_height: f64,
        rng: &mut R,
    ) -> Option<Simulated> {
        let mut state = AttemptState::new(host.external_count());
        match self.simulate_lineage(host, origin, origin_height, &mut state, rng) {
            Ok(Lineage::Survived(root)) => Some(Simulated {
                tree: SymbiontTree::new(root),
                associations: state.associations,
                log_likelihood: state.log_likelihood,
                attempts: 1,
            }),
            Ok(Lineage::Extinct) | Err(AttemptOverrun) => None,
        }
    }

    fn rejection_sample<R: Rng>(
        &self,
        host: &HostTree,
        origin: NodeId,
        origin_height: Option<f64>,
        rng: &mut R,
    ) -> anyhow::Result<Simulated> {
        let root_height = host.height_of(host.root());
        for attempt in 1..=self.max_attempts {
            let height = match origin_height {
                Some(height) => height,
                // from scratch: a fresh origin past the root on every attempt
                None => {
                    let past_root = Exp::new(host.node_count() as f64 / root_height)
                        .expect("rate is finite and positive");
                    root_height + rng.sample(past_root)
                }
            };
            if let Some(mut simulated) = self.simulate_once(host, origin, height, rng) {
                simulated.attempts = attempt;
                if self.verbosity > 0 {
                    println!(
                        "accepted a symbiont tree with {} tips at attempt {}",
                        simulated.tree.external_count(),
                        attempt
                    );
                }
                return Ok(simulated);
            }
        }
        bail!(
            "no symbiont tree survived within {} attempts: extinction is near-certain under these rates",
            self.max_attempts
        )
    }

    fn simulate_lineage<R: Rng>(
        &self,
        host: &HostTree,
        host_node: NodeId,
        height: f64,
        state: &mut AttemptState,
        rng: &mut R,
    ) -> Result<Lineage, AttemptOverrun> {
        state.events += 1;
        if state.events > self.max_events {
            return Err(AttemptOverrun);
        }

        let rate = self.draw_clock_rate(rng);
        let event_height = height - self.rates.waiting_time(rng);
        let host_height = host.height_of(host_node);

        if host_height > event_height {
            // The host lineage speciates or terminates before the event.
            if host.is_external(host_node) {
                // Co-termination at the present: a labelled surviving tip.
                let mut leaf = self.node(host_height, EventKind::NoEvent, rate, host_node);
                if self.annotate {
                    let tip = host
                        .external_index(host_node)
                        .expect("external nodes are indexed");
                    state.symbiont_counts[tip] += 1;
                    let taxon = format!("symbiont{}.{}", tip + 1, state.symbiont_counts[tip]);
                    let host_taxon = host
                        .taxon_of(host_node)
                        .expect("host tips carry a taxon")
                        .to_string();
                    state.associations.insert(taxon.clone(), host_taxon);
                    leaf.taxon = Some(taxon);
                }
                return Ok(Lineage::Survived(leaf));
            }
            // Cospeciation: follow both host child lineages from the split.
            let children = host.children_of(host_node);
            let (left, right) = (children[0], children[1]);
            let child1 = self.simulate_lineage(host, left, host_height, state, rng)?;
            let child2 = self.simulate_lineage(host, right, host_height, state, rng)?;
            let node = self.node(host_height, EventKind::NoEvent, rate, host_node);
            return Ok(combine(node, child1, child2));
        }

        match self.rates.select_event(rng) {
            EventKind::Duplication => {
                let child1 =
                    self.simulate_lineage(host, host_node, event_height, state, rng)?;
                let child2 =
                    self.simulate_lineage(host, host_node, event_height, state, rng)?;
                let node = self.node(event_height, EventKind::Duplication, rate, host_node);
                Ok(combine(node, child1, child2))
            }
            EventKind::HostSwitch => {
                let child1 = if host.is_root(host_node) {
                    // a switch away from the root leaves the tracked tree
                    Lineage::Extinct
                } else {
                    let mut candidates = host.contemporaneous_lineages(event_height);
                    let occupied = candidates
                        .iter()
                        .position(|&candidate| candidate == host_node)
                        .unwrap_or_else(|| {
                            panic!(
                                "host lineage {} missing from the lineages contemporaneous at height {}",
                                host_node, event_height
                            )
                        });
                    candidates.swap_remove(occupied);
                    let new_host = candidates[rng.gen_range(0..candidates.len())];
                    if self.annotate {
                        state.log_likelihood -= (candidates.len() as f64).ln();
                    }
                    self.simulate_lineage(host, new_host, event_height, state, rng)?
                };
                let child2 =
                    self.simulate_lineage(host, host_node, event_height, state, rng)?;
                let node = self.node(event_height, EventKind::HostSwitch, rate, host_node);
                Ok(combine(node, child1, child2))
            }
            EventKind::Loss => {
                if self.keep_extinctions {
                    state.extinct_count += 1;
                    let mut leaf = self.node(event_height, EventKind::Loss, rate, host_node);
                    leaf.taxon = Some(format!("extinct_symbiont{}", state.extinct_count));
                    Ok(Lineage::Survived(leaf))
                } else {
                    Ok(Lineage::Extinct)
                }
            }
            EventKind::NoEvent => {
                unreachable!("the scheduler only selects duplication, host-switch or loss")
            }
        }
    }

    fn draw_clock_rate<R: Rng>(&self, rng: &mut R) -> f64 {
        match self.relaxed_stdev {
            Some(stdev) => {
                let gauss: f64 = rng.sample(StandardNormal);
                (self.clock_rate.ln() + stdev * gauss).exp()
            }
            None => self.clock_rate,
        }
    }

    fn node(&self, height: f64, event: EventKind, rate: f64, host: NodeId) -> SymbiontNode {
        if self.annotate {
            SymbiontNode::new(height, event, rate, Some(host))
        } else {
            SymbiontNode::new(height, EventKind::NoEvent, self.clock_rate, None)
        }
    }
}
