//! Simulation of the coevolutionary history of a symbiont lineage evolving on
//! a fixed host phylogeny.
//!
//! The simulator draws competing exponential waiting times for the three
//! coevolutionary events (duplication, host-switch, loss), lets the host tree
//! impose cospeciations, and assembles a binary symbiont tree together with
//! the symbiont-tip-to-host-tip associations. Attempts in which the whole
//! symbiont tree goes extinct are rejected and silently retried, so accepted
//! trees are conditioned on survival to the present.
//!
//! # Example
//! Simulate one synthetic dataset on a freshly generated host tree.
//! ```no_run
//! use cophy_sim::{Coevolution, CoevolutionRates, HostTree};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(26);
//! let host = HostTree::simulate_birth_death(10., 1., 0.5, &mut rng).unwrap();
//!
//! let rates = CoevolutionRates {
//!     duplication: 0.2,
//!     host_switch: 0.1,
//!     loss: 0.1,
//! };
//! let simulated = Coevolution::new(&rates, 1., None)
//!     .unwrap()
//!     .simulate(&host, &mut rng)
//!     .unwrap();
//!
//! println!("{}", simulated.tree.to_newick());
//! ```

/// Scheduling of the competing coevolutionary events.
pub mod event;
/// The fixed host phylogeny and its queries.
pub mod host;
/// The recursive lineage simulator and its rejection-sampling driver.
pub mod simulation;
/// Seeding of the downstream likelihood engine with initial host states.
pub mod states;
/// The simulated symbiont tree.
pub mod tree;

#[doc(inline)]
pub use crate::event::CoevolutionRates;
#[doc(inline)]
pub use crate::host::HostTree;
#[doc(inline)]
pub use crate::simulation::{Coevolution, Simulated};
#[doc(inline)]
pub use crate::tree::{EventKind, SymbiontTree};

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
