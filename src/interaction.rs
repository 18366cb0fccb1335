//! Stochastic and continuous interactions with photon backgrounds and
//! spontaneous decays.
//!
//! Every step follows a two-phase protocol. First each process proposes the
//! longest step over which its interaction probability stays small. The
//! pipeline takes the minimum over all proposals and takes the step, after
//! which every process is applied against the realized step length, one
//! after the other on the same particle.

pub mod decay;
pub mod energy_loss;
pub mod mean_free_path;
pub mod photo_disintegration;
pub mod photo_pion;

use crate::{
    error::PropagationError,
    fpr,
    particle::{ParticleState, Species},
};
use rand::{Rng, RngCore};
use std::{fmt, str::FromStr};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Result of applying a process over one step.
#[derive(Clone, Debug)]
pub enum InteractionOutcome {
    NoInteraction,
    Interaction {
        /// Energy removed from the particle [J].
        energy_loss: fpr,
        /// New species of the particle, if it changed.
        new_species: Option<Species>,
        /// Particles created in the interaction, to be propagated separately.
        secondaries: Vec<ParticleState>,
    },
}

impl InteractionOutcome {
    pub fn occurred(&self) -> bool {
        matches!(self, Self::Interaction { .. })
    }

    /// Moves out the created secondaries.
    pub fn into_secondaries(self) -> Vec<ParticleState> {
        match self {
            Self::NoInteraction => Vec::new(),
            Self::Interaction { secondaries, .. } => secondaries,
        }
    }
}

/// Defines the properties of an interaction process.
///
/// Processes hold only immutable data after construction, so a single
/// instance can be shared by all worker threads.
pub trait InteractionProcess: Sync + Send {
    /// Returns a descriptive name for the process.
    fn name(&self) -> String;

    /// Whether the process can affect the given particle at all.
    fn acts_on(&self, particle: &ParticleState) -> bool;

    /// Returns the longest step length over which the process can be
    /// applied while keeping its interaction probability small.
    fn propose_step_limit(&self, particle: &ParticleState) -> fpr;

    /// Decides whether the process acts on the particle within the given
    /// realized step length, and if so updates the particle in place.
    ///
    /// Implementations must never leave the particle with negative energy.
    fn apply(
        &self,
        particle: &mut ParticleState,
        length: fpr,
        rng: &mut dyn RngCore,
    ) -> InteractionOutcome;
}

/// Photon background that a process interacts with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum PhotonBackground {
    /// Cosmic microwave background.
    Cmb,
    /// Infrared and optical background of the named model.
    Irb(String),
}

impl fmt::Display for PhotonBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmb => write!(f, "CMB"),
            Self::Irb(model) => write!(f, "IRB_{}", model),
        }
    }
}

impl FromStr for PhotonBackground {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("cmb") {
            Ok(Self::Cmb)
        } else if let Some(model) = s.strip_prefix("IRB_").filter(|model| !model.is_empty()) {
            Ok(Self::Irb(model.to_string()))
        } else {
            Err(PropagationError::invalid(format!(
                "Unknown photon background {} (expected CMB or IRB_<model>)",
                s
            )))
        }
    }
}

/// Default fraction of the mean free path used as step limit.
pub const DEFAULT_STEP_LIMIT_FRACTION: fpr = 0.1;

/// Draws whether an interaction with the given mean free path happens
/// within the given length, using an exponentially distributed free path.
pub fn interaction_occurs(mean_free_path: fpr, length: fpr, rng: &mut dyn RngCore) -> bool {
    if !(mean_free_path.is_finite() && mean_free_path > 0.0) || length <= 0.0 {
        return false;
    }
    let uniform: fpr = rng.gen();
    -mean_free_path * (1.0 - uniform).ln() < length
}

/// Combines mean free paths of independent channels.
pub fn combine_mean_free_paths<I>(mean_free_paths: I) -> fpr
where
    I: IntoIterator<Item = fpr>,
{
    let rate: fpr = mean_free_paths
        .into_iter()
        .filter(|mean_free_path| *mean_free_path > 0.0)
        .map(fpr::recip)
        .sum();
    if rate > 0.0 {
        rate.recip()
    } else {
        fpr::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn interaction_probability_follows_exponential_law() {
        let mut rng = StdRng::seed_from_u64(42);
        let n_trials = 100_000;
        let n_interactions = (0..n_trials)
            .filter(|_| interaction_occurs(2.0, 1.0, &mut rng))
            .count();
        let expected = 1.0 - fpr::exp(-0.5);
        assert_relative_eq!(
            n_interactions as fpr / n_trials as fpr,
            expected,
            max_relative = 2e-2
        );
    }

    #[test]
    fn infinite_mean_free_path_never_interacts() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!interaction_occurs(fpr::INFINITY, 1e30, &mut rng));
        assert!(!interaction_occurs(1.0, 0.0, &mut rng));
    }

    #[test]
    fn mean_free_paths_combine_as_rates() {
        assert_relative_eq!(combine_mean_free_paths([2.0, 2.0]), 1.0);
        assert_eq!(combine_mean_free_paths([fpr::INFINITY]), fpr::INFINITY);
        assert_eq!(combine_mean_free_paths(Vec::new()), fpr::INFINITY);
    }

    #[test]
    fn backgrounds_are_parsed_from_names() {
        assert_eq!(
            "IRB_Gilmore12".parse::<PhotonBackground>().unwrap().to_string(),
            "IRB_Gilmore12"
        );
        assert_eq!("CMB".parse::<PhotonBackground>().unwrap().to_string(), "CMB");
        assert!("IRB_".parse::<PhotonBackground>().is_err());
    }
}
