//! Ordered application of propagation modules to particles.
//!
//! Each pipeline iteration for an active particle:
//!
//! 1. Collects a step length proposal from the stepper, every interaction
//!    process acting on the particle, the observer and the remaining
//!    trajectory budget, bounded by the configured maximum step length.
//! 2. Takes the minimum proposal as the step limit and lets the stepper
//!    advance the particle by at most that length.
//! 3. Updates redshift and applies adiabatic losses for the realized length.
//! 4. Applies every interaction process in turn against the realized length.
//! 5. Wraps the particle back into the periodic box.
//! 6. Checks the termination criteria.
//! 7. Lets the observer check for detection.
//!
//! Termination is checked before detection, so a particle that falls below
//! the energy floor is never recorded, even when it sits inside the
//! observer sphere.

use crate::{
    boundary::PeriodicBoundary,
    constants::{EEV_TO_J, MPC_TO_M},
    error::{ensure, PropagationError, PropagationResult},
    field::FieldSampler,
    fpr,
    geometry::In3D,
    interaction::InteractionProcess,
    io::Verbosity,
    observer::{DetectionRecord, Observer, ObserverConfig},
    particle::{ParticleState, TerminationCause},
    stepping::{redshift::RedshiftEvolution, Stepper},
};
use rand::RngCore;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for the module pipeline.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PipelineConfig {
    /// Upper bound on every step length [m].
    pub max_step_length: fpr,
    /// Particles with lower energy are terminated [J].
    pub min_energy: fpr,
    /// Particles with lower redshift are terminated.
    pub min_redshift: fpr,
    /// Particles with higher redshift are terminated.
    pub max_redshift: fpr,
    /// Particles travelling further than this are terminated [m].
    pub max_trajectory_length: fpr,
    /// Largest number of particles, including the primary, allowed in one branch.
    pub max_branch_particles: usize,
}

impl PipelineConfig {
    pub const DEFAULT_MAX_STEP_LENGTH: fpr = 1.0 * MPC_TO_M;
    pub const DEFAULT_MIN_ENERGY: fpr = 1.0 * EEV_TO_J;
    pub const DEFAULT_MIN_REDSHIFT: fpr = fpr::NEG_INFINITY;
    pub const DEFAULT_MAX_REDSHIFT: fpr = fpr::INFINITY;
    pub const DEFAULT_MAX_TRAJECTORY_LENGTH: fpr = 10_000.0 * MPC_TO_M;
    pub const DEFAULT_MAX_BRANCH_PARTICLES: usize = 100_000;

    /// Returns an error if any of the configuration parameter values are invalid.
    pub fn validate(&self) -> PropagationResult<()> {
        ensure(
            self.max_step_length > 0.0,
            "Maximum step length must be larger than zero",
        )?;
        ensure(
            self.min_energy >= 0.0,
            "Minimum energy must be non-negative",
        )?;
        ensure(
            !self.min_redshift.is_nan() && !self.max_redshift.is_nan(),
            "Redshift limits cannot be NaN",
        )?;
        ensure(
            self.min_redshift <= self.max_redshift,
            format!(
                "Minimum redshift ({}) cannot exceed maximum redshift ({})",
                self.min_redshift, self.max_redshift
            ),
        )?;
        ensure(
            self.max_trajectory_length > 0.0,
            "Maximum trajectory length must be larger than zero",
        )?;
        ensure(
            self.max_branch_particles > 0,
            "Maximum number of particles per branch must be larger than zero",
        )
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_step_length: Self::DEFAULT_MAX_STEP_LENGTH,
            min_energy: Self::DEFAULT_MIN_ENERGY,
            min_redshift: Self::DEFAULT_MIN_REDSHIFT,
            max_redshift: Self::DEFAULT_MAX_REDSHIFT,
            max_trajectory_length: Self::DEFAULT_MAX_TRAJECTORY_LENGTH,
            max_branch_particles: Self::DEFAULT_MAX_BRANCH_PARTICLES,
        }
    }
}

/// Summary of one pipeline iteration.
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Minimum of all step length proposals [m].
    pub step_limit: fpr,
    /// Length actually travelled [m].
    pub realized_length: fpr,
    /// Number of processes that acted on the particle.
    pub n_interactions: usize,
    /// Wraps performed by the periodic boundary.
    pub wraps: In3D<i64>,
    /// Secondaries created during the step.
    pub secondaries: Vec<ParticleState>,
    /// Record of the detection, if the particle was detected.
    pub detection: Option<DetectionRecord>,
}

/// Summary of the propagation of a primary and all its secondaries.
#[derive(Clone, Debug, Default)]
pub struct BranchSummary {
    /// Number of particles in the branch, including the primary.
    pub n_particles: usize,
    pub n_steps: u64,
    pub n_detections: usize,
    /// Number of particles terminated for each cause, indexed by `TerminationCause::idx`.
    pub terminations: [usize; 7],
    /// Whether the branch was dropped for exceeding the particle cap.
    pub dropped: bool,
    /// Whether propagation was aborted before the branch completed.
    pub aborted: bool,
}

/// Assembles a `ModulePipeline`.
pub struct PipelineBuilder {
    config: PipelineConfig,
    stepper: Box<dyn Stepper>,
    field: Arc<dyn FieldSampler>,
    redshift_evolution: Option<RedshiftEvolution>,
    processes: Vec<Box<dyn InteractionProcess>>,
    boundary: Option<PeriodicBoundary>,
    observer_config: Option<ObserverConfig>,
    verbosity: Verbosity,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig, stepper: Box<dyn Stepper>, field: Arc<dyn FieldSampler>) -> Self {
        Self {
            config,
            stepper,
            field,
            redshift_evolution: None,
            processes: Vec::new(),
            boundary: None,
            observer_config: None,
            verbosity: Verbosity::Quiet,
        }
    }

    pub fn redshift_evolution(mut self, redshift_evolution: RedshiftEvolution) -> Self {
        self.redshift_evolution = Some(redshift_evolution);
        self
    }

    /// Appends an interaction process. Processes are applied in the order they were added.
    pub fn process(mut self, process: Box<dyn InteractionProcess>) -> Self {
        self.processes.push(process);
        self
    }

    pub fn periodic_boundary(mut self, boundary: PeriodicBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn observer(mut self, config: ObserverConfig) -> Self {
        self.observer_config = Some(config);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validates the configuration and creates the pipeline.
    ///
    /// # Returns
    ///
    /// A `PropagationResult` which is either:
    ///
    /// - `Ok`: Contains the new pipeline.
    /// - `Err`: Contains an `InvalidConfiguration` error, for example if a
    ///   periodic boundary is combined with a field that is not periodic
    ///   with the same box.
    pub fn build(self) -> PropagationResult<ModulePipeline> {
        self.config.validate()?;
        if let Some(boundary) = &self.boundary {
            ensure(
                self.field.is_periodic_with(boundary.bounds()),
                "The field must be periodic with the periodic boundary box",
            )?;
        }
        let observer = self
            .observer_config
            .map(|config| Observer::new(config, self.boundary.as_ref()))
            .transpose()?;
        Ok(ModulePipeline {
            config: self.config,
            stepper: self.stepper,
            field: self.field,
            redshift_evolution: self.redshift_evolution,
            processes: self.processes,
            boundary: self.boundary,
            observer,
            verbosity: self.verbosity,
        })
    }
}

/// Drives particles through the stepper, redshift evolution, interaction
/// processes, periodic boundary, termination checks and observer.
///
/// The pipeline holds only immutable data while propagating, so it can be
/// shared between worker threads.
pub struct ModulePipeline {
    config: PipelineConfig,
    stepper: Box<dyn Stepper>,
    field: Arc<dyn FieldSampler>,
    redshift_evolution: Option<RedshiftEvolution>,
    processes: Vec<Box<dyn InteractionProcess>>,
    boundary: Option<PeriodicBoundary>,
    observer: Option<Observer>,
    verbosity: Verbosity,
}

impl ModulePipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn observer(&self) -> Option<&Observer> {
        self.observer.as_ref()
    }

    pub fn boundary(&self) -> Option<&PeriodicBoundary> {
        self.boundary.as_ref()
    }

    /// Returns the names of the interaction processes in application order.
    pub fn process_names(&self) -> Vec<String> {
        self.processes.iter().map(|process| process.name()).collect()
    }

    /// Returns the minimum of all step length proposals for the particle.
    pub fn step_limit(&self, particle: &ParticleState) -> fpr {
        let mut limit = self
            .config
            .max_step_length
            .min(self.stepper.propose_step_limit(particle))
            .min(self.config.max_trajectory_length - particle.trajectory_length);
        for process in self.processes.iter() {
            if process.acts_on(particle) {
                limit = limit.min(process.propose_step_limit(particle));
            }
        }
        if let Some(observer) = &self.observer {
            if observer.redshift_in_window(particle.redshift) {
                limit = limit.min(observer.propose_step_limit(particle));
            }
        }
        limit
    }

    /// Wraps a newly emitted particle into the box and checks whether it
    /// should be terminated before taking any steps.
    pub fn prepare(&self, particle: &mut ParticleState) {
        if let Some(boundary) = &self.boundary {
            boundary.wrap(particle);
        }
        self.check_termination(particle);
    }

    /// Performs one pipeline iteration on an active particle.
    ///
    /// # Returns
    ///
    /// A `PropagationResult` which is either:
    ///
    /// - `Ok`: Contains a `StepReport` for the iteration.
    /// - `Err`: Contains the `NumericalDivergence` error from the stepper.
    ///   The particle is terminated with the corresponding cause.
    pub fn step(
        &self,
        particle: &mut ParticleState,
        primary_index: u64,
        rng: &mut dyn RngCore,
    ) -> PropagationResult<StepReport> {
        let step_limit = self.step_limit(particle);

        let outcome = match self.stepper.advance(particle, step_limit, self.field.as_ref()) {
            Ok(outcome) => outcome,
            Err(err) => {
                particle.terminate(TerminationCause::NumericalDivergence);
                return Err(err);
            }
        };
        let realized_length = outcome.length;
        particle.step_count += 1;

        if let Some(redshift_evolution) = &self.redshift_evolution {
            redshift_evolution.apply(particle, realized_length);
        }

        let mut n_interactions = 0;
        let mut secondaries = Vec::new();
        for process in self.processes.iter() {
            if !process.acts_on(particle) {
                continue;
            }
            let interaction = process.apply(particle, realized_length, rng);
            debug_assert!(
                particle.energy >= 0.0,
                "{} produced negative energy",
                process.name()
            );
            if interaction.occurred() {
                n_interactions += 1;
                secondaries.extend(interaction.into_secondaries());
            }
        }

        let wraps = match &self.boundary {
            Some(boundary) => {
                let wraps = boundary.wrap(particle);
                for secondary in secondaries.iter_mut() {
                    boundary.wrap(secondary);
                }
                wraps
            }
            None => In3D::same(0),
        };

        self.check_termination(particle);

        let detection = match &self.observer {
            Some(observer) if particle.is_active() => observer.check(particle, primary_index),
            _ => None,
        };

        Ok(StepReport {
            step_limit,
            realized_length,
            n_interactions,
            wraps,
            secondaries,
            detection,
        })
    }

    /// Terminates the particle if it violates any of the termination criteria.
    fn check_termination(&self, particle: &mut ParticleState) {
        if !particle.is_active() {
            return;
        }
        if particle.energy < self.config.min_energy || particle.energy <= 0.0 {
            particle.terminate(TerminationCause::EnergyCutoff);
        } else if particle.redshift < self.config.min_redshift
            || particle.redshift > self.config.max_redshift
        {
            particle.terminate(TerminationCause::RedshiftCutoff);
        } else if particle.trajectory_length >= self.config.max_trajectory_length {
            particle.terminate(TerminationCause::TrajectoryLimit);
        }
    }

    /// Propagates a primary and every secondary it spawns until all are
    /// terminated, passing detection records to `emit`.
    ///
    /// Particles are kept in an arena and processed in FIFO order from a
    /// queue of arena indices. The abort flag is polled before every
    /// iteration. A branch growing beyond the configured particle cap is
    /// dropped with a warning.
    pub fn propagate_branch<E>(
        &self,
        primary: ParticleState,
        primary_index: u64,
        rng: &mut dyn RngCore,
        abort: &AtomicBool,
        emit: &mut E,
    ) -> BranchSummary
    where
        E: FnMut(DetectionRecord),
    {
        let mut summary = BranchSummary::default();
        let mut arena = vec![primary];
        let mut queue = VecDeque::from([0]);
        arena[0].serial = 0;
        self.prepare(&mut arena[0]);

        'queue: while let Some(idx) = queue.pop_front() {
            loop {
                if abort.load(Ordering::Relaxed) {
                    summary.aborted = true;
                    break 'queue;
                }
                let particle = &mut arena[idx];
                if !particle.is_active() {
                    break;
                }

                let report = match self.step(particle, primary_index, rng) {
                    Ok(report) => report,
                    Err(err) => {
                        if self.verbosity.print_messages() {
                            eprintln!(
                                "Warning: Terminated {} (primary {}, serial {}): {}",
                                particle.species, primary_index, idx, err
                            );
                        }
                        break;
                    }
                };
                summary.n_steps += 1;

                if let Some(record) = report.detection {
                    summary.n_detections += 1;
                    emit(record);
                }

                if arena.len() + report.secondaries.len() > self.config.max_branch_particles {
                    let err = PropagationError::ResourceExhaustion {
                        particles: arena.len() + report.secondaries.len(),
                        cap: self.config.max_branch_particles,
                    };
                    if self.verbosity.print_messages() {
                        eprintln!(
                            "Warning: Dropped branch of primary {}: {}",
                            primary_index, err
                        );
                    }
                    summary.dropped = true;
                    break 'queue;
                }
                for mut secondary in report.secondaries {
                    secondary.serial = arena.len();
                    self.check_termination(&mut secondary);
                    queue.push_back(arena.len());
                    arena.push(secondary);
                }
            }
        }

        let remaining_cause = if summary.dropped {
            Some(TerminationCause::Dropped)
        } else if summary.aborted {
            Some(TerminationCause::Aborted)
        } else {
            None
        };
        for particle in arena.iter_mut() {
            if particle.is_active() {
                if let Some(cause) = remaining_cause {
                    particle.terminate(cause);
                }
            }
            if let Some(cause) = particle.termination_cause() {
                summary.terminations[cause.idx()] += 1;
            }
        }
        summary.n_particles = arena.len();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        boundary::BoundaryBox,
        field::{grid::GridField, uniform::UniformField},
        geometry::{Point3, Vec3},
        particle::Species,
        stepping::rectilinear::RectilinearStepper,
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            max_step_length: 10.0,
            min_energy: 0.0,
            max_trajectory_length: 1000.0,
            ..PipelineConfig::default()
        }
    }

    fn proton_at(position: Point3<fpr>) -> ParticleState {
        ParticleState::new(
            Species::proton(),
            1.0,
            position,
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        )
    }

    #[test]
    fn non_periodic_field_with_periodic_boundary_is_rejected() {
        let bounds = BoundaryBox::cube(10.0).unwrap();
        let field = GridField::from_fn(&bounds, In3D::same(4), |_| Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let result = PipelineBuilder::new(
            test_config(),
            Box::new(RectilinearStepper::default()),
            Arc::new(field),
        )
        .periodic_boundary(PeriodicBoundary::new(BoundaryBox::cube(15.0).unwrap()))
        .build();
        assert!(matches!(
            result,
            Err(PropagationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn trajectory_limit_is_reached_exactly() {
        let pipeline = PipelineBuilder::new(
            test_config(),
            Box::new(RectilinearStepper::default()),
            Arc::new(UniformField::zero()),
        )
        .build()
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let abort = AtomicBool::new(false);
        let summary = pipeline.propagate_branch(
            proton_at(Point3::origin()),
            0,
            &mut rng,
            &abort,
            &mut |_| {},
        );
        assert_eq!(summary.n_steps, 100);
        assert_eq!(summary.terminations[TerminationCause::TrajectoryLimit.idx()], 1);
    }

    #[test]
    fn abort_is_observed_before_stepping() {
        let pipeline = PipelineBuilder::new(
            test_config(),
            Box::new(RectilinearStepper::default()),
            Arc::new(UniformField::zero()),
        )
        .build()
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let abort = AtomicBool::new(true);
        let summary = pipeline.propagate_branch(
            proton_at(Point3::origin()),
            0,
            &mut rng,
            &abort,
            &mut |_| {},
        );
        assert!(summary.aborted);
        assert_eq!(summary.n_steps, 0);
        assert_eq!(summary.terminations[TerminationCause::Aborted.idx()], 1);
    }
}
