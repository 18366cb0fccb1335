use approx::{assert_abs_diff_eq, assert_relative_eq};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sextant::{
    boundary::{BoundaryBox, PeriodicBoundary},
    constants::{EEV_TO_J, MPC_TO_M, NANOGAUSS_TO_T},
    cosmology::{FlatLambdaCdm, FlatLambdaCdmConfig, RedshiftMapping},
    field::{grid::GridField, uniform::UniformField, FieldSampler},
    fpr,
    geometry::{Dim3, In3D, Point3, Vec3},
    interaction::{
        decay::NuclearDecay,
        energy_loss::ContinuousEnergyLoss,
        mean_free_path::ConstantMeanFreePath,
        photo_disintegration::PhotoDisintegration,
        photo_pion::{PhotoPionProduction, PionSecondaries},
        InteractionOutcome, InteractionProcess, PhotonBackground,
    },
    observer::{DetectionRecord, ObserverConfig},
    particle::{ParticleState, Species, TerminationCause},
    pipeline::{BranchSummary, ModulePipeline, PipelineBuilder, PipelineConfig},
    stepping::{
        rectilinear::RectilinearStepper,
        redshift::{RedshiftEvolution, RedshiftEvolutionMode},
        rkf::{RKFStepper, RKFStepperConfig},
    },
};
use std::{
    f64::consts::PI,
    sync::{atomic::AtomicBool, Arc},
};

/// Process that never interacts.
struct Inert;

impl InteractionProcess for Inert {
    fn name(&self) -> String {
        "Inert".to_string()
    }

    fn acts_on(&self, _particle: &ParticleState) -> bool {
        true
    }

    fn propose_step_limit(&self, _particle: &ParticleState) -> fpr {
        fpr::INFINITY
    }

    fn apply(
        &self,
        _particle: &mut ParticleState,
        _length: fpr,
        _rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        InteractionOutcome::NoInteraction
    }
}

/// Process proposing a fixed step limit and removing a fixed fraction of
/// the energy on every step.
struct FixedLoss {
    step_limit: fpr,
    fraction: fpr,
}

impl InteractionProcess for FixedLoss {
    fn name(&self) -> String {
        "FixedLoss".to_string()
    }

    fn acts_on(&self, _particle: &ParticleState) -> bool {
        true
    }

    fn propose_step_limit(&self, _particle: &ParticleState) -> fpr {
        self.step_limit
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        _length: fpr,
        _rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        let energy_loss = self.fraction * particle.energy;
        particle.energy -= energy_loss;
        InteractionOutcome::Interaction {
            energy_loss,
            new_species: None,
            secondaries: Vec::new(),
        }
    }
}

/// Process splitting off two photons on every step.
struct Splitter;

impl InteractionProcess for Splitter {
    fn name(&self) -> String {
        "Splitter".to_string()
    }

    fn acts_on(&self, particle: &ParticleState) -> bool {
        particle.species.is_nucleus()
    }

    fn propose_step_limit(&self, _particle: &ParticleState) -> fpr {
        fpr::INFINITY
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        _length: fpr,
        _rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        let energy = 0.01 * particle.energy;
        particle.energy -= 2.0 * energy;
        InteractionOutcome::Interaction {
            energy_loss: 2.0 * energy,
            new_species: None,
            secondaries: vec![
                particle.spawn_secondary(Species::Photon, energy),
                particle.spawn_secondary(Species::Photon, energy),
            ],
        }
    }
}

/// Mapping with a constant redshift decrease per unit length.
struct ConstantRedshiftRate(fpr);

impl RedshiftMapping for ConstantRedshiftRate {
    fn redshift_after(&self, redshift: fpr, length: fpr) -> fpr {
        redshift - self.0 * length
    }

    fn distance_between(&self, redshift_1: fpr, redshift_2: fpr) -> fpr {
        (redshift_1 - redshift_2).abs() / self.0
    }

    fn redshift_at_distance(&self, distance: fpr) -> fpr {
        self.0 * distance
    }
}

fn proton(energy: fpr, position: Point3<fpr>, direction: Vec3<fpr>, redshift: fpr) -> ParticleState {
    ParticleState::new(Species::proton(), energy, position, direction, redshift)
}

fn propagate(
    pipeline: &ModulePipeline,
    primary: ParticleState,
    seed: u64,
) -> (BranchSummary, Vec<DetectionRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let abort = AtomicBool::new(false);
    let mut records = Vec::new();
    let summary = pipeline.propagate_branch(
        primary,
        0,
        &mut rng,
        &abort,
        &mut |record: DetectionRecord| records.push(record),
    );
    (summary, records)
}

#[test]
fn interactions_never_produce_negative_energy() {
    let mean_free_path = Arc::new(ConstantMeanFreePath::new(0.1 * MPC_TO_M).unwrap());
    let processes: Vec<Box<dyn InteractionProcess>> = vec![
        Box::new(
            PhotoPionProduction::new(PhotonBackground::Cmb, mean_free_path.clone()).with_secondaries(
                PionSecondaries {
                    photons: true,
                    neutrinos: true,
                    electrons: true,
                },
            ),
        ),
        Box::new(
            PhotoDisintegration::new(PhotonBackground::Cmb)
                .with_default_mean_free_path(mean_free_path.clone())
                .with_nucleon_secondaries(true),
        ),
        Box::new(ContinuousEnergyLoss::new(
            "ElectronPairProduction",
            PhotonBackground::Cmb,
            mean_free_path,
        )),
        Box::new(NuclearDecay::new().with_secondaries(true, true)),
    ];

    let mut rng = StdRng::seed_from_u64(11);
    for species in [
        Species::proton(),
        Species::neutron(),
        Species::nucleus(4, 2).unwrap(),
        Species::nucleus(56, 26).unwrap(),
    ] {
        let mut particle = ParticleState::new(
            species,
            100.0 * EEV_TO_J,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            0.5,
        );
        for _ in 0..200 {
            for process in processes.iter() {
                if !process.acts_on(&particle) {
                    continue;
                }
                let outcome = process.apply(&mut particle, 0.5 * MPC_TO_M, &mut rng);
                assert!(
                    particle.energy >= 0.0,
                    "{} left {} with negative energy",
                    process.name(),
                    particle.species
                );
                for secondary in outcome.into_secondaries() {
                    assert!(secondary.energy >= 0.0);
                }
            }
        }
    }
}

#[test]
fn wrapped_positions_sample_the_same_periodic_field() {
    let bounds = BoundaryBox::new(Point3::new(-4.0, 0.0, 2.0), Point3::new(4.0, 6.0, 5.0)).unwrap();
    let extents = bounds.extents();
    let field = GridField::from_fn(&bounds, In3D::new(16, 12, 6), |point| {
        Vec3::new(
            (2.0 * PI * point[Dim3::Y] / extents[Dim3::Y]).sin(),
            (2.0 * PI * point[Dim3::Z] / extents[Dim3::Z]).cos(),
            (2.0 * PI * point[Dim3::X] / extents[Dim3::X]).sin(),
        )
    })
    .unwrap();
    assert!(field.is_periodic_with(&bounds));
    let boundary = PeriodicBoundary::new(bounds.clone());

    let delta = 1e-3;
    for dim in Dim3::slice() {
        let mut beyond_upper = bounds.center();
        beyond_upper[dim] = bounds.upper()[dim] + delta;
        let mut above_lower = bounds.center();
        above_lower[dim] = bounds.lower()[dim] + delta;

        let wrapped = boundary.wrap_position(&beyond_upper);
        assert_abs_diff_eq!(wrapped[dim], above_lower[dim], epsilon = 1e-12);

        let direct = field.sample(&beyond_upper);
        let via_wrap = field.sample(&wrapped);
        let reference = field.sample(&above_lower);
        for component in Dim3::slice() {
            assert_abs_diff_eq!(direct[component], reference[component], epsilon = 1e-9);
            assert_abs_diff_eq!(via_wrap[component], reference[component], epsilon = 1e-9);
        }
    }
}

#[test]
fn accumulated_displacement_matches_wrap_count() {
    let extent = 7.5;
    let boundary = PeriodicBoundary::new(BoundaryBox::cube(extent).unwrap());
    let original = Point3::new(1.25, 3.0, 6.0);

    for n_wraps in [-3_i64, -1, 1, 4] {
        let mut particle = proton(1.0, original.clone(), Vec3::new(1.0, 0.0, 0.0), 0.0);
        particle.position[Dim3::X] += n_wraps as fpr * extent;
        let unwrapped_before = particle.unwrapped_position();

        let wraps = boundary.wrap(&mut particle);
        assert_eq!(wraps[Dim3::X], n_wraps);
        assert_eq!(particle.wrap_count(Dim3::X), n_wraps);
        assert_relative_eq!(
            particle.source_displacement[Dim3::X],
            n_wraps as fpr * extent,
            epsilon = 1e-12
        );
        let recovered = &particle.position + &particle.source_displacement;
        assert_abs_diff_eq!(
            recovered[Dim3::X] - n_wraps as fpr * extent,
            original[Dim3::X],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            particle.unwrapped_position()[Dim3::X],
            unwrapped_before[Dim3::X],
            epsilon = 1e-12
        );
    }
}

#[test]
fn wrapping_twice_is_a_no_op() {
    let boundary = PeriodicBoundary::new(BoundaryBox::cube(10.0).unwrap());
    let mut particle = proton(1.0, Point3::new(-3.0, 12.0, 25.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
    boundary.wrap(&mut particle);
    let position = particle.position.clone();
    let displacement = particle.source_displacement.clone();

    let wraps = boundary.wrap(&mut particle);
    assert_eq!(wraps, In3D::same(0));
    assert_eq!(particle.position, position);
    assert_eq!(particle.source_displacement, displacement);
}

#[test]
fn realized_steps_never_exceed_negotiated_limit() {
    let field_strength = 10.0 * NANOGAUSS_TO_T;
    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            max_step_length: 2.0 * MPC_TO_M,
            min_energy: 0.0,
            ..PipelineConfig::default()
        },
        Box::new(RKFStepper::new(RKFStepperConfig::default()).unwrap()),
        Arc::new(UniformField::new(Vec3::new(0.0, 0.0, field_strength))),
    )
    .process(Box::new(FixedLoss {
        step_limit: 0.3 * MPC_TO_M,
        fraction: 0.0,
    }))
    .observer(ObserverConfig::new(Point3::new(20.0 * MPC_TO_M, 0.0, 0.0), MPC_TO_M))
    .build()
    .unwrap();

    let mut particle = proton(
        50.0 * EEV_TO_J,
        Point3::origin(),
        Vec3::new(1.0, 0.2, 0.1),
        0.0,
    );
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..300 {
        if !particle.is_active() {
            break;
        }
        let expected_limit = pipeline.step_limit(&particle);
        let report = pipeline.step(&mut particle, 0, &mut rng).unwrap();
        assert_eq!(report.step_limit, expected_limit);
        assert!(report.step_limit <= 0.3 * MPC_TO_M);
        assert!(report.realized_length <= report.step_limit * (1.0 + 1e-12));
        assert!(report.realized_length > 0.0);
    }
}

#[test]
fn detection_requires_redshift_within_window() {
    let boundary = PeriodicBoundary::new(BoundaryBox::cube(100.0).unwrap());
    let rate = 1e-4;
    let mut observer_config = ObserverConfig::new(Point3::new(50.0, 50.0, 50.0), 5.0);
    observer_config.min_redshift = 0.0;
    observer_config.max_redshift = 1.0;

    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            max_step_length: 1.0,
            min_energy: 0.0,
            max_trajectory_length: 1000.0,
            ..PipelineConfig::default()
        },
        Box::new(RectilinearStepper::default()),
        Arc::new(UniformField::zero()),
    )
    .redshift_evolution(
        RedshiftEvolution::new(Arc::new(ConstantRedshiftRate(rate)), RedshiftEvolutionMode::Standard)
            .with_adiabatic_losses(false),
    )
    .periodic_boundary(boundary)
    .observer(observer_config)
    .build()
    .unwrap();

    // Reaches the sphere the first time at z = 1.005 and crosses it before
    // leaving the window, then returns one box length later at z = 0.995
    let initial_redshift = 1.0 + 15.0 * rate + 0.005;
    let primary = proton(
        1.0,
        Point3::new(30.0, 50.0, 50.0),
        Vec3::new(1.0, 0.0, 0.0),
        initial_redshift,
    );
    let (summary, records) = propagate(&pipeline, primary, 0);

    assert_eq!(records.len(), 1);
    assert_eq!(summary.terminations[TerminationCause::Detected.idx()], 1);
    let record = &records[0];
    assert!(record.redshift >= 0.0 && record.redshift <= 1.0);
    assert_relative_eq!(record.trajectory_length, 115.0, max_relative = 1e-6);
    assert_relative_eq!(record.redshift, 0.995, max_relative = 1e-6);
    assert_relative_eq!(record.position[Dim3::X], 145.0, max_relative = 1e-6);
}

#[test]
fn straight_line_detection_matches_distance_and_redshift() {
    let mapping = Arc::new(FlatLambdaCdm::new(FlatLambdaCdmConfig::default()).unwrap());
    let distance = 100.0 * MPC_TO_M;
    let radius = MPC_TO_M;
    let initial_redshift = mapping.redshift_at_distance(distance);

    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            min_energy: 0.0,
            ..PipelineConfig::default()
        },
        Box::new(RKFStepper::new(RKFStepperConfig::default()).unwrap()),
        Arc::new(UniformField::zero()),
    )
    .redshift_evolution(
        RedshiftEvolution::new(mapping.clone(), RedshiftEvolutionMode::Standard)
            .with_adiabatic_losses(false),
    )
    .process(Box::new(Inert))
    .observer(ObserverConfig::new(Point3::origin(), radius))
    .build()
    .unwrap();

    let primary = proton(
        10.0 * EEV_TO_J,
        Point3::new(distance, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        initial_redshift,
    );
    let (summary, records) = propagate(&pipeline, primary, 0);

    assert_eq!(summary.n_detections, 1);
    let record = &records[0];
    assert_relative_eq!(record.trajectory_length, distance - radius, max_relative = 1e-6);
    assert_relative_eq!(
        record.redshift,
        mapping.redshift_after(initial_redshift, distance - radius),
        max_relative = 1e-6
    );
    assert_relative_eq!(record.energy, 10.0 * EEV_TO_J);
}

#[test]
fn energy_cutoff_prevents_detection_inside_observer() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            max_step_length: 0.1 * MPC_TO_M,
            min_energy: EEV_TO_J,
            ..PipelineConfig::default()
        },
        Box::new(RectilinearStepper::default()),
        Arc::new(UniformField::zero()),
    )
    .process(Box::new(FixedLoss {
        step_limit: fpr::INFINITY,
        fraction: 0.5,
    }))
    .observer(ObserverConfig::new(Point3::origin(), 10.0 * MPC_TO_M))
    .build()
    .unwrap();

    let primary = proton(
        1.5 * EEV_TO_J,
        Point3::new(MPC_TO_M, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        0.0,
    );
    let (summary, records) = propagate(&pipeline, primary, 0);

    assert!(records.is_empty());
    assert_eq!(summary.terminations[TerminationCause::EnergyCutoff.idx()], 1);
    assert_eq!(summary.terminations[TerminationCause::Detected.idx()], 0);
}

#[test]
fn future_redshifts_continue_below_zero() {
    let mapping = Arc::new(FlatLambdaCdm::new(FlatLambdaCdmConfig::default()).unwrap());
    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            max_step_length: 50.0 * MPC_TO_M,
            min_energy: 0.0,
            min_redshift: -0.05,
            ..PipelineConfig::default()
        },
        Box::new(RectilinearStepper::default()),
        Arc::new(UniformField::zero()),
    )
    .redshift_evolution(RedshiftEvolution::new(mapping, RedshiftEvolutionMode::Future))
    .build()
    .unwrap();

    let primary = proton(10.0 * EEV_TO_J, Point3::origin(), Vec3::new(0.0, 0.0, 1.0), 0.01);
    let (summary, _) = propagate(&pipeline, primary, 0);
    assert_eq!(summary.terminations[TerminationCause::RedshiftCutoff.idx()], 1);
}

#[test]
fn secondary_explosion_drops_branch() {
    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            max_step_length: 1.0,
            min_energy: 0.0,
            max_trajectory_length: 1000.0,
            max_branch_particles: 25,
            ..PipelineConfig::default()
        },
        Box::new(RectilinearStepper::default()),
        Arc::new(UniformField::zero()),
    )
    .process(Box::new(Splitter))
    .build()
    .unwrap();

    let (summary, _) = propagate(&pipeline, proton(1.0, Point3::origin(), Vec3::new(1.0, 0.0, 0.0), 0.0), 0);
    assert!(summary.dropped);
    assert!(summary.n_particles <= 25);
    assert!(summary.terminations[TerminationCause::Dropped.idx()] > 0);
    assert_eq!(
        summary.terminations.iter().sum::<usize>(),
        summary.n_particles
    );
}

#[test]
fn divergence_terminates_only_the_affected_particle() {
    let config = RKFStepperConfig {
        min_step_length: 0.5 * MPC_TO_M,
        initial_step_length: 0.5 * MPC_TO_M,
        max_step_length: 0.5 * MPC_TO_M,
        tolerance: 1e-10,
        ..RKFStepperConfig::default()
    };
    let pipeline = PipelineBuilder::new(
        PipelineConfig {
            min_energy: 0.0,
            ..PipelineConfig::default()
        },
        Box::new(RKFStepper::new(config).unwrap()),
        Arc::new(UniformField::new(Vec3::new(0.0, 0.0, 1e3 * NANOGAUSS_TO_T))),
    )
    .build()
    .unwrap();

    let (summary, records) = propagate(
        &pipeline,
        proton(EEV_TO_J, Point3::origin(), Vec3::new(1.0, 0.0, 0.0), 0.0),
        0,
    );
    assert!(records.is_empty());
    assert_eq!(summary.terminations[TerminationCause::NumericalDivergence.idx()], 1);
    assert!(!summary.dropped && !summary.aborted);
}
