//! Command line interface for propagating cosmic rays to an observer.

use super::utils::{
    add_output_control_args, flag_arg, get_finite_float_value_from_parseable_argument,
    get_value_from_parseable_argument, get_value_from_parseable_argument_with_default,
    get_values_from_parseable_argument, list_arg, overwrite_mode_from_arguments, parse_3d_float_values,
    parse_limits, parse_verbosity, value_arg,
};
use crate::{
    boundary::{BoundaryBox, PeriodicBoundary},
    constants::{EEV_TO_J, KM_S_MPC_TO_HZ, MPC_TO_M, NANOGAUSS_TO_T},
    cosmology::{FlatLambdaCdm, FlatLambdaCdmConfig, LinearRedshiftMapping, RedshiftMapping},
    exit_on_error, exit_on_false, exit_on_none, exit_with_error,
    field::{uniform::UniformField, FieldSampler},
    fpr,
    geometry::{Dim3, Point3, Vec3},
    interaction::{
        decay::NuclearDecay,
        energy_loss::ContinuousEnergyLoss,
        mean_free_path::{MeanFreePath, RedshiftScaledMeanFreePath},
        photo_disintegration::PhotoDisintegration,
        photo_pion::{PhotoPionProduction, PionSecondaries},
        InteractionProcess, PhotonBackground, DEFAULT_STEP_LIMIT_FRACTION,
    },
    io::{
        output::{OutputColumn, OutputSink, TextOutput},
        tables::{read_mean_free_path_grid, read_mean_free_path_table, read_table1},
        utils::check_if_write_allowed,
        Verbosity,
    },
    observer::ObserverConfig,
    particle::Species,
    pipeline::{PipelineBuilder, PipelineConfig},
    runner::{RunConfig, SimulationRunner},
    source::{
        offset_along, CompositeSource, Composition, DirectionDistribution, PositionDistribution,
        RedshiftDistribution, Spectrum,
    },
    stepping::{
        rectilinear::RectilinearStepper,
        redshift::{RedshiftEvolution, RedshiftEvolutionMode},
        rkf::{RKFScheme, RKFStepper, RKFStepperConfig},
        Stepper,
    },
};
use chrono::Local;
use clap::{Arg, ArgMatches, Command};
use std::{
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc},
};

/// Builds a representation of the `simulate` command line subcommand.
pub fn create_simulate_subcommand() -> Command {
    let command = Command::new("simulate")
        .about("Propagate cosmic rays from a source to an observer")
        .long_about(
            "Propagate cosmic rays from a source to an observer.\n\
             Energies are given in EeV, lengths and positions in Mpc and\n\
             magnetic field strengths in nG.",
        )
        .arg(
            Arg::new("OUTPUT_PATH")
                .help("Path of the file where detections should be written")
                .required(true)
                .index(1),
        )
        .arg(
            value_arg("output-format", "FORMAT", "Format of the detection output")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(list_arg(
            "columns",
            "NAMES",
            "Optional columns to include in text output after the core columns",
        ));
    let command = add_output_control_args(command);
    let command = add_run_args(command);
    let command = add_source_args(command);
    let command = add_environment_args(command);
    let command = add_interaction_args(command);
    add_propagation_args(command)
}

fn add_run_args(command: Command) -> Command {
    command
        .arg(value_arg("primaries", "NUMBER", "Number of primaries to emit [default: 1000]"))
        .arg(value_arg("seed", "SEED", "Seed for the random number generators [default: 0]"))
        .arg(value_arg("threads", "NUMBER", "Number of worker threads [default: all cores]"))
        .arg(value_arg(
            "max-particles",
            "NUMBER",
            "Abort the run after this many particles have been propagated",
        ))
        .arg(value_arg(
            "buffer-size",
            "NUMBER",
            "Number of detections buffered by each worker [default: 256]",
        ))
}

fn add_source_args(command: Command) -> Command {
    command
        .arg(
            list_arg("source-position", "X,Y,Z", "Position of the source")
                .conflicts_with("source-distance"),
        )
        .arg(value_arg(
            "source-distance",
            "DISTANCE",
            "Place the source at this distance from the observer along the x-axis",
        ))
        .arg(value_arg(
            "source-radius",
            "RADIUS",
            "Emit uniformly within a sphere of this radius around the source position",
        ))
        .arg(
            flag_arg("source-in-box", "Emit uniformly within the periodic box")
                .conflicts_with_all(["source-position", "source-distance", "source-radius"]),
        )
        .arg(
            list_arg("direction", "X,Y,Z", "Fixed emission direction [default: isotropic]")
                .conflicts_with("towards-observer"),
        )
        .arg(flag_arg("towards-observer", "Emit towards the observer"))
        .arg(list_arg("species", "NAMES", "Emitted species, e.g. p,He-4,56,26 [default: p]"))
        .arg(list_arg("species-weights", "WEIGHTS", "Relative abundances of the emitted species"))
        .arg(value_arg("energy", "ENERGY", "Energy of mono-energetic emission [default: 10]"))
        .arg(
            value_arg("spectral-index", "INDEX", "Emit a power law spectrum with this index")
                .requires("energy-range")
                .conflicts_with("energy"),
        )
        .arg(list_arg("energy-range", "MIN,MAX", "Energy range of the power law spectrum"))
        .arg(flag_arg(
            "rigidity-cutoff",
            "Scale the upper energy of the power law with the charge number",
        ))
        .arg(
            value_arg("source-redshift", "REDSHIFT", "Fixed emission redshift [default: 0]")
                .conflicts_with_all(["source-redshift-range", "redshift-from-distance"]),
        )
        .arg(
            list_arg("source-redshift-range", "MIN,MAX", "Emit uniformly in this redshift range")
                .conflicts_with("redshift-from-distance"),
        )
        .arg(
            value_arg(
                "source-evolution",
                "EXPONENT",
                "Weight emission redshifts in the range with (1 + z)^EXPONENT",
            )
            .requires("source-redshift-range"),
        )
        .arg(flag_arg(
            "redshift-from-distance",
            "Set the emission redshift from the distance to the observer",
        ))
}

fn add_environment_args(command: Command) -> Command {
    command
        .arg(value_arg(
            "box-size",
            "SIZE",
            "Side length of the periodic box with a corner at the origin [default: no box]",
        ))
        .arg(list_arg("field", "BX,BY,BZ", "Uniform magnetic field [default: 0,0,0]"))
        .arg(list_arg(
            "observer-position",
            "X,Y,Z",
            "Center of the observer sphere [default: box center or origin]",
        ))
        .arg(value_arg("observer-radius", "RADIUS", "Radius of the observer sphere [default: 1]"))
        .arg(list_arg(
            "observer-redshift-window",
            "MIN,MAX",
            "Detect only particles with redshifts in this range",
        ))
        .arg(
            value_arg("cosmology", "MODEL", "Mapping between comoving distance and redshift")
                .value_parser(["lcdm", "linear"])
                .default_value("lcdm"),
        )
        .arg(value_arg(
            "hubble-constant",
            "VALUE",
            "Hubble constant [km/s/Mpc] [default: 67.3]",
        ))
        .arg(value_arg("omega-matter", "VALUE", "Matter density parameter [default: 0.315]"))
        .arg(value_arg("omega-lambda", "VALUE", "Dark energy density parameter [default: 0.685]"))
        .arg(flag_arg(
            "future-redshift",
            "Let redshifts continue to decrease below zero",
        ))
        .arg(
            flag_arg("no-redshift-evolution", "Keep the redshift of particles fixed")
                .conflicts_with("future-redshift"),
        )
        .arg(flag_arg("no-adiabatic-losses", "Disable energy loss from cosmological expansion"))
}

fn add_interaction_args(command: Command) -> Command {
    command
        .arg(value_arg(
            "background",
            "NAME",
            "Photon background of the interaction tables, CMB or IRB_<model> [default: CMB]",
        ))
        .arg(flag_arg(
            "tables-with-redshift",
            "Interaction tables have energy, redshift and value columns",
        ))
        .arg(value_arg(
            "background-evolution",
            "PATH",
            "Table of redshift and relative background density, applied to tables without redshift",
        ))
        .arg(value_arg(
            "photo-pion-table",
            "PATH",
            "Table of photo-pion mean free paths for protons",
        ))
        .arg(value_arg(
            "photo-disintegration-table",
            "PATH",
            "Table of photo-disintegration mean free paths per nucleon",
        ))
        .arg(value_arg(
            "pair-production-table",
            "PATH",
            "Table of electron pair production energy loss lengths for protons",
        ))
        .arg(value_arg(
            "step-limit-fraction",
            "FRACTION",
            "Fraction of the interaction length proposed as step limit by each process [default: 0.1]",
        ))
        .arg(flag_arg("decay", "Enable nuclear decay"))
        .arg(
            list_arg(
                "secondaries",
                "KINDS",
                "Secondaries to create: photons, neutrinos, electrons, nucleons",
            )
            .value_parser(["photons", "neutrinos", "electrons", "nucleons"]),
        )
}

fn add_propagation_args(command: Command) -> Command {
    command
        .arg(
            value_arg("stepper", "STEPPER", "Stepper for the equations of motion")
                .value_parser(["rkf", "rectilinear"])
                .default_value("rkf"),
        )
        .arg(
            value_arg("scheme", "SCHEME", "Embedded Runge-Kutta scheme")
                .value_parser(["cash-karp", "dormand-prince"])
                .default_value("cash-karp"),
        )
        .arg(value_arg("tolerance", "VALUE", "Error tolerance of the stepper [default: 1e-4]"))
        .arg(value_arg(
            "max-deflection",
            "ANGLE",
            "Largest deflection per step [rad] [default: 0.1]",
        ))
        .arg(value_arg("min-step", "LENGTH", "Smallest step length [default: 1e-4]"))
        .arg(value_arg("max-step", "LENGTH", "Largest step length [default: 1]"))
        .arg(value_arg(
            "min-energy",
            "ENERGY",
            "Terminate particles below this energy [default: 1]",
        ))
        .arg(list_arg(
            "redshift-limits",
            "MIN,MAX",
            "Terminate particles outside this redshift range",
        ))
        .arg(value_arg(
            "max-trajectory",
            "LENGTH",
            "Terminate particles after this trajectory length [default: 10000]",
        ))
        .arg(value_arg(
            "max-branch-particles",
            "NUMBER",
            "Drop branches with more particles than this [default: 100000]",
        ))
}

/// Runs the actions for the `simulate` subcommand using the given arguments.
pub fn run_simulate_subcommand(arguments: &ArgMatches) {
    let verbosity = parse_verbosity(arguments, true);
    let overwrite_mode = overwrite_mode_from_arguments(arguments);

    let output_path = PathBuf::from(
        arguments
            .get_one::<String>("OUTPUT_PATH")
            .expect("No value for required argument"),
    );
    let write_allowed = exit_on_error!(
        check_if_write_allowed(&output_path, overwrite_mode),
        "Error: Could not determine whether to write {}: {}",
        output_path.display()
    );
    if !write_allowed {
        return;
    }

    let boundary = get_finite_float_value_from_parseable_argument(arguments, "box-size")
        .map(|box_size| {
            PeriodicBoundary::new(exit_on_error!(
                BoundaryBox::cube(box_size * MPC_TO_M),
                "Error: Invalid periodic box: {}"
            ))
        });

    let observer_config = create_observer_config(arguments, boundary.as_ref());
    let mapping = create_redshift_mapping(arguments);

    let stepper = create_stepper(arguments);
    let field = create_field(arguments);

    let mut builder = PipelineBuilder::new(create_pipeline_config(arguments), stepper, field)
        .observer(observer_config.clone())
        .verbosity(verbosity.clone());
    if let Some(boundary) = boundary.clone() {
        builder = builder.periodic_boundary(boundary);
    }
    if !arguments.get_flag("no-redshift-evolution") {
        let mode = if arguments.get_flag("future-redshift") {
            RedshiftEvolutionMode::Future
        } else {
            RedshiftEvolutionMode::Standard
        };
        builder = builder.redshift_evolution(
            RedshiftEvolution::new(Arc::clone(&mapping), mode)
                .with_adiabatic_losses(!arguments.get_flag("no-adiabatic-losses")),
        );
    }
    for process in create_interaction_processes(arguments) {
        builder = builder.process(process);
    }
    let pipeline = exit_on_error!(builder.build(), "Error: Could not set up pipeline: {}");

    let source = create_source(arguments, boundary.as_ref(), &observer_config.position, mapping);

    let runner = exit_on_error!(
        SimulationRunner::new(create_run_config(arguments), pipeline, Box::new(source), verbosity.clone()),
        "Error: Could not set up simulation: {}"
    );
    install_interrupt_handler(&runner, &verbosity);

    let mut sink = create_output_sink(arguments, &output_path);
    if verbosity.print_messages() {
        println!(
            "Starting run at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
    }
    let statistics = exit_on_error!(
        runner.run(sink.as_mut()),
        "Error: Simulation failed: {}"
    );

    if verbosity.print_messages() {
        println!(
            "Wrote {} detections to {}",
            statistics.n_detections,
            output_path.display()
        );
    }
}

fn install_interrupt_handler(runner: &SimulationRunner, verbosity: &Verbosity) {
    let abort = runner.abort_handle();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("Interrupted, finishing active steps");
        abort.store(true, Ordering::Relaxed);
    }) {
        if verbosity.print_messages() {
            eprintln!("Warning: Could not install interrupt handler: {}", err);
        }
    }
}

fn create_run_config(arguments: &ArgMatches) -> RunConfig {
    RunConfig {
        number_of_primaries: get_value_from_parseable_argument_with_default(
            arguments,
            "primaries",
            RunConfig::DEFAULT_NUMBER_OF_PRIMARIES,
        ),
        seed: get_value_from_parseable_argument_with_default(arguments, "seed", RunConfig::DEFAULT_SEED),
        number_of_threads: get_value_from_parseable_argument(arguments, "threads"),
        max_particles: get_value_from_parseable_argument(arguments, "max-particles"),
        buffer_size: get_value_from_parseable_argument_with_default(
            arguments,
            "buffer-size",
            RunConfig::DEFAULT_BUFFER_SIZE,
        ),
    }
}

fn create_pipeline_config(arguments: &ArgMatches) -> PipelineConfig {
    let (min_redshift, max_redshift) = parse_limits(arguments, "redshift-limits").unwrap_or((
        PipelineConfig::DEFAULT_MIN_REDSHIFT,
        PipelineConfig::DEFAULT_MAX_REDSHIFT,
    ));
    PipelineConfig {
        max_step_length: get_finite_float_value_from_parseable_argument(arguments, "max-step")
            .map_or(PipelineConfig::DEFAULT_MAX_STEP_LENGTH, |length| length * MPC_TO_M),
        min_energy: get_finite_float_value_from_parseable_argument(arguments, "min-energy")
            .map_or(PipelineConfig::DEFAULT_MIN_ENERGY, |energy| energy * EEV_TO_J),
        min_redshift,
        max_redshift,
        max_trajectory_length: get_finite_float_value_from_parseable_argument(
            arguments,
            "max-trajectory",
        )
        .map_or(PipelineConfig::DEFAULT_MAX_TRAJECTORY_LENGTH, |length| {
            length * MPC_TO_M
        }),
        max_branch_particles: get_value_from_parseable_argument_with_default(
            arguments,
            "max-branch-particles",
            PipelineConfig::DEFAULT_MAX_BRANCH_PARTICLES,
        ),
    }
}

fn create_stepper(arguments: &ArgMatches) -> Box<dyn Stepper> {
    let max_step_length = get_finite_float_value_from_parseable_argument(arguments, "max-step")
        .map_or(RKFStepperConfig::DEFAULT_MAX_STEP_LENGTH, |length| {
            length * MPC_TO_M
        });
    match arguments
        .get_one::<String>("stepper")
        .expect("No value for argument with default")
        .as_str()
    {
        "rectilinear" => Box::new(exit_on_error!(
            RectilinearStepper::new(max_step_length),
            "Error: Invalid stepper configuration: {}"
        )),
        "rkf" => {
            let scheme = match arguments
                .get_one::<String>("scheme")
                .expect("No value for argument with default")
                .as_str()
            {
                "dormand-prince" => RKFScheme::DormandPrince,
                _ => RKFScheme::CashKarp,
            };
            let min_step_length = get_finite_float_value_from_parseable_argument(arguments, "min-step")
                .map_or(RKFStepperConfig::DEFAULT_MIN_STEP_LENGTH, |length| {
                    length * MPC_TO_M
                });
            let config = RKFStepperConfig {
                scheme,
                tolerance: get_value_from_parseable_argument_with_default(
                    arguments,
                    "tolerance",
                    RKFStepperConfig::DEFAULT_TOLERANCE,
                ),
                max_deflection_angle: get_value_from_parseable_argument_with_default(
                    arguments,
                    "max-deflection",
                    RKFStepperConfig::DEFAULT_MAX_DEFLECTION_ANGLE,
                ),
                min_step_length,
                max_step_length,
                initial_step_length: RKFStepperConfig::DEFAULT_INITIAL_STEP_LENGTH
                    .max(min_step_length)
                    .min(max_step_length),
                ..RKFStepperConfig::default()
            };
            Box::new(exit_on_error!(
                RKFStepper::new(config),
                "Error: Invalid stepper configuration: {}"
            ))
        }
        invalid => exit_with_error!("Error: Invalid stepper {}", invalid),
    }
}

fn create_field(arguments: &ArgMatches) -> Arc<dyn FieldSampler> {
    match parse_3d_float_values(arguments, "field") {
        Some(values) => Arc::new(UniformField::new(Vec3::with_each_component(|dim| {
            values[dim] * NANOGAUSS_TO_T
        }))),
        None => Arc::new(UniformField::zero()),
    }
}

fn create_observer_config(
    arguments: &ArgMatches,
    boundary: Option<&PeriodicBoundary>,
) -> ObserverConfig {
    let position = parse_3d_float_values(arguments, "observer-position")
        .map(|values| Point3::with_each_component(|dim| values[dim] * MPC_TO_M))
        .unwrap_or_else(|| {
            boundary.map_or_else(Point3::origin, |boundary| boundary.bounds().center())
        });
    let radius = get_finite_float_value_from_parseable_argument(arguments, "observer-radius")
        .unwrap_or(1.0)
        * MPC_TO_M;
    let mut config = ObserverConfig::new(position, radius);
    if let Some((min_redshift, max_redshift)) = parse_limits(arguments, "observer-redshift-window")
    {
        config.min_redshift = min_redshift;
        config.max_redshift = max_redshift;
    }
    config
}

fn create_redshift_mapping(arguments: &ArgMatches) -> Arc<dyn RedshiftMapping> {
    let hubble_constant = get_finite_float_value_from_parseable_argument(arguments, "hubble-constant")
        .map(|value| value * KM_S_MPC_TO_HZ);
    match arguments
        .get_one::<String>("cosmology")
        .expect("No value for argument with default")
        .as_str()
    {
        "linear" => Arc::new(match hubble_constant {
            Some(hubble_constant) => exit_on_error!(
                LinearRedshiftMapping::new(hubble_constant),
                "Error: Invalid cosmology: {}"
            ),
            None => LinearRedshiftMapping::default(),
        }),
        "lcdm" => {
            let default_config = FlatLambdaCdmConfig::default();
            let config = FlatLambdaCdmConfig {
                hubble_constant: hubble_constant.unwrap_or(default_config.hubble_constant),
                omega_matter: get_value_from_parseable_argument_with_default(
                    arguments,
                    "omega-matter",
                    default_config.omega_matter,
                ),
                omega_lambda: get_value_from_parseable_argument_with_default(
                    arguments,
                    "omega-lambda",
                    default_config.omega_lambda,
                ),
                ..default_config
            };
            Arc::new(exit_on_error!(
                FlatLambdaCdm::new(config),
                "Error: Invalid cosmology: {}"
            ))
        }
        invalid => exit_with_error!("Error: Invalid cosmology {}", invalid),
    }
}

fn read_mean_free_paths(arguments: &ArgMatches, file_path: &Path) -> Arc<dyn MeanFreePath> {
    if arguments.get_flag("tables-with-redshift") {
        Arc::new(exit_on_error!(
            read_mean_free_path_grid(file_path),
            "Error: Could not read table {}: {}",
            file_path.display()
        ))
    } else {
        let mean_free_path = RedshiftScaledMeanFreePath::new(exit_on_error!(
            read_mean_free_path_table(file_path),
            "Error: Could not read table {}: {}",
            file_path.display()
        ));
        match arguments.get_one::<String>("background-evolution") {
            Some(evolution_path) => {
                let evolution_path = Path::new(evolution_path);
                let evolution = exit_on_error!(
                    read_table1(evolution_path),
                    "Error: Could not read table {}: {}",
                    evolution_path.display()
                );
                Arc::new(exit_on_error!(
                    mean_free_path.with_evolution(evolution),
                    "Error: Invalid background evolution: {}"
                ))
            }
            None => Arc::new(mean_free_path),
        }
    }
}

fn create_interaction_processes(arguments: &ArgMatches) -> Vec<Box<dyn InteractionProcess>> {
    let background: PhotonBackground = get_value_from_parseable_argument_with_default(
        arguments,
        "background",
        PhotonBackground::Cmb,
    );
    let secondaries = arguments
        .get_many::<String>("secondaries")
        .map(|values| values.map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    let create = |kind: &str| secondaries.contains(&kind);
    let step_limit_fraction = get_value_from_parseable_argument_with_default(
        arguments,
        "step-limit-fraction",
        DEFAULT_STEP_LIMIT_FRACTION,
    );

    let mut processes: Vec<Box<dyn InteractionProcess>> = Vec::new();

    if let Some(file_path) = arguments.get_one::<String>("photo-pion-table") {
        let mean_free_path = read_mean_free_paths(arguments, Path::new(file_path));
        processes.push(Box::new(exit_on_error!(
            PhotoPionProduction::new(background.clone(), mean_free_path)
                .with_secondaries(PionSecondaries {
                    photons: create("photons"),
                    neutrinos: create("neutrinos"),
                    electrons: create("electrons"),
                })
                .with_step_limit_fraction(step_limit_fraction),
            "Error: Invalid step limit fraction: {}"
        )));
    }
    if let Some(file_path) = arguments.get_one::<String>("photo-disintegration-table") {
        let mean_free_path = read_mean_free_paths(arguments, Path::new(file_path));
        processes.push(Box::new(exit_on_error!(
            PhotoDisintegration::new(background.clone())
                .with_default_mean_free_path(mean_free_path)
                .with_nucleon_secondaries(create("nucleons"))
                .with_step_limit_fraction(step_limit_fraction),
            "Error: Invalid step limit fraction: {}"
        )));
    }
    if let Some(file_path) = arguments.get_one::<String>("pair-production-table") {
        let loss_length = read_mean_free_paths(arguments, Path::new(file_path));
        processes.push(Box::new(exit_on_error!(
            ContinuousEnergyLoss::new("ElectronPairProduction", background, loss_length)
                .with_step_limit_fraction(step_limit_fraction),
            "Error: Invalid step limit fraction: {}"
        )));
    }
    if arguments.get_flag("decay") {
        processes.push(Box::new(exit_on_error!(
            NuclearDecay::new()
                .with_secondaries(create("electrons"), create("neutrinos"))
                .with_step_limit_fraction(step_limit_fraction),
            "Error: Invalid step limit fraction: {}"
        )));
    }
    processes
}

fn create_source(
    arguments: &ArgMatches,
    boundary: Option<&PeriodicBoundary>,
    observer_position: &Point3<fpr>,
    mapping: Arc<dyn RedshiftMapping>,
) -> CompositeSource {
    let center = match (
        parse_3d_float_values(arguments, "source-position"),
        get_finite_float_value_from_parseable_argument(arguments, "source-distance"),
    ) {
        (Some(values), _) => Point3::with_each_component(|dim| values[dim] * MPC_TO_M),
        (None, Some(distance)) => offset_along(observer_position, Dim3::X, distance * MPC_TO_M),
        (None, None) => Point3::origin(),
    };
    let position = if arguments.get_flag("source-in-box") {
        let boundary = exit_on_none!(
            boundary,
            "Error: Emitting within the box requires a periodic box (--box-size)"
        );
        PositionDistribution::UniformBox(boundary.bounds().clone())
    } else if let Some(radius) =
        get_finite_float_value_from_parseable_argument(arguments, "source-radius")
    {
        PositionDistribution::UniformSphere {
            center,
            radius: radius * MPC_TO_M,
        }
    } else {
        PositionDistribution::Point(center)
    };

    let direction = if arguments.get_flag("towards-observer") {
        DirectionDistribution::Towards(observer_position.clone())
    } else if let Some(values) = parse_3d_float_values(arguments, "direction") {
        DirectionDistribution::Fixed(Vec3::with_each_component(|dim| values[dim]))
    } else {
        DirectionDistribution::Isotropic
    };

    let species: Vec<Species> = get_values_from_parseable_argument(arguments, "species")
        .unwrap_or_else(|| vec![Species::proton()]);
    let weights: Vec<fpr> = get_values_from_parseable_argument(arguments, "species-weights")
        .unwrap_or_else(|| vec![1.0; species.len()]);
    exit_on_false!(
        weights.len() == species.len(),
        "Error: Got {} species weights for {} species",
        weights.len(),
        species.len()
    );
    let composition = exit_on_error!(
        Composition::new(species.into_iter().zip(weights).collect()),
        "Error: Invalid source composition: {}"
    );

    let spectrum = match get_finite_float_value_from_parseable_argument(arguments, "spectral-index")
    {
        Some(index) => {
            let (min_energy, max_energy) = parse_limits(arguments, "energy-range")
                .expect("No value for required argument");
            if arguments.get_flag("rigidity-cutoff") {
                Spectrum::PowerLawRigidityCutoff {
                    index,
                    min_energy: min_energy * EEV_TO_J,
                    max_energy_per_charge: max_energy * EEV_TO_J,
                }
            } else {
                Spectrum::PowerLaw {
                    index,
                    min_energy: min_energy * EEV_TO_J,
                    max_energy: max_energy * EEV_TO_J,
                }
            }
        }
        None => Spectrum::Monoenergetic(
            get_finite_float_value_from_parseable_argument(arguments, "energy").unwrap_or(10.0)
                * EEV_TO_J,
        ),
    };

    let redshift = if arguments.get_flag("redshift-from-distance") {
        RedshiftDistribution::FromDistance {
            mapping,
            observer_position: observer_position.clone(),
            periodic_boundary: boundary.cloned(),
        }
    } else if let Some((min, max)) = parse_limits(arguments, "source-redshift-range") {
        match get_finite_float_value_from_parseable_argument(arguments, "source-evolution") {
            Some(exponent) => RedshiftDistribution::Evolution { min, max, exponent },
            None => RedshiftDistribution::Uniform { min, max },
        }
    } else {
        RedshiftDistribution::Fixed(
            get_finite_float_value_from_parseable_argument(arguments, "source-redshift")
                .unwrap_or(0.0),
        )
    };

    exit_on_error!(
        CompositeSource::new(position, direction, composition, spectrum, redshift),
        "Error: Invalid source: {}"
    )
}

fn create_output_sink(arguments: &ArgMatches, output_path: &Path) -> Box<dyn OutputSink> {
    let columns: Vec<OutputColumn> =
        get_values_from_parseable_argument(arguments, "columns").unwrap_or_default();
    match arguments
        .get_one::<String>("output-format")
        .expect("No value for argument with default")
        .as_str()
    {
        "text" => Box::new(exit_on_error!(
            TextOutput::create(output_path, columns),
            "Error: Could not create output file {}: {}",
            output_path.display()
        )),
        #[cfg(feature = "json")]
        "json" => Box::new(exit_on_error!(
            crate::io::output::JsonLinesOutput::create(output_path),
            "Error: Could not create output file {}: {}",
            output_path.display()
        )),
        invalid => exit_with_error!(
            "Error: Output format {} is not supported by this build",
            invalid
        ),
    }
}
