//! Parallel propagation of many primaries.

use crate::{
    error::{ensure, PropagationError, PropagationResult},
    io::{output::OutputSink, Verbosity},
    observer::DetectionRecord,
    particle::TerminationCause,
    pipeline::{BranchSummary, ModulePipeline},
    source::Source,
};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use indicatif::ParallelProgressIterator;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for simulation runs.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RunConfig {
    /// Number of primaries to emit from the source.
    pub number_of_primaries: usize,
    /// Seed from which the random number generator of every primary is derived.
    pub seed: u64,
    /// Number of worker threads, or `None` to use the global thread pool.
    pub number_of_threads: Option<usize>,
    /// Total number of particles, summed over all branches, after which
    /// the run is aborted.
    pub max_particles: Option<usize>,
    /// Number of detection records each worker collects before writing
    /// them to the output.
    pub buffer_size: usize,
}

impl RunConfig {
    pub const DEFAULT_NUMBER_OF_PRIMARIES: usize = 1000;
    pub const DEFAULT_SEED: u64 = 0;
    pub const DEFAULT_BUFFER_SIZE: usize = 256;

    /// Returns an error if any of the configuration parameter values are invalid.
    pub fn validate(&self) -> PropagationResult<()> {
        ensure(
            self.number_of_threads != Some(0),
            "Number of threads must be larger than zero",
        )?;
        ensure(
            self.max_particles != Some(0),
            "Maximum number of particles must be larger than zero",
        )?;
        ensure(
            self.buffer_size > 0,
            "Output buffer size must be larger than zero",
        )
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            number_of_primaries: Self::DEFAULT_NUMBER_OF_PRIMARIES,
            seed: Self::DEFAULT_SEED,
            number_of_threads: None,
            max_particles: None,
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Aggregated statistics of a simulation run.
#[derive(Clone, Debug, Default)]
pub struct RunStatistics {
    /// Number of primaries that were propagated.
    pub n_primaries: usize,
    /// Number of primaries skipped because the run was aborted.
    pub n_skipped_primaries: usize,
    pub n_secondaries: usize,
    pub n_steps: u64,
    pub n_detections: usize,
    pub n_dropped_branches: usize,
    pub n_aborted_branches: usize,
    /// Number of particles terminated for each cause, indexed by `TerminationCause::idx`.
    pub terminations: [usize; 7],
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Returns the number of particles terminated with the given cause.
    pub fn terminated_with(&self, cause: TerminationCause) -> usize {
        self.terminations[cause.idx()]
    }

    fn add_branch(&mut self, summary: &BranchSummary) {
        self.n_primaries += 1;
        self.n_secondaries += summary.n_particles.saturating_sub(1);
        self.n_steps += summary.n_steps;
        self.n_detections += summary.n_detections;
        self.n_dropped_branches += usize::from(summary.dropped);
        self.n_aborted_branches += usize::from(summary.aborted);
        for (total, count) in self.terminations.iter_mut().zip(summary.terminations) {
            *total += count;
        }
    }

    fn merged(mut self, other: Self) -> Self {
        self.n_primaries += other.n_primaries;
        self.n_skipped_primaries += other.n_skipped_primaries;
        self.n_secondaries += other.n_secondaries;
        self.n_steps += other.n_steps;
        self.n_detections += other.n_detections;
        self.n_dropped_branches += other.n_dropped_branches;
        self.n_aborted_branches += other.n_aborted_branches;
        for (total, count) in self.terminations.iter_mut().zip(other.terminations) {
            *total += count;
        }
        self
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Primaries propagated: {}", self.n_primaries)?;
        if self.n_skipped_primaries > 0 {
            writeln!(f, "Primaries skipped: {}", self.n_skipped_primaries)?;
        }
        writeln!(f, "Secondaries created: {}", self.n_secondaries)?;
        writeln!(f, "Steps taken: {}", self.n_steps)?;
        writeln!(f, "Detections: {}", self.n_detections)?;
        writeln!(f, "Dropped branches: {}", self.n_dropped_branches)?;
        writeln!(f, "Aborted branches: {}", self.n_aborted_branches)?;
        writeln!(f, "Terminations:")?;
        for cause in TerminationCause::all() {
            writeln!(f, "  {:<20} {}", cause.to_string(), self.terminated_with(cause))?;
        }
        write!(f, "Elapsed time: {:.3} s", self.elapsed.as_secs_f64())
    }
}

/// Per-worker state accumulated while folding over primaries.
struct WorkerState {
    buffer: Vec<DetectionRecord>,
    statistics: RunStatistics,
}

/// Drives primaries from a source through a module pipeline on a pool of
/// worker threads.
///
/// Each worker propagates whole branches independently. Detection records
/// are buffered per worker and written to the output sink under a lock, so
/// records arrive in no particular global order, but records within a
/// branch keep their causal order.
pub struct SimulationRunner {
    config: RunConfig,
    pipeline: ModulePipeline,
    source: Box<dyn Source>,
    abort: Arc<AtomicBool>,
    verbosity: Verbosity,
}

impl SimulationRunner {
    /// Creates a new simulation runner.
    pub fn new(
        config: RunConfig,
        pipeline: ModulePipeline,
        source: Box<dyn Source>,
        verbosity: Verbosity,
    ) -> PropagationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pipeline,
            source,
            abort: Arc::new(AtomicBool::new(false)),
            verbosity,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &ModulePipeline {
        &self.pipeline
    }

    /// Returns a handle to the flag that aborts the run when set.
    ///
    /// Workers observe the flag before every pipeline iteration.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Propagates all primaries and writes detection records to the sink.
    ///
    /// # Returns
    ///
    /// A `PropagationResult` which is either:
    ///
    /// - `Ok`: Contains the statistics of the run.
    /// - `Err`: Contains an error if the thread pool could not be created
    ///   or writing to the sink failed.
    pub fn run(&self, sink: &mut dyn OutputSink) -> PropagationResult<RunStatistics> {
        let start_instant = Instant::now();

        if self.verbosity.print_messages() {
            println!(
                "Propagating {} primaries through {}",
                self.config.number_of_primaries,
                self.describe_pipeline()
            );
        }

        let sink = Mutex::new(sink);
        let mut statistics = match self.config.number_of_threads {
            Some(number_of_threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(number_of_threads)
                .build()
                .map_err(|err| {
                    PropagationError::invalid(format!("Could not create thread pool: {}", err))
                })?
                .install(|| self.propagate_all(&sink))?,
            None => self.propagate_all(&sink)?,
        };

        sink.into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .finish()?;
        statistics.elapsed = start_instant.elapsed();

        if self.verbosity.print_messages() {
            println!("{}", statistics);
        }
        Ok(statistics)
    }

    fn describe_pipeline(&self) -> String {
        let names = self.pipeline.process_names();
        if names.is_empty() {
            "a pipeline without interactions".to_string()
        } else {
            format!("a pipeline with {}", names.join(", "))
        }
    }

    fn propagate_all(&self, sink: &Mutex<&mut dyn OutputSink>) -> PropagationResult<RunStatistics> {
        let particle_counter = RelaxedCounter::new(0);
        let buffer_size = self.config.buffer_size;

        (0..self.config.number_of_primaries)
            .into_par_iter()
            .progress_with(
                self.verbosity
                    .create_progress_bar(self.config.number_of_primaries),
            )
            .try_fold(
                || WorkerState {
                    buffer: Vec::with_capacity(buffer_size),
                    statistics: RunStatistics::default(),
                },
                |mut state, primary_index| {
                    self.propagate_primary(primary_index, &mut state, &particle_counter);
                    if state.buffer.len() >= buffer_size {
                        Self::flush(sink, &mut state.buffer)?;
                    }
                    Ok::<_, PropagationError>(state)
                },
            )
            .map(|state| -> PropagationResult<RunStatistics> {
                let mut state = state?;
                Self::flush(sink, &mut state.buffer)?;
                Ok(state.statistics)
            })
            .try_reduce(RunStatistics::default, |a, b| Ok(a.merged(b)))
    }

    fn propagate_primary(
        &self,
        primary_index: usize,
        state: &mut WorkerState,
        particle_counter: &RelaxedCounter,
    ) {
        if self.abort.load(Ordering::Relaxed) {
            state.statistics.n_skipped_primaries += 1;
            return;
        }
        let primary_index = primary_index as u64;
        let mut rng = StdRng::seed_from_u64(primary_seed(self.config.seed, primary_index));
        let primary = self.source.emit(&mut rng);

        let buffer = &mut state.buffer;
        let summary = self.pipeline.propagate_branch(
            primary,
            primary_index,
            &mut rng,
            &self.abort,
            &mut |record| buffer.push(record),
        );
        state.statistics.add_branch(&summary);

        if let Some(max_particles) = self.config.max_particles {
            let n_particles = particle_counter.add(summary.n_particles) + summary.n_particles;
            if n_particles >= max_particles && !self.abort.swap(true, Ordering::Relaxed) {
                if self.verbosity.print_messages() {
                    eprintln!(
                        "Warning: Particle budget of {} reached, aborting run",
                        max_particles
                    );
                }
            }
        }
    }

    fn flush(
        sink: &Mutex<&mut dyn OutputSink>,
        buffer: &mut Vec<DetectionRecord>,
    ) -> PropagationResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
        for record in buffer.drain(..) {
            sink.emit(record)?;
        }
        Ok(())
    }
}

/// Derives the seed for the random number generator of a primary, so that
/// results do not depend on how primaries are distributed over threads.
fn primary_seed(seed: u64, primary_index: u64) -> u64 {
    seed.wrapping_add(primary_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
