//! Stepping using Runge–Kutta–Fehlberg methods,
//! a set of RK methods with step size adaptation driven by
//! error estimation through an embedded lower-order step.
//!
//! The integrated state is the position together with the unit momentum
//! direction u, which evolves as du/ds = (qc/E) u × B for an
//! ultra-relativistic particle with charge q and energy E.

use super::{StepOutcome, Stepper};
use crate::{
    constants::{C_LIGHT, KPC_TO_M, MPC_TO_M},
    error::{ensure, PropagationError, PropagationResult},
    field::FieldSampler,
    fpr,
    geometry::{Point3, Vec3},
    particle::ParticleState,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Embedded Runge–Kutta scheme to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum RKFScheme {
    /// The Cash–Karp fifth-order method with embedded fourth-order step.
    CashKarp,
    /// The Dormand–Prince fifth-order method with embedded fourth-order step.
    DormandPrince,
}

impl RKFScheme {
    fn tableau(self) -> &'static ButcherTableau {
        match self {
            Self::CashKarp => &CASH_KARP,
            Self::DormandPrince => &DORMAND_PRINCE,
        }
    }
}

#[derive(Debug)]
struct ButcherTableau {
    order: u8,
    a: &'static [&'static [fpr]],
    b: &'static [fpr],
    b_star: &'static [fpr],
}

const CASH_KARP: ButcherTableau = ButcherTableau {
    order: 5,
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0],
        &[-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0],
        &[
            1631.0 / 55_296.0,
            175.0 / 512.0,
            575.0 / 13_824.0,
            44_275.0 / 110_592.0,
            253.0 / 4096.0,
        ],
    ],
    b: &[
        37.0 / 378.0,
        0.0,
        250.0 / 621.0,
        125.0 / 594.0,
        0.0,
        512.0 / 1771.0,
    ],
    b_star: &[
        2825.0 / 27_648.0,
        0.0,
        18_575.0 / 48_384.0,
        13_525.0 / 55_296.0,
        277.0 / 14_336.0,
        1.0 / 4.0,
    ],
};

const DORMAND_PRINCE: ButcherTableau = ButcherTableau {
    order: 5,
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19_372.0 / 6561.0,
            -25_360.0 / 2187.0,
            64_448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46_732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18_656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    b_star: &[
        5179.0 / 57_600.0,
        0.0,
        7571.0 / 16_695.0,
        393.0 / 640.0,
        -92_097.0 / 339_200.0,
        187.0 / 2100.0,
        1.0 / 40.0,
    ],
};

/// Configuration parameters for RKF steppers.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RKFStepperConfig {
    /// Which embedded scheme to use.
    pub scheme: RKFScheme,
    /// Error tolerance, relative to the step length for the position and
    /// absolute for the direction.
    pub tolerance: fpr,
    /// Scaling factor for the error to reduce oscillations.
    pub safety_factor: fpr,
    /// Smallest allowed scaling of the step size in one step.
    pub min_step_scale: fpr,
    /// Largest allowed scaling of the step size in one step.
    pub max_step_scale: fpr,
    /// Floor for the step length [m].
    pub min_step_length: fpr,
    /// Ceiling for the step length [m].
    pub max_step_length: fpr,
    /// Step length to try for particles that have not taken any steps yet [m].
    pub initial_step_length: fpr,
    /// Maximum number of step attempts before giving up.
    pub max_step_attempts: u32,
    /// Largest allowed change in direction over one step [rad].
    pub max_deflection_angle: fpr,
    /// Whether to use Proportional Integral (PI) control for stabilizing the stepping.
    pub use_pi_control: bool,
}

impl RKFStepperConfig {
    pub const DEFAULT_SCHEME: RKFScheme = RKFScheme::CashKarp;
    pub const DEFAULT_TOLERANCE: fpr = 1e-4;
    pub const DEFAULT_SAFETY_FACTOR: fpr = 0.9;
    pub const DEFAULT_MIN_STEP_SCALE: fpr = 0.2;
    pub const DEFAULT_MAX_STEP_SCALE: fpr = 5.0;
    pub const DEFAULT_MIN_STEP_LENGTH: fpr = 0.1 * KPC_TO_M;
    pub const DEFAULT_MAX_STEP_LENGTH: fpr = 1.0 * MPC_TO_M;
    pub const DEFAULT_INITIAL_STEP_LENGTH: fpr = 10.0 * KPC_TO_M;
    pub const DEFAULT_MAX_STEP_ATTEMPTS: u32 = 32;
    pub const DEFAULT_MAX_DEFLECTION_ANGLE: fpr = 0.1;
    pub const DEFAULT_USE_PI_CONTROL: bool = true;

    /// Returns an error if any of the configuration parameter values are invalid.
    pub fn validate(&self) -> PropagationResult<()> {
        ensure(
            self.tolerance > 0.0,
            "Error tolerance must be larger than zero",
        )?;
        ensure(
            self.safety_factor > 0.0 && self.safety_factor <= 1.0,
            "Safety factor must be in the range (0, 1]",
        )?;
        ensure(
            self.min_step_scale > 0.0 && self.min_step_scale < 1.0,
            "Minimum step scale must be in the range (0, 1)",
        )?;
        ensure(
            self.max_step_scale >= 1.0,
            "Maximum step scale must be larger than or equal to one",
        )?;
        ensure(
            self.min_step_length > 0.0,
            "Minimum step length must be larger than zero",
        )?;
        ensure(
            self.max_step_length >= self.min_step_length,
            "Maximum step length must be larger than or equal to the minimum step length",
        )?;
        ensure(
            self.initial_step_length > 0.0,
            "Initial step length must be larger than zero",
        )?;
        ensure(
            self.max_step_attempts > 0,
            "Maximum number of step attempts must be larger than zero",
        )?;
        ensure(
            self.max_deflection_angle > 0.0,
            "Maximum deflection angle must be larger than zero",
        )
    }
}

impl Default for RKFStepperConfig {
    fn default() -> Self {
        RKFStepperConfig {
            scheme: Self::DEFAULT_SCHEME,
            tolerance: Self::DEFAULT_TOLERANCE,
            safety_factor: Self::DEFAULT_SAFETY_FACTOR,
            min_step_scale: Self::DEFAULT_MIN_STEP_SCALE,
            max_step_scale: Self::DEFAULT_MAX_STEP_SCALE,
            min_step_length: Self::DEFAULT_MIN_STEP_LENGTH,
            max_step_length: Self::DEFAULT_MAX_STEP_LENGTH,
            initial_step_length: Self::DEFAULT_INITIAL_STEP_LENGTH,
            max_step_attempts: Self::DEFAULT_MAX_STEP_ATTEMPTS,
            max_deflection_angle: Self::DEFAULT_MAX_DEFLECTION_ANGLE,
            use_pi_control: Self::DEFAULT_USE_PI_CONTROL,
        }
    }
}

#[derive(Clone, Debug)]
struct PIControlParams {
    k_i: fpr,
    k_p: fpr,
}

impl PIControlParams {
    fn activated(scheme_order: u8) -> Self {
        let order = fpr::from(scheme_order);
        let k_i = 0.4 / order;
        let k_p = 1.0 / order - 0.75 * k_i;
        PIControlParams { k_i, k_p }
    }

    fn deactivated(scheme_order: u8) -> Self {
        let order = fpr::from(scheme_order);
        PIControlParams {
            k_i: 0.0,
            k_p: 1.0 / order,
        }
    }
}

#[derive(Clone, Debug)]
struct StepAttempt {
    displacement: Vec3<fpr>,
    direction: Vec3<fpr>,
    error: fpr,
    deflection: fpr,
}

/// A stepper using an embedded Runge–Kutta scheme with adaptive step length.
#[derive(Clone, Debug)]
pub struct RKFStepper {
    config: RKFStepperConfig,
    tableau: &'static ButcherTableau,
    pi_control: PIControlParams,
}

impl RKFStepper {
    /// Creates a new RKF stepper with the given configuration.
    pub fn new(config: RKFStepperConfig) -> PropagationResult<Self> {
        config.validate()?;
        let tableau = config.scheme.tableau();
        let pi_control = if config.use_pi_control {
            PIControlParams::activated(tableau.order)
        } else {
            PIControlParams::deactivated(tableau.order)
        };
        Ok(Self {
            config,
            tableau,
            pi_control,
        })
    }

    pub fn config(&self) -> &RKFStepperConfig {
        &self.config
    }

    fn attempt_step(
        &self,
        position: &Point3<fpr>,
        direction: &Vec3<fpr>,
        deflection_rate: fpr,
        step_length: fpr,
        field: &dyn FieldSampler,
    ) -> StepAttempt {
        let tableau = self.tableau;
        let n_stages = tableau.b.len();
        let mut position_slopes: Vec<Vec3<fpr>> = Vec::with_capacity(n_stages);
        let mut direction_slopes: Vec<Vec3<fpr>> = Vec::with_capacity(n_stages);

        for coefs in tableau.a.iter() {
            let mut stage_position = position.clone();
            let mut stage_direction = direction.clone();
            for (j, &a) in coefs.iter().enumerate() {
                if a != 0.0 {
                    stage_position = &stage_position + &position_slopes[j] * (a * step_length);
                    stage_direction =
                        &stage_direction + &direction_slopes[j] * (a * step_length);
                }
            }
            let field_vector = field.sample(&stage_position);
            direction_slopes.push(stage_direction.cross(&field_vector) * deflection_rate);
            position_slopes.push(stage_direction);
        }

        let mut displacement = Vec3::zero();
        let mut direction_change = Vec3::zero();
        let mut displacement_error = Vec3::zero();
        let mut direction_error = Vec3::zero();
        for i in 0..n_stages {
            let b = tableau.b[i];
            let db = b - tableau.b_star[i];
            displacement = &displacement + &position_slopes[i] * (b * step_length);
            direction_change = &direction_change + &direction_slopes[i] * (b * step_length);
            displacement_error = &displacement_error + &position_slopes[i] * (db * step_length);
            direction_error = &direction_error + &direction_slopes[i] * (db * step_length);
        }

        let tolerance = self.config.tolerance;
        let error = fpr::sqrt(
            0.5 * ((displacement_error.length() / (tolerance * step_length)).powi(2)
                + (direction_error.length() / tolerance).powi(2)),
        );

        let mut next_direction = direction + &direction_change;
        let next_direction_length = next_direction.length();
        if !(next_direction_length.is_finite() && next_direction_length > 0.0) {
            return StepAttempt {
                displacement,
                direction: direction.clone(),
                error: fpr::INFINITY,
                deflection: fpr::INFINITY,
            };
        }
        next_direction.normalize();
        let deflection = direction.angle_to(&next_direction);

        StepAttempt {
            displacement,
            direction: next_direction,
            error: if error.is_finite() && deflection.is_finite() {
                error
            } else {
                fpr::INFINITY
            },
            deflection: if deflection.is_finite() {
                deflection
            } else {
                fpr::INFINITY
            },
        }
    }

    fn compute_step_scale_accepted(&self, error: fpr, previous_error: fpr, deflection: fpr) -> fpr {
        let error_scale = if error < 1e-9 {
            // Use max step scale directly for very small error to avoid division by zero
            self.config.max_step_scale
        } else {
            self.config.safety_factor * previous_error.powf(self.pi_control.k_i)
                / error.powf(self.pi_control.k_p)
        };
        let deflection_scale = if deflection > 0.0 {
            self.config.safety_factor * self.config.max_deflection_angle / deflection
        } else {
            self.config.max_step_scale
        };
        error_scale
            .min(deflection_scale)
            .max(self.config.min_step_scale)
            .min(self.config.max_step_scale)
    }

    fn compute_step_scale_rejected(&self, error: fpr, deflection: fpr) -> fpr {
        let mut scale: fpr = 1.0;
        if error > 1.0 {
            scale = scale.min(self.config.safety_factor / error.powf(self.pi_control.k_p));
        }
        if deflection > self.config.max_deflection_angle {
            scale =
                scale.min(self.config.safety_factor * self.config.max_deflection_angle / deflection);
        }
        scale.max(self.config.min_step_scale).min(self.config.safety_factor)
    }

    fn clamp_step_length(&self, step_length: fpr) -> fpr {
        step_length
            .max(self.config.min_step_length)
            .min(self.config.max_step_length)
    }

    fn apply_straight_step(&self, particle: &mut ParticleState, length: fpr) -> StepOutcome {
        particle.position = &particle.position + &particle.direction * length;
        particle.trajectory_length += length;
        particle.step_control.next_step_length = self.config.max_step_length;
        StepOutcome {
            length,
            deflection: 0.0,
            attempts: 1,
        }
    }
}

impl Stepper for RKFStepper {
    fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        if !particle.species.is_charged() {
            return self.config.max_step_length;
        }
        let next_step_length = particle.step_control.next_step_length;
        if next_step_length.is_finite() {
            self.clamp_step_length(next_step_length)
        } else {
            self.clamp_step_length(self.config.initial_step_length)
        }
    }

    fn advance(
        &self,
        particle: &mut ParticleState,
        max_length: fpr,
        field: &dyn FieldSampler,
    ) -> PropagationResult<StepOutcome> {
        let own_limit = self.propose_step_limit(particle);
        let mut step_length = own_limit.min(max_length);

        if !particle.species.is_charged() || field.is_null() || particle.energy <= 0.0 {
            return Ok(self.apply_straight_step(particle, step_length));
        }

        let deflection_rate = particle.species.charge() * C_LIGHT / particle.energy;
        let floor = self.config.min_step_length.min(max_length);
        let limited_externally = max_length < own_limit;

        let mut attempts = 0;
        while attempts < self.config.max_step_attempts {
            attempts += 1;
            let attempt = self.attempt_step(
                &particle.position,
                &particle.direction,
                deflection_rate,
                step_length,
                field,
            );

            let acceptable = attempt.error <= 1.0
                && attempt.deflection <= self.config.max_deflection_angle;
            let at_floor = step_length <= floor * (1.0 + 1e-12);

            // Deflection alone may exceed its bound at the floor, but not the error
            if acceptable || (at_floor && attempt.error <= 1.0) {
                let scale = self.compute_step_scale_accepted(
                    attempt.error,
                    particle.step_control.previous_error,
                    attempt.deflection,
                );
                let mut next_step_length = step_length * scale;
                // Don't increase step size if the previous attempt was rejected
                if attempts > 1 && next_step_length > step_length {
                    next_step_length = step_length;
                }
                if limited_externally && attempts == 1 {
                    next_step_length = next_step_length.max(own_limit);
                }

                particle.position = &particle.position + &attempt.displacement;
                particle.direction = attempt.direction;
                particle.trajectory_length += step_length;
                particle.step_control.next_step_length = self.clamp_step_length(next_step_length);
                particle.step_control.previous_error = attempt.error.max(1e-9);

                return Ok(StepOutcome {
                    length: step_length,
                    deflection: attempt.deflection,
                    attempts,
                });
            }

            if at_floor {
                return Err(PropagationError::NumericalDivergence {
                    step_length,
                    error: attempt.error,
                    attempts,
                });
            }

            step_length = (step_length
                * self.compute_step_scale_rejected(attempt.error, attempt.deflection))
            .max(floor);
        }

        Err(PropagationError::NumericalDivergence {
            step_length,
            error: fpr::INFINITY,
            attempts,
        })
    }
}
