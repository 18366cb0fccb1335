//! Physical and mathematical constants.
//!
//! All quantities are in SI units unless the name says otherwise.

/// Floating-point precision to use for constants.
#[allow(non_camel_case_types)]
pub type fcn = f64;

// Physical constants

/// Speed of light in vacuum [m/s].
pub const C_LIGHT: fcn = 2.997_924_58e8;
/// Elementary charge [C].
pub const ELEMENTARY_CHARGE: fcn = 1.602_176_634e-19;
/// Proton rest energy [J].
pub const PROTON_REST_ENERGY: fcn = 938.272_088_16 * MEV_TO_J;
/// Neutron rest energy [J].
pub const NEUTRON_REST_ENERGY: fcn = 939.565_420_52 * MEV_TO_J;
/// Atomic mass unit rest energy [J].
pub const AMU_REST_ENERGY: fcn = 931.494_102_42 * MEV_TO_J;
/// Electron rest energy [J].
pub const ELECTRON_REST_ENERGY: fcn = 0.510_998_950 * MEV_TO_J;
/// Mean lifetime of a free neutron [s].
pub const NEUTRON_LIFETIME: fcn = 879.4;
/// Q-value of free neutron beta decay [J].
pub const NEUTRON_DECAY_Q_VALUE: fcn = 0.782_333 * MEV_TO_J;

// Unit conversion factors

/// Conversion factor from electron volts to Joules.
pub const EV_TO_J: fcn = ELEMENTARY_CHARGE;
/// Conversion factor from mega electron volts to Joules.
pub const MEV_TO_J: fcn = 1e6 * EV_TO_J;
/// Conversion factor from exa electron volts to Joules.
pub const EEV_TO_J: fcn = 1e18 * EV_TO_J;
/// Conversion factor from kiloparsecs to meters.
pub const KPC_TO_M: fcn = 3.085_677_581_491_367e19;
/// Conversion factor from megaparsecs to meters.
pub const MPC_TO_M: fcn = 3.085_677_581_491_367e22;
/// Conversion factor from nanogauss to Tesla.
pub const NANOGAUSS_TO_T: fcn = 1e-13;
/// Conversion factor from km/s/Mpc to 1/s.
pub const KM_S_MPC_TO_HZ: fcn = 1e3 / MPC_TO_M;

// Cosmological parameters

/// Default dimensionless Hubble parameter.
pub const DEFAULT_LITTLE_H: fcn = 0.673;
/// Default Hubble constant [1/s].
pub const DEFAULT_HUBBLE_CONSTANT: fcn = 100.0 * DEFAULT_LITTLE_H * KM_S_MPC_TO_HZ;
/// Default matter density parameter.
pub const DEFAULT_OMEGA_MATTER: fcn = 0.315;
/// Default dark energy density parameter.
pub const DEFAULT_OMEGA_LAMBDA: fcn = 0.685;
