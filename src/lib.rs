//! The `sextant` crate propagates cosmic rays through periodic simulation
//! volumes and records the ones reaching an observer within a redshift window.

pub mod boundary;
pub mod constants;
pub mod cosmology;
pub mod error;
pub mod field;
pub mod geometry;
pub mod interaction;
pub mod io;
pub mod num;
pub mod observer;
pub mod particle;
pub mod pipeline;
pub mod runner;
pub mod source;
pub mod stepping;
pub mod table;

#[cfg(feature = "cli")]
pub mod cli;

/// Floating-point precision to use for propagation.
#[allow(non_camel_case_types)]
pub type fpr = f64;

#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if $logic {
            true
        } else {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}

#[macro_export]
macro_rules! exit_on_none {
    ($option:expr, $($print_arg:tt)*) => {
        $option.unwrap_or_else(|| $crate::exit_with_error!($($print_arg)*))
    };
}
