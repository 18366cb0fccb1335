//! Utilities for creating the command line interface.

use crate::{
    exit_on_error, exit_on_false,
    fpr,
    geometry::{Dim3, In3D},
    io::{OverwriteMode, Verbosity},
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::ProgressStyle;
use lazy_static::lazy_static;
use std::str::FromStr;

lazy_static! {
    static ref DEFAULT_PROGRESS_STYLE: ProgressStyle = ProgressStyle::default_bar()
        .template("Progress: {bar:40}  {percent}% | ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
}

pub fn parse_value_string<T>(argument_name: &str, value_string: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    exit_on_error!(
        value_string.trim().parse(),
        "Error: Could not parse value for {0}: {1}",
        argument_name
    )
}

fn verify_finite_float_value(argument_name: &str, value: fpr) {
    exit_on_false!(value.is_finite(), "Error: {} must be finite", argument_name);
}

fn verify_argument_value_count<T>(argument_name: &str, values: &[T], required_count: usize) {
    let count = values.len();
    exit_on_false!(
        count == required_count,
        "Error: {} must have {} values, got {}",
        argument_name,
        required_count,
        count
    );
}

pub fn get_value_from_required_parseable_argument<T>(arguments: &ArgMatches, argument_name: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    parse_value_string(
        argument_name,
        arguments
            .get_one::<String>(argument_name)
            .expect("No value for required argument"),
    )
}

pub fn get_value_from_parseable_argument<T>(arguments: &ArgMatches, argument_name: &str) -> Option<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    arguments
        .get_one::<String>(argument_name)
        .map(|value_string| parse_value_string(argument_name, value_string))
}

pub fn get_value_from_parseable_argument_with_default<T>(
    arguments: &ArgMatches,
    argument_name: &str,
    default_value: T,
) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    get_value_from_parseable_argument(arguments, argument_name).unwrap_or(default_value)
}

pub fn get_finite_float_value_from_parseable_argument(
    arguments: &ArgMatches,
    argument_name: &str,
) -> Option<fpr> {
    let value = get_value_from_parseable_argument(arguments, argument_name);
    if let Some(value) = value {
        verify_finite_float_value(argument_name, value);
    }
    value
}

pub fn get_values_from_parseable_argument<T>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> Option<Vec<T>>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    arguments.get_many::<String>(argument_name).map(|values| {
        values
            .filter(|value_string| !value_string.is_empty())
            .map(|value_string| parse_value_string(argument_name, value_string))
            .collect()
    })
}

/// Parses an argument with exactly two values, such as a pair of limits.
pub fn parse_limits(arguments: &ArgMatches, argument_name: &str) -> Option<(fpr, fpr)> {
    get_values_from_parseable_argument::<fpr>(arguments, argument_name).map(|values| {
        verify_argument_value_count(argument_name, &values, 2);
        exit_on_false!(
            values.iter().all(|value| !value.is_nan()),
            "Error: {} contains a NaN value",
            argument_name
        );
        exit_on_false!(
            values[0] <= values[1],
            "Error: Lower limit of {} must not exceed upper limit",
            argument_name
        );
        (values[0], values[1])
    })
}

/// Parses an argument with exactly three finite values.
pub fn parse_3d_float_values(arguments: &ArgMatches, argument_name: &str) -> Option<In3D<fpr>> {
    get_values_from_parseable_argument::<fpr>(arguments, argument_name).map(|values| {
        verify_argument_value_count(argument_name, &values, 3);
        let values = In3D::with_each_component(|dim| values[dim as usize]);
        Dim3::slice()
            .iter()
            .for_each(|&dim| verify_finite_float_value(argument_name, values[dim]));
        values
    })
}

/// Creates an argument taking a single value.
pub fn value_arg(name: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name(value_name)
        .help(help)
        .action(ArgAction::Set)
}

/// Creates an argument taking a comma separated list of values.
pub fn list_arg(name: &'static str, value_names: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name(value_names)
        .help(help)
        .value_delimiter(',')
        .num_args(1..)
        .action(ArgAction::Set)
}

/// Creates a boolean flag.
pub fn flag_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

/// Adds the `overwrite`, `no-overwrite`, `verbose` and `progress` flags.
pub fn add_output_control_args(command: Command) -> Command {
    command
        .arg(flag_arg("overwrite", "Automatically overwrite any existing files").conflicts_with("no-overwrite"))
        .arg(flag_arg("no-overwrite", "Do not overwrite any existing files"))
        .arg(flag_arg("verbose", "Print status messages").short('v'))
        .arg(flag_arg("progress", "Show progress bar").short('p'))
}

pub fn overwrite_mode_from_arguments(arguments: &ArgMatches) -> OverwriteMode {
    if arguments.get_flag("overwrite") {
        OverwriteMode::Always
    } else if arguments.get_flag("no-overwrite") {
        OverwriteMode::Never
    } else {
        OverwriteMode::Ask
    }
}

pub fn parse_verbosity(arguments: &ArgMatches, support_progress: bool) -> Verbosity {
    if support_progress && arguments.get_flag("progress") {
        Verbosity::Progress(DEFAULT_PROGRESS_STYLE.clone())
    } else if arguments.get_flag("verbose") {
        Verbosity::Messages
    } else {
        Verbosity::Quiet
    }
}
