//! Reading tabulated data from text files.
//!
//! Files contain whitespace separated columns with one row per line.
//! Blank lines and anything following a `#` are ignored. Energies are
//! given in electron volts and lengths in meters.

use super::utils::{parse_numeric_columns, read_text_file};
use crate::{
    constants::EV_TO_J,
    error::{PropagationError, PropagationResult},
    fpr,
    interaction::mean_free_path::TabulatedMeanFreePath,
    table::Table1,
};
use ndarray::prelude::*;
use std::path::Path;

fn read_columns(file_path: &Path, n_columns: usize) -> PropagationResult<Vec<Vec<fpr>>> {
    let text = read_text_file(file_path)?;
    let rows = parse_numeric_columns(&text, n_columns)?;
    if rows.is_empty() {
        return Err(PropagationError::invalid(format!(
            "No data found in {}",
            file_path.display()
        )));
    }
    Ok(rows)
}

/// Reads a two-column table `x y`.
pub fn read_table1(file_path: &Path) -> PropagationResult<Table1> {
    let rows = read_columns(file_path, 2)?;
    let x = rows.iter().map(|row| row[0]).collect::<Array1<_>>();
    let y = rows.iter().map(|row| row[1]).collect::<Array1<_>>();
    Table1::new(x, y)
}

/// Reads a two-column table `energy[eV] mean_free_path[m]` valid at all redshifts.
pub fn read_mean_free_path_table(file_path: &Path) -> PropagationResult<TabulatedMeanFreePath> {
    let rows = read_columns(file_path, 2)?;
    let energies = rows.iter().map(|row| row[0] * EV_TO_J).collect::<Array1<_>>();
    let mean_free_paths = rows.iter().map(|row| row[1]).collect::<Array1<_>>();
    TabulatedMeanFreePath::from_energy_table(energies, mean_free_paths)
}

/// Reads a three-column table `energy[eV] redshift mean_free_path[m]`.
///
/// The rows must cover every combination of the distinct energies and
/// redshifts present, in any order.
pub fn read_mean_free_path_grid(file_path: &Path) -> PropagationResult<TabulatedMeanFreePath> {
    let rows = read_columns(file_path, 3)?;

    let distinct_sorted = |column: usize| {
        let mut values = rows.iter().map(|row| row[column]).collect::<Vec<_>>();
        values.sort_by(fpr::total_cmp);
        values.dedup();
        values
    };
    let energies = distinct_sorted(0);
    let redshifts = distinct_sorted(1);

    let mut mean_free_paths = Array2::from_elem((energies.len(), redshifts.len()), fpr::NAN);
    for row in rows.iter() {
        let i = energies
            .binary_search_by(|value| value.total_cmp(&row[0]))
            .map_err(|_| PropagationError::invalid("Inconsistent energy column"))?;
        let j = redshifts
            .binary_search_by(|value| value.total_cmp(&row[1]))
            .map_err(|_| PropagationError::invalid("Inconsistent redshift column"))?;
        mean_free_paths[[i, j]] = row[2];
    }
    if mean_free_paths.iter().any(|value| value.is_nan()) {
        return Err(PropagationError::invalid(format!(
            "Mean free path grid in {} is missing energy/redshift combinations",
            file_path.display()
        )));
    }

    TabulatedMeanFreePath::new(
        Array1::from(energies).mapv(|energy| energy * EV_TO_J),
        Array1::from(redshifts),
        mean_free_paths,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::mean_free_path::MeanFreePath;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_temporary(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn energy_tables_are_converted_to_joules() {
        let file = write_temporary("# E [eV] lambda [m]\n1e18 2.0\n1e20 4.0\n");
        let table = read_mean_free_path_table(file.path()).unwrap();
        assert_relative_eq!(table.mean_free_path(1e18 * EV_TO_J, 0.0), 2.0, max_relative = 1e-12);
    }

    #[test]
    fn grids_may_be_given_in_any_order() {
        let file = write_temporary("1e20 1.0 3.0\n1e18 0.0 1.0\n1e20 0.0 2.0\n1e18 1.0 1.5\n");
        let table = read_mean_free_path_grid(file.path()).unwrap();
        assert_relative_eq!(table.mean_free_path(1e20 * EV_TO_J, 1.0), 3.0, max_relative = 1e-12);
        assert_relative_eq!(table.mean_free_path(1e18 * EV_TO_J, 1.0), 1.5, max_relative = 1e-12);
    }

    #[test]
    fn incomplete_grids_are_rejected() {
        let file = write_temporary("1e20 1.0 3.0\n1e18 0.0 1.0\n1e20 0.0 2.0\n");
        assert!(read_mean_free_path_grid(file.path()).is_err());
    }
}
