//! Utilities for input/output.

use super::OverwriteMode;
use std::{
    fs,
    io::{self, BufRead, Read, Write},
    path::Path,
};

/// Reads and returns the content of the specified text file.
pub fn read_text_file(file_path: &Path) -> io::Result<String> {
    let file = fs::File::open(file_path)?;
    let mut text = String::new();
    let _ = io::BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

/// Creates the parent directory of the given path if it does not exist.
pub fn create_directory_if_missing(file_path: &Path) -> io::Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Determines whether a file may be written to the given path.
///
/// Returns an error if asking the user for permission fails.
pub fn check_if_write_allowed(file_path: &Path, overwrite_mode: OverwriteMode) -> io::Result<bool> {
    if !file_path.exists() {
        return Ok(true);
    }
    match overwrite_mode {
        OverwriteMode::Always => Ok(true),
        OverwriteMode::Never => {
            eprintln!(
                "Warning: {} already exists, skipping",
                file_path.display()
            );
            Ok(false)
        }
        OverwriteMode::Ask => {
            print!("{} already exists, overwrite? [y/N] ", file_path.display());
            io::stdout().flush()?;
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer)?;
            Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
        }
    }
}

/// Splits the given text into lines of whitespace separated numbers,
/// skipping blank lines and `#` comments.
pub fn parse_numeric_columns(text: &str, n_columns: usize) -> io::Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let row = content
            .split_whitespace()
            .map(|word| {
                word.parse::<f64>().map_err(|err| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Invalid number {} on line {}: {}", word, line_idx + 1, err),
                    )
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        if row.len() != n_columns {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Expected {} columns on line {}, found {}",
                    n_columns,
                    line_idx + 1,
                    row.len()
                ),
            ));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# energy value\n1.0 2.0\n\n3.0 4.0 # trailing\n";
        let rows = parse_numeric_columns(text, 2).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn wrong_column_count_is_an_error() {
        assert!(parse_numeric_columns("1.0 2.0 3.0", 2).is_err());
        assert!(parse_numeric_columns("1.0 abc", 2).is_err());
    }
}
