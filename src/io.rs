//! File input/output and status reporting.

pub mod output;
pub mod tables;
pub mod utils;

use indicatif::{ProgressBar, ProgressStyle};

/// How much to report while running.
#[derive(Clone)]
pub enum Verbosity {
    /// Only report errors.
    Quiet,
    /// Report status messages and warnings.
    Messages,
    /// Report status messages and warnings, and show a progress bar
    /// with the given style.
    Progress(ProgressStyle),
}

impl std::fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiet => write!(f, "Quiet"),
            Self::Messages => write!(f, "Messages"),
            Self::Progress(_) => f.debug_tuple("Progress").finish_non_exhaustive(),
        }
    }
}

impl Verbosity {
    /// Whether non-critical status messages and warnings should be printed.
    pub fn print_messages(&self) -> bool {
        !matches!(self, Self::Quiet)
    }

    /// Returns the progress bar style if progress should be shown.
    pub fn progress_style(&self) -> Option<&ProgressStyle> {
        match self {
            Self::Progress(style) => Some(style),
            _ => None,
        }
    }

    /// Creates a progress bar over the given number of items, hidden
    /// unless progress should be shown.
    pub fn create_progress_bar(&self, n_items: usize) -> ProgressBar {
        match self {
            Self::Progress(style) => ProgressBar::new(n_items as u64).with_style(style.clone()),
            _ => ProgressBar::hidden(),
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Quiet
    }
}

/// What to do when an output file already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteMode {
    /// Ask the user on the command line.
    Ask,
    Always,
    Never,
}
