//! Line filtering through an external search program.
//!
//! The program prints `N:text` for each selected line; the numbers are
//! mapped back onto the line index as match flags.

mod bridge;
mod options;
mod relay;

pub use bridge::{apply_matches, run, FilterError, FilterSummary};
pub use options::{tool_args, FilterOptions, ToolSyntax};
