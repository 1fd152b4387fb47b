//! Output files written by a run.
//!
//! # Submodules
//!
//! - [`csv`]: one CSV per site with its matching notices
//! - [`json`]: the run summary (window, per-site rows, termination, errors)
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── {Site}_data_{YYYYmmdd_HHMMSS}.csv   # only for sites with results
//! └── run_summary_{YYYYmmdd_HHMMSS}.json  # unless --no-summary
//! ```

pub mod csv;
pub mod json;
