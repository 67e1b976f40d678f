//! Reference snapshot extraction and cross-implementation comparison.
//!
//! Reader → Extractor → Comparator: a reference `wout`-style container is
//! reduced to a versioned snapshot, which is then held against a subject
//! solver's input and run outcome.

pub mod compare;
pub mod extract;
pub mod input;
#[cfg(feature = "netcdf")]
pub mod netcdf_container;
pub mod reader;
pub mod report;
pub mod runner;
