//! Derived-field helpers
//!
//! Pure functions that turn post data into display values: localized dates
//! and reading time.

mod date;
mod reading;

pub use date::*;
pub use reading::*;
