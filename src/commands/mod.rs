//! Turns findings and module information into text.
pub mod report;
pub mod tables;

pub use report::*;
