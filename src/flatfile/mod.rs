//! Delimited flat-file parsing for the load step

pub mod source;

pub use source::{DelimitedConfig, FlatFileSource};
