// Crate-level tests: shared fixtures, end-to-end strategy runs and the command-line entry point.

pub mod fixtures;
