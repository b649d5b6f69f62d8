pub mod bbox_predicate;

// Link to test module (only compiled during tests)
#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
