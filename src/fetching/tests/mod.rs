// Tests for source discovery and both column fetchers, run against Parquet fixtures
// written to a scratch directory.

mod arrow_fetcher_tests;
