//! Bounding-Box Read Benchmark - Command Line Interface
//!
//! Times one retrieval strategy against the Overture Maps buildings release and prints the
//! median duration over five runs.
//!
//! # Usage
//!
//! ```bash
//! bbox-bench --pyarrow-index      # Arrow reader, spatial index first
//! bbox-bench --pyarrow-no-index   # Arrow reader, full dataset scan
//! bbox-bench --duckdb-no-index    # DuckDB, glob over the dataset
//! bbox-bench --duckdb-index       # DuckDB, spatial index first
//! ```
//!
//! # Output
//!
//! ```text
//! Run 0: 12.41 s
//! ...
//! Run 4: 11.87 s
//! Median time is 12.02
//! ```
//!
//! # Exit Codes
//!
//! - `0` - All runs completed
//! - `1` - Missing or invalid option, or a run failed
//!

use std::env;
use std::io;
use std::process;
use bbox_bench::{run_benchmark, BenchmarkConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let mut stdout = io::stdout();
    if let Err(e) = run_benchmark(&args, BenchmarkConfig::default(), &mut stdout).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
