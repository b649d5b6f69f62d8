//! Sequential wall-clock timing of a benchmark strategy.

use std::future::Future;
use std::io::Write;
use std::time::Instant;

/// Per-run durations and their median, all in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingResult {
    pub samples: Vec<f64>,
    pub median: f64,
}

/// Runs `f` exactly `n` times, one after the other, and returns the median duration.
///
/// Only the call itself is timed. After each run a `Run <i>: <seconds> s` line is written
/// and flushed to `out`. There is no warm-up, no outlier rejection and no retry: the first
/// failing run aborts the measurement and its error is returned.
///
/// # Errors
///
/// Returns an error if `n` is zero, if any run fails, or if writing to `out` fails.
///
/// # Examples
///
/// ```
/// use bbox_bench::timing::time_it;
///
/// # tokio_test::block_on(async {
/// let mut out = Vec::new();
/// let result = time_it(|| async { Ok::<_, std::io::Error>(42) }, 3, &mut out).await.unwrap();
///
/// assert_eq!(result.samples.len(), 3);
/// assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
/// # });
/// ```
pub async fn time_it<F, Fut, T, E, W>(
    mut f: F,
    n: usize,
    out: &mut W,
) -> Result<TimingResult, Box<dyn std::error::Error + Send + Sync>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    W: Write,
{
    if n == 0 {
        return Err("repetition count must be at least 1".into());
    }

    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let run = f();
        let start = Instant::now();
        if let Err(e) = run.await {
            return Err(e.into());
        }
        let elapsed = start.elapsed().as_secs_f64();

        writeln!(out, "Run {}: {} s", i, elapsed)?;
        out.flush()?;
        samples.push(elapsed);
    }

    let median = median(&samples).ok_or("no samples recorded")?;
    Ok(TimingResult { samples, median })
}

/// Standard median: the middle value for an odd count, the mean of the two middle values
/// for an even count. `None` for an empty slice.
///
/// ```
/// use bbox_bench::timing::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}
