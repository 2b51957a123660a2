use std::time::Duration;

use clap::{value_parser, Parser};

/// Inner iterations per batch. Each iteration is a short chain of dependent
/// divides, so this lands in the tens of milliseconds on current hardware.
pub const DEFAULT_BATCH_ITERATIONS: u64 = 1_000_000;

/// Pin one busy thread per logical processor for a fixed number of seconds.
#[derive(Parser, Debug, Clone)]
#[command(name = "cpu-stress", version)]
pub struct Cli {
    /// Run time in whole seconds
    #[arg(value_parser = value_parser!(u64).range(1..))]
    pub duration: u64,

    /// Worker threads; defaults to every logical processor. Values below 1 mean 1,
    /// values above the processor count mean the processor count
    #[arg(allow_negative_numbers = true)]
    pub threads: Option<i64>,

    /// Arithmetic iterations between two checks of the stop flag
    #[arg(
        long,
        env = "CPU_STRESS_BATCH_ITERATIONS",
        default_value_t = DEFAULT_BATCH_ITERATIONS,
        value_parser = value_parser!(u64).range(1..)
    )]
    pub batch_iterations: u64,

    /// Lower the process nice value before starting workers
    #[arg(long)]
    pub high_priority: bool,

    /// Give up on workers that have not exited this many seconds after stop
    #[arg(long, value_name = "SECONDS")]
    pub join_timeout: Option<u64>,

    /// Log the CPU usage observed during the run
    #[arg(long)]
    pub report_usage: bool,
}

/// Everything a run needs, fixed before the first worker starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub duration_seconds: u64,
    pub requested_thread_count: Option<i64>,
    pub available_processor_count: usize,
    pub batch_iterations: u64,
    pub high_priority: bool,
    pub join_timeout: Option<Duration>,
    pub report_usage: bool,
}

impl Configuration {
    pub fn from_cli(cli: &Cli, available_processor_count: usize) -> Self {
        Self {
            duration_seconds: cli.duration,
            requested_thread_count: cli.threads,
            available_processor_count: available_processor_count.max(1),
            batch_iterations: cli.batch_iterations,
            high_priority: cli.high_priority,
            join_timeout: cli.join_timeout.map(Duration::from_secs),
            report_usage: cli.report_usage,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn effective_thread_count(&self) -> usize {
        effective_thread_count(self.requested_thread_count, self.available_processor_count)
    }
}

/// Logical processors this process may run on.
pub fn available_processors() -> usize {
    num_cpus::get().max(1)
}

/// Clamp a requested worker count into `[1, available]`.
pub fn effective_thread_count(requested: Option<i64>, available: usize) -> usize {
    let available = available.max(1);
    match requested {
        None => available,
        Some(n) if n < 1 => 1,
        Some(n) => usize::try_from(n).map_or(available, |n| n.min(available)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("cpu-stress").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_every_processor() {
        assert_eq!(effective_thread_count(None, 8), 8);
    }

    #[test]
    fn clamps_requests_into_range() {
        assert_eq!(effective_thread_count(Some(0), 8), 1);
        assert_eq!(effective_thread_count(Some(-3), 8), 1);
        assert_eq!(effective_thread_count(Some(i64::MIN), 8), 1);
        assert_eq!(effective_thread_count(Some(2), 8), 2);
        assert_eq!(effective_thread_count(Some(8), 8), 8);
        assert_eq!(effective_thread_count(Some(99), 8), 8);
        assert_eq!(effective_thread_count(Some(i64::MAX), 8), 8);
    }

    #[test]
    fn always_within_bounds() {
        for available in [0usize, 1, 2, 3, 8, 64] {
            for requested in [-1000i64, -1, 0, 1, 2, 7, 8, 9, 1000] {
                let n = effective_thread_count(Some(requested), available);
                assert!(n >= 1);
                assert!(n <= available.max(1));
            }
        }
    }

    #[test]
    fn parses_duration_and_threads() {
        let cli = parse(&["1", "2"]).unwrap();
        assert_eq!(cli.duration, 1);
        assert_eq!(cli.threads, Some(2));
        assert_eq!(cli.batch_iterations, DEFAULT_BATCH_ITERATIONS);
        assert!(!cli.high_priority);
        assert_eq!(cli.join_timeout, None);
    }

    #[test]
    fn accepts_negative_thread_count() {
        let cli = parse(&["5", "-4"]).unwrap();
        let config = Configuration::from_cli(&cli, 4);
        assert_eq!(config.effective_thread_count(), 1);
    }

    #[test]
    fn rejects_missing_or_zero_duration() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["0"]).is_err());
        assert!(parse(&["soon"]).is_err());
    }

    #[test]
    fn rejects_zero_batch() {
        assert!(parse(&["1", "--batch-iterations", "0"]).is_err());
    }

    #[test]
    fn builds_configuration() {
        let cli = parse(&["3", "--join-timeout", "2", "--report-usage"]).unwrap();
        let config = Configuration::from_cli(&cli, 0);
        assert_eq!(config.available_processor_count, 1);
        assert_eq!(config.effective_thread_count(), 1);
        assert_eq!(config.duration(), Duration::from_secs(3));
        assert_eq!(config.join_timeout, Some(Duration::from_secs(2)));
        assert!(config.report_usage);
    }
}
