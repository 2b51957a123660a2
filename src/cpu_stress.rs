use std::hint;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::error::StressError;
use crate::interrupt;
use crate::sched;
use crate::stop_signal::{StopSignal, STOP};
use crate::usage::UsageProbe;

/// Longest stretch the orchestrator sleeps without looking at the stop flag.
const WAIT_SLICE: Duration = Duration::from_millis(50);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// A running worker and the processor it was told to occupy.
pub struct WorkerHandle {
    processor: usize,
    thread: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Workers we tried to start.
    pub requested: usize,
    /// Processor index of every worker that actually started, in spawn order.
    pub spawned: Vec<usize>,
    /// Stop was raised from outside before the timer ran out.
    pub interrupted: bool,
    /// Workers abandoned by `--join-timeout`.
    pub stragglers: usize,
    pub elapsed: Duration,
}

/// One batch of dependent floating point work. Every step needs the previous
/// result, and the result stays within (0.5, 1.5].
pub fn burn_batch(mut x: f64, iterations: u64) -> f64 {
    for _ in 0..iterations {
        x = x * 1.000_000_1 + 0.000_000_1;
        x = x / 1.000_000_07 + 0.000_000_09;
        x = 1.0 / (x * x + 1.0) + 0.5;
    }
    x
}

fn run_worker(processor: usize, stop: &StopSignal, batch_iterations: u64) {
    match sched::pin_current_thread_to(processor) {
        Ok(()) => debug!(processor, "worker pinned"),
        Err(err) => warn!(
            processor,
            os_error = err.os_code(),
            %err,
            "could not pin worker, running unpinned"
        ),
    }

    let mut x: f64 = rand::rng().random_range(1.0..2.0);
    while !stop.is_raised() {
        x = hint::black_box(burn_batch(x, batch_iterations));
    }
}

fn spawn_worker(
    processor: usize,
    stop: &'static StopSignal,
    batch_iterations: u64,
) -> io::Result<WorkerHandle> {
    let thread = thread::Builder::new()
        .name(format!("cpu-stress-{processor}"))
        .spawn(move || run_worker(processor, stop, batch_iterations))?;
    Ok(WorkerHandle { processor, thread })
}

/// Sleep until `duration` has passed or `stop` is raised, whichever is first.
fn wait_for(duration: Duration, stop: &StopSignal) {
    let deadline = Instant::now().checked_add(duration);
    while !stop.is_raised() {
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return;
                }
                (deadline - now).min(WAIT_SLICE)
            }
            None => WAIT_SLICE,
        };
        thread::sleep(slice);
    }
}

/// Join every worker. Returns how many were abandoned because `timeout` ran out.
fn join_workers(workers: Vec<WorkerHandle>, timeout: Option<Duration>) -> usize {
    if let Some(timeout) = timeout {
        let deadline = Instant::now().checked_add(timeout);
        while workers.iter().any(|w| !w.thread.is_finished())
            && deadline.map_or(true, |d| Instant::now() < d)
        {
            thread::sleep(JOIN_POLL);
        }
    }

    let mut stragglers = 0;
    for worker in workers {
        if timeout.is_some() && !worker.thread.is_finished() {
            warn!(processor = worker.processor, "worker ignored stop, abandoning it");
            stragglers += 1;
            continue;
        }
        if worker.thread.join().is_err() {
            warn!(processor = worker.processor, "worker panicked");
        }
    }
    stragglers
}

/// Load `config.effective_thread_count()` processors until the duration
/// elapses or `stop` is raised, then wait for every worker to exit.
pub fn stress_cpu(
    config: &Configuration,
    stop: &'static StopSignal,
) -> Result<RunReport, StressError> {
    stress_cpu_with(config, stop, |processor| {
        spawn_worker(processor, stop, config.batch_iterations)
    })
}

/// `stress_cpu` with the thread start swapped out. `spawn` gets each
/// processor index in order.
pub(crate) fn stress_cpu_with(
    config: &Configuration,
    stop: &StopSignal,
    mut spawn: impl FnMut(usize) -> io::Result<WorkerHandle>,
) -> Result<RunReport, StressError> {
    let started = Instant::now();
    let requested = config.effective_thread_count();

    let mut workers: Vec<WorkerHandle> = Vec::new();
    workers
        .try_reserve_exact(requested)
        .map_err(|source| StressError::Resource {
            count: requested,
            source,
        })?;

    for processor in 0..requested {
        match spawn(processor) {
            Ok(worker) => workers.push(worker),
            Err(err) => warn!(
                index = processor,
                os_error = err.raw_os_error(),
                %err,
                "could not start worker"
            ),
        }
    }
    let spawned: Vec<usize> = workers.iter().map(|w| w.processor).collect();
    debug!(requested, started = spawned.len(), "workers running");

    let probe = config.report_usage.then(UsageProbe::start);
    wait_for(config.duration(), stop);
    let usage = probe.map(UsageProbe::finish);

    let interrupted = !stop.raise();
    let stragglers = join_workers(workers, config.join_timeout);

    if let Some(sample) = usage {
        sample.log(&spawned);
    }

    let elapsed = started.elapsed();
    debug!(?elapsed, interrupted, stragglers, "workers joined");

    Ok(RunReport {
        requested,
        spawned,
        interrupted,
        stragglers,
        elapsed,
    })
}

/// Full run against the process-wide stop signal: announce, hook interrupts,
/// optionally raise priority, then stress.
pub fn run(config: &Configuration) -> Result<RunReport, StressError> {
    println!(
        "Stressing CPU for {} seconds using {} threads (of {} logical CPUs)",
        config.duration_seconds,
        config.effective_thread_count(),
        config.available_processor_count
    );

    if let Err(err) = interrupt::install(&STOP) {
        warn!(%err, "could not register interrupt handler, only the timeout will stop the run");
    }

    if config.high_priority {
        if let Err(err) = sched::raise_priority() {
            warn!(os_error = err.raw_os_error(), %err, "could not raise process priority");
        }
    }

    stress_cpu(config, &STOP)
}
