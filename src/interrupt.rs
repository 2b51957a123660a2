use crate::stop_signal::StopSignal;

/// Route Ctrl+C, SIGTERM and SIGHUP to `signal` instead of killing the process.
///
/// The handler runs on ctrlc's own thread and does nothing but raise the flag.
/// Workers notice it on their next poll; the orchestrator's wait notices it on
/// its next slice.
pub fn install(signal: &'static StopSignal) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        signal.raise();
    })
}
