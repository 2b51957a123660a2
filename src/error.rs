use std::collections::TryReserveError;

use thiserror::Error;

/// Fatal failures of a stress run.
#[derive(Debug, Error)]
pub enum StressError {
    #[error("could not allocate bookkeeping for {count} workers")]
    Resource {
        count: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Why a worker could not be pinned to its processor. Always recoverable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinError {
    #[error("processor index {index} exceeds the affinity mask capacity of {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },
    #[error("sched_setaffinity failed (os error {code})")]
    Os { code: i32 },
    #[error("thread affinity is not supported on this platform")]
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    Unsupported,
}

impl PinError {
    /// Raw OS error code, when the failure came from the kernel.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            PinError::Os { code } => Some(*code),
            _ => None,
        }
    }
}
