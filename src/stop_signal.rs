use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide stop flag, written by the timeout path and the interrupt
/// handler and polled by every worker.
///
/// The flag only ever goes from running to stopping. There is no way to
/// clear it once raised.
#[derive(Debug)]
pub struct StopSignal {
    stopping: AtomicBool,
}

/// The one signal shared by the whole process.
pub static STOP: StopSignal = StopSignal::new();

impl StopSignal {
    pub const fn new() -> Self {
        Self {
            stopping: AtomicBool::new(false),
        }
    }

    /// Request stop. Returns `true` if this call was the one that raised it.
    pub fn raise(&self) -> bool {
        !self.stopping.swap(true, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
