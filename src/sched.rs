//! Scheduler knobs: per-thread processor affinity and process priority.

use std::io;

use crate::error::PinError;

/// Nice value requested by `--high-priority`.
pub const HIGH_PRIORITY_NICE: libc::c_int = -10;

/// Restrict the calling thread to the logical processor `processor_index`.
#[cfg(target_os = "linux")]
pub fn pin_current_thread_to(processor_index: usize) -> Result<(), PinError> {
    let capacity = libc::CPU_SETSIZE as usize;
    if processor_index >= capacity {
        return Err(PinError::IndexOutOfRange {
            index: processor_index,
            capacity,
        });
    }

    // SAFETY: cpu_set_t is a plain bitmask for which all-zeroes is the empty
    // set, the index was checked against CPU_SETSIZE above, and pid 0 names the
    // calling thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(processor_index, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if rc == 0 {
        Ok(())
    } else {
        let code = io::Error::last_os_error().raw_os_error().unwrap_or(-1);
        Err(PinError::Os { code })
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread_to(_processor_index: usize) -> Result<(), PinError> {
    Err(PinError::Unsupported)
}

/// Lower the nice value of the calling thread. Threads spawned afterwards
/// inherit it, so call this before starting workers.
pub fn raise_priority() -> io::Result<()> {
    // SAFETY: setpriority takes no pointers; who = 0 means the caller.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, HIGH_PRIORITY_NICE) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn rejects_index_beyond_cpu_set() {
        let index = libc::CPU_SETSIZE as usize + 5;
        let err = std::thread::spawn(move || pin_current_thread_to(index))
            .join()
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            PinError::IndexOutOfRange {
                index,
                capacity: libc::CPU_SETSIZE as usize
            }
        );
        assert_eq!(err.os_code(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pins_to_a_processor_we_are_allowed_on() {
        // Take the first processor from our own mask so the test holds inside
        // containers and taskset.
        let allowed = std::thread::spawn(|| unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            let rc = libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set);
            assert_eq!(rc, 0);
            (0..libc::CPU_SETSIZE as usize).find(|&cpu| libc::CPU_ISSET(cpu, &set))
        })
        .join()
        .unwrap()
        .expect("process has at least one allowed processor");

        let result = std::thread::spawn(move || pin_current_thread_to(allowed))
            .join()
            .unwrap();
        assert_eq!(result, Ok(()));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn pinning_is_unsupported() {
        assert_eq!(pin_current_thread_to(0), Err(PinError::Unsupported));
    }
}
