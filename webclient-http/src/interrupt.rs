//! Per-thread interrupt flag for blocking calls.
//!
//! Each thread owns one flag. Another thread holding the
//! [`InterruptHandle`] can set it; a blocking retry then stops at its next
//! check or wakes from its backoff sleep and fails with
//! [`HttpClientError::Interrupted`]. The flag stays set until cleared.

use crate::{HttpClientError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

thread_local! {
    static CURRENT: InterruptHandle = InterruptHandle::new();
}

#[derive(Debug, Default)]
struct Flag {
    interrupted: Mutex<bool>,
    wakeup: Condvar,
}

/// Handle to one thread's interrupt flag.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<Flag>,
}

impl InterruptHandle {
    fn new() -> Self {
        Self {
            flag: Arc::new(Flag::default()),
        }
    }

    /// Set the flag and wake the owning thread if it is sleeping.
    pub fn interrupt(&self) {
        *self.flag.interrupted.lock() = true;
        self.flag.wakeup.notify_all();
    }

    /// Check the flag without clearing it.
    pub fn is_interrupted(&self) -> bool {
        *self.flag.interrupted.lock()
    }

    /// Clear the flag, returning its previous value.
    pub fn clear(&self) -> bool {
        std::mem::replace(&mut *self.flag.interrupted.lock(), false)
    }

    fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(duration);
        let mut interrupted = self.flag.interrupted.lock();
        loop {
            if *interrupted {
                return Err(HttpClientError::Interrupted);
            }
            let timed_out = match deadline {
                Some(deadline) => self.flag.wakeup.wait_until(&mut interrupted, deadline).timed_out(),
                None => {
                    self.flag.wakeup.wait(&mut interrupted);
                    false
                }
            };
            if timed_out {
                return if *interrupted {
                    Err(HttpClientError::Interrupted)
                } else {
                    Ok(())
                };
            }
        }
    }
}

/// Handle to the calling thread's flag.
pub fn current() -> InterruptHandle {
    CURRENT.with(InterruptHandle::clone)
}

/// Check the calling thread's flag.
pub fn is_interrupted() -> bool {
    CURRENT.with(InterruptHandle::is_interrupted)
}

/// Clear the calling thread's flag, returning its previous value.
pub fn clear() -> bool {
    CURRENT.with(InterruptHandle::clear)
}

/// Sleep on the calling thread, waking early if it is interrupted.
pub(crate) fn sleep(duration: Duration) -> Result<()> {
    CURRENT.with(|handle| handle.sleep(duration))
}
