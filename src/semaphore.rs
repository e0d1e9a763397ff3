use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
///
/// `acquire` suspends the calling thread while the count is zero and then
/// decrements it; `release` increments the count and wakes one waiter.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` initial permits
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Take one permit, blocking until one is available.
    ///
    /// Returns `true` if the caller had to wait.
    pub fn acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        let mut waited = false;
        while *permits == 0 {
            waited = true;
            self.available.wait(&mut permits);
        }
        *permits -= 1;
        waited
    }

    /// Take one permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return one permit and wake a blocked waiter, if any
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }

    /// Current number of permits
    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}
