use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One-shot cancellation event shared between the scheduling loop and its owner.
#[derive(Clone, Debug, Default)]
pub struct StopCondition {
    condition: Arc<(Mutex<bool>, Condvar)>,
}

impl StopCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_stop(&self) {
        let (_, cvar) = &*self.condition;
        *self.lock() = true;
        cvar.notify_all();
    }

    pub fn get_should_stop(&self) -> bool {
        *self.lock()
    }

    /// Blocks until stopped or until `deadline`. Returns whether stop was requested.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (_, cvar) = &*self.condition;
        let mut should_stop = self.lock();
        while !*should_stop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            if timeout.is_zero() {
                break;
            }
            should_stop = cvar
                .wait_timeout(should_stop, timeout)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        *should_stop
    }

    /// Blocks until stopped.
    pub fn wait(&self) {
        let (_, cvar) = &*self.condition;
        let should_stop = self.lock();
        let _stopped = cvar
            .wait_while(should_stop, |should_stop| !*should_stop)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        let (lock, _) = &*self.condition;
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
