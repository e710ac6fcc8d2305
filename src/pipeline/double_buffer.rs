//! Two-slot handoff between one producer and a fixed set of workers.
//!
//! Pass `k` always uses slot `k % 2`. The producer may fill a slot only after
//! every worker has checked in for the pass that last used it, and workers
//! may start pass `k` only after all of them finished pass `k - 1` and the
//! producer published slot `k % 2` for pass `k`.

use std::sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Batch, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Publication {
    pass: u64,
    last: bool,
}

#[derive(Debug, Default)]
struct HandoffState {
    published: [Option<Publication>; 2],
    checked_in: usize,
    completed_passes: u64,
    aborted: bool,
}

/// Double buffer of read batches guarded by a single condition variable.
#[derive(Debug)]
pub(crate) struct DoubleBuffer {
    slots: [RwLock<Batch>; 2],
    state: Mutex<HandoffState>,
    changed: Condvar,
    workers: usize,
}

/// Slot used by `pass`.
#[inline]
pub(crate) fn slot_for(pass: u64) -> usize {
    (pass % 2) as usize
}

impl DoubleBuffer {
    pub(crate) fn new(batch_size: usize, workers: usize) -> Self {
        Self {
            slots: [
                RwLock::new(Batch::with_capacity(batch_size)),
                RwLock::new(Batch::with_capacity(batch_size)),
            ],
            state: Mutex::new(HandoffState::default()),
            changed: Condvar::new(),
            workers,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandoffState>, PipelineError> {
        self.state.lock().map_err(|_| PipelineError::Panicked)
    }

    /// Block until `slot` holds no unconsumed batch, then hand it to the producer.
    pub(crate) fn acquire_for_fill(&self, slot: usize) -> Result<RwLockWriteGuard<'_, Batch>, PipelineError> {
        let guard = self.lock()?;
        let guard = self
            .changed
            .wait_while(guard, |s| !s.aborted && s.published[slot].is_some())
            .map_err(|_| PipelineError::Panicked)?;
        if guard.aborted {
            return Err(PipelineError::Aborted);
        }
        drop(guard);
        self.slots[slot].write().map_err(|_| PipelineError::Panicked)
    }

    /// Make the freshly filled `slot` visible to workers for `pass`.
    pub(crate) fn publish(&self, pass: u64, last: bool) -> Result<(), PipelineError> {
        let mut guard = self.lock()?;
        guard.published[slot_for(pass)] = Some(Publication { pass, last });
        drop(guard);
        self.changed.notify_all();
        Ok(())
    }

    /// Block until every worker finished the previous pass and the batch for
    /// `pass` is published. Returns the batch and whether it is the final one.
    pub(crate) fn acquire_for_pass(&self, pass: u64) -> Result<(RwLockReadGuard<'_, Batch>, bool), PipelineError> {
        let slot = slot_for(pass);
        let guard = self.lock()?;
        let guard = self
            .changed
            .wait_while(guard, |s| {
                let ready = s.completed_passes == pass
                    && matches!(s.published[slot], Some(p) if p.pass == pass);
                !s.aborted && !ready
            })
            .map_err(|_| PipelineError::Panicked)?;
        if guard.aborted {
            return Err(PipelineError::Aborted);
        }
        let last = guard.published[slot].map_or(false, |p| p.last);
        drop(guard);
        let batch = self.slots[slot].read().map_err(|_| PipelineError::Panicked)?;
        Ok((batch, last))
    }

    /// Record that one worker finished `pass`; the last one releases the slot.
    pub(crate) fn check_in(&self, pass: u64) -> Result<(), PipelineError> {
        let mut guard = self.lock()?;
        guard.checked_in += 1;
        if guard.checked_in == self.workers {
            guard.checked_in = 0;
            guard.published[slot_for(pass)] = None;
            guard.completed_passes = pass + 1;
            drop(guard);
            self.changed.notify_all();
        }
        Ok(())
    }

    /// Wake every waiter and make all further waits fail.
    pub(crate) fn abort(&self) {
        // A poisoned lock still carries the state we need to flip.
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.aborted = true;
        drop(guard);
        self.changed.notify_all();
    }
}

/// Aborts the handoff if the owning task unwinds.
pub(crate) struct AbortOnPanic<'a>(pub(crate) &'a DoubleBuffer);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}
