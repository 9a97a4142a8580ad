// ============================================================================
// predux - Notification Scheduling
// Deferring change notifications to a later "frame"
// ============================================================================
//
// A store coalesces the notifications of all dispatches that happen before
// the next frame into one. What a frame is belongs to the host: an event
// loop iteration, a render tick, a timer. Stores only see the `Scheduler`
// trait.
//
// Two implementations ship with the crate:
// - FrameScheduler: a queue the host pumps with `run_frame`
// - ImmediateScheduler: runs callbacks right away (no coalescing)
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Callback scheduled for a future frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Opaque handle of a scheduled callback, used for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

// =============================================================================
// SCHEDULER TRAIT
// =============================================================================

/// Host abstraction for running a callback at a later point.
pub trait Scheduler {
    /// Schedule `callback` for the next frame.
    fn schedule(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a scheduled callback. Unknown or already run handles are ignored.
    fn cancel(&self, handle: FrameHandle);
}

// =============================================================================
// FRAME SCHEDULER
// =============================================================================

/// A frame queue driven by the host.
///
/// Callbacks scheduled while a frame is running are deferred to the next
/// frame, the same way an animation frame callback that requests another
/// frame does not run twice in one frame.
#[derive(Default)]
pub struct FrameScheduler {
    next_id: Cell<u64>,
    queue: RefCell<VecDeque<(FrameHandle, FrameCallback)>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Run every callback queued before this call. Returns how many ran.
    ///
    /// Callbacks are taken one at a time, so a callback cancelled by an
    /// earlier one in the same frame does not run.
    pub fn run_frame(&self) -> usize {
        let boundary = self.next_id.get();
        let mut count = 0;

        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.front() {
                    Some((handle, _)) if handle.0 <= boundary => queue.pop_front(),
                    _ => None,
                }
            };
            let Some((_, callback)) = next else {
                break;
            };

            callback();
            count += 1;
        }

        count
    }
}

impl Scheduler for FrameScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let handle = FrameHandle(id);
        self.queue.borrow_mut().push_back((handle, callback));
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != handle);
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

// =============================================================================
// IMMEDIATE SCHEDULER
// =============================================================================

/// Runs callbacks synchronously inside `schedule`.
///
/// Every dispatch that changes state is then followed by its own
/// notification. Useful for tests and hosts without a frame concept.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    next_id: Cell<u64>,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        callback();
        FrameHandle(id)
    }

    fn cancel(&self, _handle: FrameHandle) {}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn frame_runs_queued_callbacks_in_order() {
        let frames = FrameScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            frames.schedule(Box::new(move || log.borrow_mut().push(i)));
        }

        assert_eq!(frames.pending(), 3);
        assert_eq!(frames.run_frame(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(frames.is_idle());
    }

    #[test]
    fn cancelled_callbacks_never_run() {
        let frames = FrameScheduler::new();
        let ran = Rc::new(Cell::new(false));

        let handle = frames.schedule(Box::new({
            let ran = ran.clone();
            move || ran.set(true)
        }));
        frames.cancel(handle);

        assert_eq!(frames.run_frame(), 0);
        assert!(!ran.get());

        // cancelling twice is harmless
        frames.cancel(handle);
    }

    #[test]
    fn callbacks_scheduled_during_a_frame_wait_for_the_next() {
        let frames = Rc::new(FrameScheduler::new());
        let count = Rc::new(Cell::new(0));

        frames.schedule(Box::new({
            let frames = frames.clone();
            let count = count.clone();
            move || {
                count.set(count.get() + 1);
                let count = count.clone();
                frames.schedule(Box::new(move || count.set(count.get() + 10)));
            }
        }));

        assert_eq!(frames.run_frame(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(frames.pending(), 1);

        assert_eq!(frames.run_frame(), 1);
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn cancelling_during_a_frame_skips_the_cancelled_callback() {
        let frames = Rc::new(FrameScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = Rc::new(Cell::new(None));

        frames.schedule(Box::new({
            let frames = frames.clone();
            let victim = victim.clone();
            let log = log.clone();
            move || {
                log.borrow_mut().push("first");
                if let Some(handle) = victim.get() {
                    frames.cancel(handle);
                }
            }
        }));
        victim.set(Some(frames.schedule(Box::new({
            let log = log.clone();
            move || log.borrow_mut().push("cancelled")
        }))));
        frames.schedule(Box::new({
            let log = log.clone();
            move || log.borrow_mut().push("last")
        }));

        assert_eq!(frames.run_frame(), 2);
        assert_eq!(*log.borrow(), vec!["first", "last"]);
        assert!(frames.is_idle());
    }

    #[test]
    fn handles_are_unique() {
        let frames = FrameScheduler::new();
        let a = frames.schedule(Box::new(|| {}));
        let b = frames.schedule(Box::new(|| {}));
        assert_ne!(a, b);
        assert_eq!(b.id(), a.id() + 1);
    }

    #[test]
    fn immediate_scheduler_runs_inline() {
        let scheduler = ImmediateScheduler::new();
        let ran = Rc::new(Cell::new(0));

        scheduler.schedule(Box::new({
            let ran = ran.clone();
            move || ran.set(ran.get() + 1)
        }));

        assert_eq!(ran.get(), 1);
    }
}
