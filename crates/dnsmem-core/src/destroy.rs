//! Destroy-notification dispatch: a FIFO queue of `(task, event)` pairs
//! delivered exactly once, in registration order, as a context's final
//! act (spec.md §2, §4.1 `on_destroy`).
//!
//! The event-loop/task manager that actually owns `event` numbers and
//! delivers them is an out-of-scope collaborator (spec.md §1); this
//! module defines only the trait seam it is expected to implement —
//! modeled as a capability handle passed in, the same way
//! `dnsmem-backend::Backend::Custom` models the caller-supplied
//! alloc/free pair.

use std::sync::Arc;

/// Opaque event identifier, meaningful only to the task collaborator that
/// registered it (the DNS event-number registry, out of scope here).
pub type EventId = u32;

/// The event-loop/task-manager collaborator. `notify` delivers `event` to
/// whatever task this handle represents; this crate never inspects the
/// delivery mechanism.
pub trait DestroyTarget: Send + Sync {
    fn notify(&self, event: EventId);
}

pub(crate) struct DestroyEntry {
    task: Arc<dyn DestroyTarget>,
    event: EventId,
}

#[derive(Default)]
pub struct DestroyQueue {
    entries: Vec<DestroyEntry>,
}

impl DestroyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Arc<dyn DestroyTarget>, event: EventId) {
        self.entries.push(DestroyEntry { task, event });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every queued entry, in FIFO order, resetting the
    /// queue.
    pub(crate) fn drain(&mut self) -> Vec<DestroyEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Dispatch every entry drained from a [`DestroyQueue`], in order. A
/// context's `Drop` impl calls this as its final act, after releasing
/// its internal lock — delivery must never happen while the context lock
/// is held, since a task's `notify` may itself call back into this or
/// another context.
pub(crate) fn dispatch(entries: Vec<DestroyEntry>) {
    for entry in entries {
        entry.task.notify(entry.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingTarget {
        seen: Mutex<Vec<EventId>>,
    }

    impl DestroyTarget for RecordingTarget {
        fn notify(&self, event: EventId) {
            self.seen.lock().unwrap().push(event);
        }
    }

    #[test]
    fn dispatch_delivers_in_fifo_order() {
        let target = Arc::new(RecordingTarget {
            seen: Mutex::new(Vec::new()),
        });
        let mut queue = DestroyQueue::new();
        queue.push(target.clone(), 1);
        queue.push(target.clone(), 2);
        queue.push(target.clone(), 3);
        assert_eq!(queue.len(), 3);

        dispatch(queue.drain());

        assert!(queue.is_empty());
        assert_eq!(*target.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn dispatch_delivers_across_distinct_targets_in_registration_order() {
        let log: Arc<Mutex<Vec<(&'static str, EventId)>>> = Arc::new(Mutex::new(Vec::new()));

        struct TaggedTarget {
            tag: &'static str,
            log: Arc<Mutex<Vec<(&'static str, EventId)>>>,
        }
        impl DestroyTarget for TaggedTarget {
            fn notify(&self, event: EventId) {
                self.log.lock().unwrap().push((self.tag, event));
            }
        }

        let mut queue = DestroyQueue::new();
        queue.push(
            Arc::new(TaggedTarget {
                tag: "a",
                log: log.clone(),
            }),
            10,
        );
        queue.push(
            Arc::new(TaggedTarget {
                tag: "b",
                log: log.clone(),
            }),
            20,
        );

        dispatch(queue.drain());

        assert_eq!(*log.lock().unwrap(), vec![("a", 10), ("b", 20)]);
    }

    #[test]
    fn empty_queue_dispatch_is_a_no_op() {
        let mut queue = DestroyQueue::new();
        assert!(queue.is_empty());
        dispatch(queue.drain());
    }
}
