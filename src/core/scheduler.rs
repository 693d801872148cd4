//! Windowed task scheduler.
//!
//! Runs a callback-style worker over an ordered sequence while keeping at
//! most `limit` invocations outstanding. Results land in the slot of the item
//! that produced them, so output order equals input order no matter which
//! worker finishes first. The first failure aborts the run: no further items
//! are dispatched and `done` receives that failure. Workers that were already
//! running are not interrupted; whatever they report afterwards is dropped.
//!
//! # Design
//!
//! - All counters live in one `SchedulerState` behind a `parking_lot::Mutex`.
//!   Completions may arrive on any runtime thread.
//! - Dispatch happens in `Run::drive`, a loop rather than a recursive
//!   callback chain. A completion that arrives while another frame is driving
//!   only frees its slot; the active loop notices and fills it.
//! - Neither workers nor `done` run while the lock is held, so a worker that
//!   completes synchronously cannot deadlock the scheduler.
//! - `done` is stored as an `Option` and taken on first use, which makes the
//!   exactly-once guarantee structural.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::bridge::{Callback, Outcome};
use crate::core::Limit;

type Done<R, E> = Box<dyn FnOnce(Outcome<Vec<R>, E>) + Send>;

/// Lifecycle of one scheduler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Items remain to be dispatched or are in flight.
    Running,
    /// Every item completed and `done` received the results.
    Completed,
    /// A task failed and `done` received the failure.
    Aborted,
}

/// Mutable per-invocation state.
struct SchedulerState<T, R, E> {
    /// Items not yet dispatched; `None` once taken.
    items: Vec<Option<T>>,
    results: Vec<Option<R>>,
    cursor: usize,
    in_flight: usize,
    completed: usize,
    aborted: bool,
    /// Set while some frame is inside the dispatch loop.
    driving: bool,
    done: Option<Done<R, E>>,
}

impl<T, R, E> SchedulerState<T, R, E> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn phase(&self) -> Phase {
        if self.aborted {
            Phase::Aborted
        } else if self.completed == self.len() {
            Phase::Completed
        } else {
            Phase::Running
        }
    }

    /// Take the next item if the window admits one.
    fn take_next(&mut self, limit: Limit) -> Option<(usize, T)> {
        if self.aborted || self.cursor >= self.len() || !limit.allows(self.in_flight) {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        self.in_flight += 1;
        self.items[index].take().map(|item| (index, item))
    }
}

/// Shared handle to one scheduler invocation.
struct Run<T, R, E, W> {
    id: Uuid,
    limit: Limit,
    worker: W,
    state: Mutex<SchedulerState<T, R, E>>,
}

impl<T, R, E, W> Run<T, R, E, W>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    W: Fn(T, Callback<R, E>) + Send + Sync + 'static,
{
    /// Dispatch until the window is full or nothing is left.
    fn drive(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.driving {
                return;
            }
            state.driving = true;
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.take_next(self.limit);
                if next.is_none() {
                    state.driving = false;
                }
                next
            };
            let Some((index, item)) = next else {
                return;
            };

            debug!(run_id = %self.id, index, "dispatching item");
            let run = Arc::clone(self);
            (self.worker)(
                item,
                Callback::new(move |outcome| run.on_complete(index, outcome)),
            );
        }
    }

    fn on_complete(self: &Arc<Self>, index: usize, outcome: Outcome<R, E>) {
        let mut state = self.state.lock();
        state.in_flight -= 1;

        if state.aborted {
            debug!(run_id = %self.id, index, "discarding completion after abort");
            return;
        }

        match outcome {
            Err(error) => {
                state.aborted = true;
                let done = state.done.take();
                drop(state);
                warn!(run_id = %self.id, index, "task failed; aborting run");
                if let Some(done) = done {
                    done(Err(error));
                }
            }
            Ok(value) => {
                state.results[index] = Some(value);
                state.completed += 1;
                if state.phase() == Phase::Completed {
                    let results: Vec<R> = std::mem::take(&mut state.results)
                        .into_iter()
                        .flatten()
                        .collect();
                    let done = state.done.take();
                    drop(state);
                    info!(run_id = %self.id, total = results.len(), "run completed");
                    if let Some(done) = done {
                        done(Ok(results));
                    }
                } else {
                    drop(state);
                    self.drive();
                }
            }
        }
    }
}

/// Apply `worker` to every item with at most `limit` invocations in flight.
///
/// `done` fires exactly once: with every result in input order, or with the
/// first failure. Empty input fires `done(Ok(vec![]))` before returning,
/// without calling `worker`.
pub fn schedule<T, R, E, W, D>(items: Vec<T>, limit: Limit, worker: W, done: D)
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    W: Fn(T, Callback<R, E>) + Send + Sync + 'static,
    D: FnOnce(Outcome<Vec<R>, E>) + Send + 'static,
{
    let id = Uuid::new_v4();
    let len = items.len();
    debug!(run_id = %id, len, limit = %limit, "scheduling run");

    if len == 0 {
        done(Ok(Vec::new()));
        return;
    }

    let run = Arc::new(Run {
        id,
        limit,
        worker,
        state: Mutex::new(SchedulerState {
            items: items.into_iter().map(Some).collect(),
            results: std::iter::repeat_with(|| None).take(len).collect(),
            cursor: 0,
            in_flight: 0,
            completed: 0,
            aborted: false,
            driving: false,
            done: Some(Box::new(done)),
        }),
    });
    run.drive();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Slot<R, E> = Arc<Mutex<Vec<Outcome<Vec<R>, E>>>>;

    fn collector<R: Send + 'static, E: Send + 'static>(
    ) -> (Slot<R, E>, impl FnOnce(Outcome<Vec<R>, E>) + Send + 'static) {
        let slot: Slot<R, E> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&slot);
        (slot, move |outcome| sink.lock().push(outcome))
    }

    #[test]
    fn test_empty_input_completes_without_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (slot, done) = collector::<u8, ()>();
        schedule(
            Vec::<u8>::new(),
            Limit::SERIAL,
            move |_, cb: Callback<u8, ()>| {
                counter.fetch_add(1, Ordering::SeqCst);
                cb.ok(0);
            },
            done,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let outcomes = slot.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Ok(v) if v.is_empty()));
    }

    #[test]
    fn test_synchronous_workers_do_not_recurse() {
        // Serial limit with synchronously completing workers would recurse
        // once per item in a callback-chain design.
        let (slot, done) = collector::<usize, ()>();
        schedule(
            (0..100_000).collect(),
            Limit::SERIAL,
            |n: usize, cb: Callback<usize, ()>| cb.ok(n * 2),
            done,
        );
        let outcomes = slot.lock();
        assert_eq!(outcomes.len(), 1);
        let results = outcomes[0].as_ref().ok().unwrap();
        assert_eq!(results.len(), 100_000);
        assert_eq!(results[99_999], 199_998);
    }

    #[test]
    fn test_deferred_completions_respect_window() {
        // Park callbacks so we control completion order by hand.
        let parked: Arc<Mutex<Vec<(usize, Callback<usize, ()>)>>> = Arc::new(Mutex::new(Vec::new()));
        let park = Arc::clone(&parked);
        let (slot, done) = collector::<usize, ()>();
        schedule(
            (0..5).collect(),
            Limit::new(2).unwrap(),
            move |n: usize, cb| park.lock().push((n, cb)),
            done,
        );

        assert_eq!(parked.lock().len(), 2);

        // Finish item 1 before item 0.
        let (n, cb) = parked.lock().remove(1);
        cb.ok(n * 10);
        assert_eq!(parked.lock().len(), 2);

        loop {
            let next = parked.lock().pop();
            match next {
                Some((n, cb)) => cb.ok(n * 10),
                None => break,
            }
        }

        let outcomes = slot.lock();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().ok().unwrap(), &vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn test_first_error_aborts_once() {
        let parked: Arc<Mutex<Vec<(usize, Callback<usize, String>)>>> = Arc::new(Mutex::new(Vec::new()));
        let park = Arc::clone(&parked);
        let (slot, done) = collector::<usize, String>();
        schedule(
            (0..6).collect(),
            Limit::new(3).unwrap(),
            move |n: usize, cb| park.lock().push((n, cb)),
            done,
        );

        let mut drained: Vec<_> = parked.lock().drain(..).collect();
        assert_eq!(drained.len(), 3);
        let (_, first) = drained.remove(0);
        first.err("first".into());

        // Late completions after the abort are ignored.
        for (n, cb) in drained {
            if n == 1 {
                cb.err("second".into());
            } else {
                cb.ok(n);
            }
        }

        // Nothing new was dispatched after the abort.
        assert!(parked.lock().is_empty());
        let outcomes = slot.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Err(TaskError::Failed(e)) if e == "first"));
    }

    #[test]
    fn test_dropped_callback_aborts_run() {
        let (slot, done) = collector::<u8, ()>();
        schedule(vec![1_u8, 2, 3], Limit::Unbounded, |_, cb: Callback<u8, ()>| drop(cb), done);
        let outcomes = slot.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Err(TaskError::Lost)));
    }

    #[test]
    fn test_unbounded_dispatches_everything_up_front() {
        let parked: Arc<Mutex<Vec<Callback<(), ()>>>> = Arc::new(Mutex::new(Vec::new()));
        let park = Arc::clone(&parked);
        let (slot, done) = collector::<(), ()>();
        schedule(vec![(); 50], Limit::Unbounded, move |(), cb| park.lock().push(cb), done);
        assert_eq!(parked.lock().len(), 50);
        assert!(slot.lock().is_empty());
        let callbacks: Vec<_> = parked.lock().drain(..).collect();
        for cb in callbacks {
            cb.ok(());
        }
        assert_eq!(slot.lock().len(), 1);
    }
}
