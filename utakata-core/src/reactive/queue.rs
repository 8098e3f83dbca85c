//! Task Queue
//!
//! Watchers with `flush: async` do not run their callback from inside the
//! triggering write. They hand a job to the runtime's [`TaskQueue`], which
//! runs it on a later turn.
//!
//! Two queues are provided:
//!
//! - [`MicrotaskQueue`]: an in-memory FIFO drained by
//!   [`Runtime::flush`](super::Runtime::flush). This is the default and is
//!   fully deterministic.
//! - [`TokioLocalQueue`]: turns each job into a task on the current tokio
//!   `LocalSet`, so jobs run whenever the local executor gets to them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

/// Deferred unit of work.
pub type Job = Box<dyn FnOnce() + 'static>;

/// Something that can run jobs on a later turn.
pub trait TaskQueue {
    /// Queue `job`. Jobs run in the order they were scheduled.
    fn schedule(&self, job: Job);

    /// Run every queued job, including jobs queued while flushing. Returns
    /// the number of jobs run.
    ///
    /// Queues driven by an external executor return 0.
    fn flush(&self) -> usize {
        0
    }

    /// Number of jobs waiting to run, where the queue can tell.
    fn pending(&self) -> usize {
        0
    }
}

/// FIFO queue drained explicitly.
#[derive(Default)]
pub struct MicrotaskQueue {
    jobs: RefCell<VecDeque<Job>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskQueue for MicrotaskQueue {
    fn schedule(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }

    fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            // The borrow must end before the job runs; jobs schedule more jobs.
            let next = self.jobs.borrow_mut().pop_front();
            match next {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    fn pending(&self) -> usize {
        self.jobs.borrow().len()
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Runs jobs as tokio local tasks.
///
/// Scheduling panics outside of a `tokio::task::LocalSet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLocalQueue;

impl TaskQueue for TokioLocalQueue {
    fn schedule(&self, job: Job) {
        tokio::task::spawn_local(async move { job() });
    }
}
