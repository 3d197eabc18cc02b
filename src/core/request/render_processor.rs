//=========================================================================
// Render-Thread Request Processor
//=========================================================================
//
// Queue of graphics-bound work drained only from the render thread.
//
// Two entry points:
//   run_time_boxed() : once per frame, stops when the frame budget is spent
//   run_all()        : at shutdown, ignores the budget
//
// A request submitted here always runs on a later frame than the one in
// which it was submitted, and never concurrently with that frame's draw
// calls (both happen on the render thread).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

//=== Internal Dependencies ===============================================

use super::{execute_request, Request, RequestLedger, RequestQueue};

//=== FrameBudget =========================================================

/// Stopwatch measuring a fixed per-frame execution budget.
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    started: Instant,
    budget: Duration,
}

impl FrameBudget {
    /// Starts a budget timer now.
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Time spent since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the budget is spent (zero once exhausted).
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Returns true once the budget has been spent.
    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.budget
    }
}

//=== RenderThreadRequestProcessor ========================================

/// Executes queued requests on the render thread within a frame budget.
///
/// This type does not check which thread calls it; the
/// [`RequestCoordinator`](super::RequestCoordinator) enforces the
/// render-thread rule.
pub struct RenderThreadRequestProcessor {
    queue: RequestQueue,
    ledger: Arc<RequestLedger>,
    pending: AtomicUsize,
    budget: Duration,
}

impl RenderThreadRequestProcessor {
    /// Creates a processor with the given per-frame budget.
    pub(crate) fn new(budget: Duration, ledger: Arc<RequestLedger>) -> Self {
        Self {
            queue: RequestQueue::new(),
            ledger,
            pending: AtomicUsize::new(0),
            budget,
        }
    }

    /// Queues a request for a later frame.
    pub fn submit(&self, request: Request) {
        self.ledger.begin();
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.enqueue(request);
    }

    /// Per-frame budget used by [`run_time_boxed`](Self::run_time_boxed).
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Number of requests queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns true while any submitted request has not finished.
    pub fn has_outstanding(&self) -> bool {
        self.pending() > 0
    }

    //--- Execution --------------------------------------------------------

    /// Runs requests one at a time until the queue is empty or the budget
    /// is spent. Returns the number of requests executed.
    ///
    /// Only requests queued when the call starts are eligible. The budget
    /// is checked before each request, so a call overruns the budget by
    /// at most the duration of the last request it started.
    pub fn run_time_boxed(&self) -> usize {
        let budget = FrameBudget::start(self.budget);
        // Requests enqueued during this pass belong to the next frame.
        let available = self.queue.len();
        let mut executed = 0;

        while executed < available && !budget.is_exhausted() {
            let Ok(request) = self.queue.dequeue() else {
                break;
            };
            self.run_one(request);
            executed += 1;
        }

        if !self.queue.is_empty() {
            debug!(
                target: "requests",
                "Frame budget spent after {} render request(s); {} deferred",
                executed,
                self.queue.len()
            );
        }
        executed
    }

    /// Runs every queued request regardless of budget, including requests
    /// enqueued while draining. Returns the number executed.
    pub fn run_all(&self) -> usize {
        let mut executed = 0;
        while let Ok(request) = self.queue.dequeue() {
            self.run_one(request);
            executed += 1;
        }
        executed
    }

    fn run_one(&self, request: Request) {
        execute_request(request, "Render-thread");
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.ledger.finish();
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
