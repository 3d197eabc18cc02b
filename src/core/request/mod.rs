//=========================================================================
// Request System
//=========================================================================
//
// Deferred units of work and the processors that execute them.
//
// Architecture:
// ```text
//   any thread ──submit_background()──> RequestQueue ──> BackgroundRequestProcessor
//                                                          (dedicated worker thread)
//
//   any thread ──submit_render_thread()──> RequestQueue ──> RenderThreadRequestProcessor
//                                                          (drained by the frame loop,
//                                                           time-boxed per frame)
//
//   RequestLedger: one shared counter of enqueued-but-unfinished requests
//                  across both queues, polled by the drain barrier.
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::error;
use thiserror::Error;

//=== Module Declarations =================================================

mod background_processor;
mod coordinator;
mod render_processor;
mod request_queue;

//=== Public API ==========================================================

pub use background_processor::BackgroundRequestProcessor;
pub use coordinator::RequestCoordinator;
pub use render_processor::{FrameBudget, RenderThreadRequestProcessor};
pub use request_queue::RequestQueue;

//=== Request =============================================================

/// An opaque, argument-free unit of deferred work.
///
/// Requests have no identity beyond their enqueue order and run at most once.
pub type Request = Box<dyn FnOnce() + Send + 'static>;

//=== RequestError ========================================================

/// Errors produced by the request queues and processors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// `dequeue()` was called on an empty queue.
    #[error("request queue is empty")]
    EmptyQueue,

    /// A request was submitted after the background processor was disposed.
    #[error("background request processor has been disposed; late submission rejected")]
    ProcessorDisposed,

    /// The drain barrier gave up before both queues became idle.
    #[error("request queues did not drain within {0:?}")]
    DrainTimeout(std::time::Duration),

    /// The OS refused to spawn a worker or watcher thread.
    #[error("failed to spawn request thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

//=== RequestLedger =======================================================

/// Counts requests that have been enqueued but have not finished running.
///
/// Shared by both processors. A request that submits follow-up work
/// increments the ledger before its own completion decrements it, so a
/// single read of zero means nothing is queued or in flight anywhere.
#[derive(Debug, Default)]
pub(crate) struct RequestLedger {
    outstanding: AtomicUsize,
}

impl RequestLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}

//=== Execution Helpers ===================================================

/// Runs a request, containing any panic so the executing thread survives.
///
/// Returns `false` if the request panicked.
pub(crate) fn execute_request(request: Request, origin: &str) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(request)) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                target: "requests",
                "{} request panicked: {}",
                origin,
                describe_panic(payload.as_ref())
            );
            false
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_tracks_outstanding_work() {
        let ledger = RequestLedger::new();
        assert!(ledger.is_idle());

        ledger.begin();
        ledger.begin();
        assert_eq!(ledger.outstanding(), 2);

        ledger.finish();
        assert!(!ledger.is_idle());
        ledger.finish();
        assert!(ledger.is_idle());
    }

    #[test]
    fn execute_request_contains_panics() {
        let ok = execute_request(Box::new(|| {}), "test");
        assert!(ok);

        let failed = execute_request(Box::new(|| panic!("boom")), "test");
        assert!(!failed, "Panicking request should report failure");
    }

    #[test]
    fn describe_panic_handles_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(describe_panic(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(describe_panic(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(describe_panic(payload.as_ref()), "non-string panic payload");
    }
}
