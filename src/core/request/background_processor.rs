//=========================================================================
// Background Request Processor
//=========================================================================
//
// One dedicated worker thread draining a RequestQueue of non-graphics
// work (disk I/O, parsing, preload hooks).
//
// Worker loop:
// ```text
//   loop {
//     select! {
//       request  ──> run it
//       shutdown ──> drain remainder, exit
//     }
//   }
// ```
//
// The worker blocks inside `select!` while the queue is empty; an enqueue
// or the shutdown channel disconnecting wakes it. Exactly one worker
// exists so requests run strictly in submission order.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

//=== Internal Dependencies ===============================================

use super::{execute_request, Request, RequestError, RequestLedger, RequestQueue};

//=== BackgroundRequestProcessor ==========================================

/// Runs submitted requests on a single long-lived worker thread.
///
/// # Disposal
///
/// [`dispose`](Self::dispose) stops accepting work, wakes the worker, lets
/// it drain every request submitted before the call and joins it.
/// Submissions that arrive afterwards are rejected with
/// [`RequestError::ProcessorDisposed`]; they are never silently dropped.
pub struct BackgroundRequestProcessor {
    queue: Arc<RequestQueue>,
    ledger: Arc<RequestLedger>,
    pending: Arc<AtomicUsize>,
    accepting: RwLock<bool>,
    shutdown: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl BackgroundRequestProcessor {
    //--- Construction -----------------------------------------------------

    /// Spawns the worker thread under the given name.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ThreadSpawn`] if the thread cannot be created.
    pub(crate) fn spawn(thread_name: &str, ledger: Arc<RequestLedger>) -> Result<Self, RequestError> {
        let queue = Arc::new(RequestQueue::new());
        let pending = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let worker = {
            let queue = Arc::clone(&queue);
            let ledger = Arc::clone(&ledger);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name(thread_name.to_string())
                .spawn(move || Self::run_worker(&queue, &ledger, &pending, &shutdown_rx))
                .map_err(RequestError::ThreadSpawn)?
        };

        info!(target: "requests", "Background request processor started ({})", thread_name);

        Ok(Self {
            queue,
            ledger,
            pending,
            accepting: RwLock::new(true),
            shutdown: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    //--- Submission -------------------------------------------------------

    /// Queues a request for the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ProcessorDisposed`] once disposal has begun.
    pub fn submit(&self, request: Request) -> Result<(), RequestError> {
        // Held across the enqueue; dispose() waits for in-flight submits.
        let accepting = self.accepting.read();
        if !*accepting {
            warn!(target: "requests", "Rejected background request submitted after dispose");
            return Err(RequestError::ProcessorDisposed);
        }

        self.ledger.begin();
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.queue.enqueue(request);
        Ok(())
    }

    //--- Queries ----------------------------------------------------------

    /// Number of requests queued or currently running on the worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns true while any submitted request has not finished.
    pub fn has_outstanding(&self) -> bool {
        self.pending() > 0
    }

    /// Returns true until [`dispose`](Self::dispose) has been called.
    pub fn is_active(&self) -> bool {
        *self.accepting.read()
    }

    //--- Disposal ---------------------------------------------------------

    /// Stops accepting work, drains the queue and joins the worker.
    ///
    /// Idempotent. When called from the worker thread itself (from inside
    /// a request) the join is skipped; the worker exits after the current
    /// request and the drain.
    pub fn dispose(&self) {
        {
            let mut accepting = self.accepting.write();
            if !*accepting {
                return;
            }
            *accepting = false;
        }

        // Disconnecting the shutdown channel wakes the worker.
        drop(self.shutdown.lock().take());

        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!(target: "requests", "Background processor disposed from its own thread; not joining");
            return;
        }

        if handle.join().is_err() {
            warn!(target: "requests", "Background worker terminated abnormally");
        }
        info!(target: "requests", "Background request processor stopped");
    }

    //--- Worker Loop ------------------------------------------------------

    fn run_worker(
        queue: &RequestQueue,
        ledger: &RequestLedger,
        pending: &AtomicUsize,
        shutdown: &Receiver<()>,
    ) {
        loop {
            select! {
                recv(queue.receiver()) -> request => match request {
                    Ok(request) => Self::run_one(request, ledger, pending),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }

        // Everything accepted before dispose() still runs.
        let mut drained = 0;
        while let Ok(request) = queue.dequeue() {
            Self::run_one(request, ledger, pending);
            drained += 1;
        }
        debug!(target: "requests", "Background worker exiting after draining {} request(s)", drained);
    }

    fn run_one(request: Request, ledger: &RequestLedger, pending: &AtomicUsize) {
        execute_request(request, "Background");
        pending.fetch_sub(1, Ordering::SeqCst);
        ledger.finish();
    }
}

impl Drop for BackgroundRequestProcessor {
    fn drop(&mut self) {
        self.dispose();
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn processor() -> BackgroundRequestProcessor {
        BackgroundRequestProcessor::spawn("test-background", Arc::new(RequestLedger::new()))
            .expect("spawn background worker")
    }

    #[test]
    fn runs_requests_off_the_calling_thread() {
        let processor = processor();
        let (tx, rx) = unbounded();
        let caller = thread::current().id();

        processor
            .submit(Box::new(move || tx.send(thread::current().id()).unwrap()))
            .unwrap();

        let worker = rx.recv_timeout(Duration::from_secs(2)).expect("request should run");
        assert_ne!(worker, caller, "Background requests must not run on the caller");
    }

    #[test]
    fn runs_requests_in_submission_order() {
        let processor = processor();
        let (tx, rx) = unbounded();

        for value in 0..50 {
            let tx = tx.clone();
            processor.submit(Box::new(move || tx.send(value).unwrap())).unwrap();
        }

        let received: Vec<i32> = (0..50)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn dispose_drains_previously_submitted_requests() {
        let processor = processor();
        let (tx, rx) = unbounded();

        processor
            .submit(Box::new(|| thread::sleep(Duration::from_millis(30))))
            .unwrap();
        for value in 0..10 {
            let tx = tx.clone();
            processor.submit(Box::new(move || tx.send(value).unwrap())).unwrap();
        }

        processor.dispose();

        let received: Vec<i32> = rx.try_iter().collect();
        assert_eq!(received.len(), 10, "All pre-dispose requests must run before dispose returns");
        assert_eq!(processor.pending(), 0);
    }

    #[test]
    fn late_submissions_are_rejected() {
        let processor = processor();
        processor.dispose();

        assert!(!processor.is_active());
        let result = processor.submit(Box::new(|| {}));
        assert!(matches!(result, Err(RequestError::ProcessorDisposed)));
        assert_eq!(processor.pending(), 0, "Rejected request must not count as pending");
    }

    #[test]
    fn dispose_is_idempotent() {
        let processor = processor();
        processor.dispose();
        processor.dispose();
        assert!(!processor.is_active());
    }

    #[test]
    fn panicking_request_does_not_kill_worker() {
        let processor = processor();
        let (tx, rx) = unbounded();

        processor.submit(Box::new(|| panic!("bad request"))).unwrap();
        processor.submit(Box::new(move || tx.send(()).unwrap())).unwrap();

        assert!(
            rx.recv_timeout(Duration::from_secs(2)).is_ok(),
            "Worker should keep running after a request panics"
        );
    }

    #[test]
    fn pending_counts_queued_and_running_work() {
        let processor = processor();
        let (release_tx, release_rx) = unbounded::<()>();

        processor
            .submit(Box::new(move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(2));
            }))
            .unwrap();
        processor.submit(Box::new(|| {})).unwrap();

        assert_eq!(processor.pending(), 2);
        assert!(processor.has_outstanding());

        release_tx.send(()).unwrap();
        processor.dispose();
        assert!(!processor.has_outstanding());
    }
}
