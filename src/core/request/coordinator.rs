//=========================================================================
// Request Coordinator
//=========================================================================
//
// Facade over the background and render-thread processors.
//
// Routing:
// ```text
//   submit_background()            ──> BackgroundRequestProcessor
//   submit_render_thread()         ──> RenderThreadRequestProcessor
//   submit_render_thread_immediate()
//        on render thread          ──> run now
//        elsewhere                 ──> RenderThreadRequestProcessor
//   drain_then_run(cb)             ──> watcher thread polls the ledger,
//                                      calls cb once nothing is outstanding
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::RwLock;

//=== Internal Dependencies ===============================================

use super::{
    execute_request, BackgroundRequestProcessor, RenderThreadRequestProcessor, Request,
    RequestError, RequestLedger,
};
use crate::core::globals::EngineConfig;

//=== RequestCoordinator ==================================================

/// Entry point for submitting deferred work.
///
/// The render thread is the thread that constructed the coordinator,
/// unless rebound with [`bind_render_thread`](Self::bind_render_thread).
pub struct RequestCoordinator {
    background: BackgroundRequestProcessor,
    render: RenderThreadRequestProcessor,
    ledger: Arc<RequestLedger>,
    render_thread: RwLock<ThreadId>,
    drain_poll_interval: Duration,
    drain_timeout: Option<Duration>,
}

impl RequestCoordinator {
    //--- Construction -----------------------------------------------------

    /// Starts the background worker and binds the calling thread as the
    /// render thread.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ThreadSpawn`] if the worker cannot start.
    pub fn new(config: &EngineConfig) -> Result<Self, RequestError> {
        let ledger = Arc::new(RequestLedger::new());
        let background =
            BackgroundRequestProcessor::spawn(&config.background_thread_name, Arc::clone(&ledger))?;
        let render = RenderThreadRequestProcessor::new(config.render_budget, Arc::clone(&ledger));

        Ok(Self {
            background,
            render,
            ledger,
            render_thread: RwLock::new(thread::current().id()),
            drain_poll_interval: config.drain_poll_interval,
            drain_timeout: config.drain_timeout,
        })
    }

    //--- Render Thread Identity -------------------------------------------

    /// Makes the calling thread the render thread.
    pub fn bind_render_thread(&self) {
        *self.render_thread.write() = thread::current().id();
        debug!(target: "requests", "Render thread bound to {:?}", thread::current().id());
    }

    /// Returns true if the caller is the render thread.
    pub fn is_render_thread(&self) -> bool {
        *self.render_thread.read() == thread::current().id()
    }

    //--- Submission -------------------------------------------------------

    /// Queues work for the background thread.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ProcessorDisposed`] after [`dispose`](Self::dispose).
    pub fn submit_background<F>(&self, request: F) -> Result<(), RequestError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.background.submit(Box::new(request))
    }

    /// Queues work for a later frame's render-thread slice.
    pub fn submit_render_thread<F>(&self, request: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.render.submit(Box::new(request));
    }

    /// Runs `request` now if called on the render thread, otherwise queues
    /// it for a later frame. Returns true if it ran synchronously.
    pub fn submit_render_thread_immediate<F>(&self, request: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_render_thread() {
            execute_request(Box::new(request) as Request, "Render-thread");
            true
        } else {
            self.render.submit(Box::new(request));
            false
        }
    }

    //--- Frame Loop Hooks -------------------------------------------------

    /// Runs one budgeted slice of render-thread work.
    ///
    /// Returns the number of requests executed; does nothing when called
    /// off the render thread.
    pub fn run_time_boxed_render_requests(&self) -> usize {
        if !self.is_render_thread() {
            warn!(target: "requests", "run_time_boxed_render_requests called off the render thread; ignored");
            return 0;
        }
        self.render.run_time_boxed()
    }

    /// Runs every queued render-thread request, ignoring the budget.
    pub fn run_all_render_requests(&self) -> usize {
        if !self.is_render_thread() {
            warn!(target: "requests", "Draining render-thread requests off the render thread");
        }
        self.render.run_all()
    }

    //--- Queries ----------------------------------------------------------

    /// Returns true while either queue holds or is running work.
    pub fn has_outstanding(&self) -> bool {
        !self.ledger.is_idle()
    }

    /// Requests outstanding on the background processor.
    pub fn background_pending(&self) -> usize {
        self.background.pending()
    }

    /// Requests outstanding on the render-thread processor.
    pub fn render_pending(&self) -> usize {
        self.render.pending()
    }

    //--- Drain Barrier ----------------------------------------------------

    /// Spawns a watcher thread that waits until both queues are empty and
    /// idle, then invokes `on_drained` on the watcher thread.
    ///
    /// Work submitted while the watcher waits delays the callback until it
    /// drains too. Without a configured `drain_timeout` the watcher waits
    /// indefinitely; with one, `on_drained` receives
    /// [`RequestError::DrainTimeout`] when it elapses.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ThreadSpawn`] if the watcher cannot start;
    /// `on_drained` is not called in that case.
    pub fn drain_then_run<F>(&self, on_drained: F) -> Result<thread::JoinHandle<()>, RequestError>
    where
        F: FnOnce(Result<(), RequestError>) + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        let poll_interval = self.drain_poll_interval;
        let timeout = self.drain_timeout;

        thread::Builder::new()
            .name("aetheric-drain-watcher".to_string())
            .spawn(move || {
                let started = Instant::now();
                while !ledger.is_idle() {
                    if let Some(limit) = timeout {
                        if started.elapsed() >= limit {
                            warn!(
                                target: "requests",
                                "Drain barrier timed out with {} request(s) outstanding",
                                ledger.outstanding()
                            );
                            on_drained(Err(RequestError::DrainTimeout(limit)));
                            return;
                        }
                    }
                    thread::sleep(poll_interval);
                }
                debug!(target: "requests", "Request queues drained after {:?}", started.elapsed());
                on_drained(Ok(()));
            })
            .map_err(RequestError::ThreadSpawn)
    }

    //--- Disposal ---------------------------------------------------------

    /// Disposes the background processor (draining it), then drains the
    /// render-thread queue to completion.
    pub fn dispose(&self) {
        self.background.dispose();
        let drained = self.run_all_render_requests();
        info!(target: "requests", "Request coordinator disposed ({} render request(s) drained)", drained);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
