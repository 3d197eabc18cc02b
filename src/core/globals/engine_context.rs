//=========================================================================
// Engine Context
//=========================================================================
//
// The explicit replacement for process-wide singletons: one value that
// owns the request coordinator, the scene coordinator and the abort
// signal, cloned cheaply into every thread and closure that needs them.
//
// Ownership:
// ```text
//   EngineContext (Clone)
//     ├─ config:   Arc<EngineConfig>
//     ├─ requests: Arc<RequestCoordinator>
//     ├─ scenes:   Arc<SceneLifecycleCoordinator>
//     └─ abort:    AbortSignal
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::info;

//=== Internal Dependencies ===============================================

use super::{AbortSignal, EngineConfig};
use crate::core::request::{RequestCoordinator, RequestError};
use crate::core::scene::SceneLifecycleCoordinator;

//=== EngineContext =======================================================

/// Shared handle to every engine-lifetime subsystem.
#[derive(Clone)]
pub struct EngineContext {
    config: Arc<EngineConfig>,
    requests: Arc<RequestCoordinator>,
    scenes: Arc<SceneLifecycleCoordinator>,
    abort: AbortSignal,
}

impl EngineContext {
    /// Starts the request processors and binds the calling thread as the
    /// render thread.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ThreadSpawn`] if the background worker
    /// cannot start.
    pub fn new(config: EngineConfig) -> Result<Self, RequestError> {
        let requests = Arc::new(RequestCoordinator::new(&config)?);
        let abort = AbortSignal::new();
        let scenes = Arc::new(SceneLifecycleCoordinator::new(Arc::clone(&requests), abort.clone()));

        info!(
            target: "engine",
            "Engine context created (render budget: {:?}, drain timeout: {:?})",
            config.render_budget,
            config.drain_timeout
        );

        Ok(Self {
            config: Arc::new(config),
            requests,
            scenes,
            abort,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn requests(&self) -> &Arc<RequestCoordinator> {
        &self.requests
    }

    pub fn scenes(&self) -> &Arc<SceneLifecycleCoordinator> {
        &self.scenes
    }

    pub fn abort(&self) -> &AbortSignal {
        &self.abort
    }

    /// Disposes scenes, then the request processors.
    ///
    /// Scene disposal may submit cleanup requests, so the processors are
    /// drained last.
    pub fn dispose(&self) {
        self.scenes.dispose();
        self.requests.dispose();
        info!(target: "engine", "Engine context disposed");
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::tests::Recorder;
    use crate::core::component::ComponentHandle;
    use crate::core::scene::{Entity, LoadContext, SceneError, SceneLoader};
    use crossbeam_channel::{unbounded, Sender};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn clones_share_subsystems() {
        let ctx = EngineContext::new(EngineConfig::default()).unwrap();
        let clone = ctx.clone();

        assert!(Arc::ptr_eq(ctx.requests(), clone.requests()));
        assert!(Arc::ptr_eq(ctx.scenes(), clone.scenes()));

        clone.abort().raise("fatal");
        assert_eq!(ctx.abort().message().as_deref(), Some("fatal"));
    }

    #[test]
    fn creating_thread_is_render_thread() {
        let ctx = EngineContext::new(EngineConfig::default()).unwrap();
        assert!(ctx.requests().is_render_thread());

        let remote = ctx.clone();
        let elsewhere = thread::spawn(move || remote.requests().is_render_thread())
            .join()
            .unwrap();
        assert!(!elsewhere);
    }

    #[test]
    fn dispose_drains_pending_render_requests() {
        let ctx = EngineContext::new(EngineConfig::default()).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        ctx.requests().submit_render_thread(move || flag.store(true, Ordering::SeqCst));

        ctx.dispose();

        assert!(ran.load(Ordering::SeqCst));
        assert!(ctx.requests().submit_background(|| {}).is_err());
    }

    #[test]
    fn dispose_releases_scene_still_loading_in_background() {
        struct SlowLoader {
            started: Sender<()>,
            log: Arc<Mutex<Vec<String>>>,
        }

        impl SceneLoader for SlowLoader {
            fn name(&self) -> &str {
                "Slow"
            }

            fn load_entities(&self, _ctx: &LoadContext<'_>) -> anyhow::Result<Vec<Entity>> {
                self.started.send(()).ok();
                thread::sleep(Duration::from_millis(50));
                Ok(vec![Entity::new("Slow")
                    .with_component(ComponentHandle::new(Recorder::new("Slow", &self.log)))])
            }
        }

        let ctx = EngineContext::new(EngineConfig::default()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = unbounded();
        ctx.scenes()
            .register_scene(Arc::new(SlowLoader {
                started: started_tx,
                log: Arc::clone(&log),
            }))
            .unwrap();

        let (done_tx, done_rx) = unbounded();
        ctx.scenes()
            .load_scene_async("Slow", move |result| done_tx.send(result).unwrap())
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        ctx.dispose();

        assert_eq!(done_rx.try_recv(), Ok(Err(SceneError::CoordinatorDisposed)));
        assert!(!ctx.scenes().has_new_scene());
        assert_eq!(*log.lock(), vec!["Slow:dispose"]);
        assert_eq!(ctx.scenes().disposed_count(), 1);
    }

    #[test]
    fn config_is_preserved() {
        let config = EngineConfig {
            render_budget: Duration::from_millis(4),
            ..EngineConfig::default()
        };
        let ctx = EngineContext::new(config.clone()).unwrap();
        assert_eq!(ctx.config(), &config);
    }
}
