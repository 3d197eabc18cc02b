//=========================================================================
// Scene Lifecycle Coordinator
//=========================================================================
//
// Orchestrates load -> mark ready -> swap to active -> dispose previous.
//
// Flow:
// ```text
//   load_scene(name)        any thread      claims slot, runs loader,
//                                           stores READY instance
//   has_new_scene()         render thread   single-bit query per frame
//   switch_to_new_scene()   render thread   swap pointers, start new,
//                                           then dispose/background old
// ```
//
// Locking: the registry mutex guards names and the ready slot; the active
// mutex guards the live instance and is held while its hooks run. Hooks
// must not call back into `dispatch`, `switch_to_new_scene` or
// `add_entity`; they spawn through their HookContext instead.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use super::scene_registry::LoadTicket;
use super::{Entity, LoadContext, SceneError, SceneInstance, SceneLoader, SceneRegistry};
use crate::core::component::{HookContext, LifecyclePhase};
use crate::core::globals::AbortSignal;
use crate::core::request::{describe_panic, RequestCoordinator, RequestError};

//=== SceneLifecycleCoordinator ===========================================

/// Drives scene loading and the atomic loading-to-active handoff.
pub struct SceneLifecycleCoordinator {
    registry: Mutex<SceneRegistry>,
    active: Mutex<Option<SceneInstance>>,
    new_scene_ready: AtomicBool,
    disposed: AtomicBool,
    disposed_scenes: AtomicUsize,
    requests: Arc<RequestCoordinator>,
    abort: AbortSignal,
}

impl SceneLifecycleCoordinator {
    //--- Construction -----------------------------------------------------

    pub fn new(requests: Arc<RequestCoordinator>, abort: AbortSignal) -> Self {
        Self {
            registry: Mutex::new(SceneRegistry::new()),
            active: Mutex::new(None),
            new_scene_ready: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            disposed_scenes: AtomicUsize::new(0),
            requests,
            abort,
        }
    }

    //--- Registration -----------------------------------------------------

    /// Registers a scene loader.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateScene`] if the name is taken.
    pub fn register_scene(&self, loader: Arc<dyn SceneLoader>) -> Result<(), SceneError> {
        self.registry.lock().register(loader)
    }

    /// Registers several loaders, stopping at the first duplicate.
    pub fn register_scenes<I>(&self, loaders: I) -> Result<(), SceneError>
    where
        I: IntoIterator<Item = Arc<dyn SceneLoader>>,
    {
        let mut registry = self.registry.lock();
        for loader in loaders {
            registry.register(loader)?;
        }
        Ok(())
    }

    //--- Loading ----------------------------------------------------------

    /// Loads `name` on the calling thread and marks it ready to swap in.
    ///
    /// # Errors
    ///
    /// - [`SceneError::AlreadyLoading`] if another load is in flight
    ///   (the request is rejected, not queued)
    /// - [`SceneError::UnknownScene`] if `name` is not registered
    /// - [`SceneError::LoaderFailure`] if the loader errors or panics;
    ///   the previously active scene is left untouched
    /// - [`SceneError::CoordinatorDisposed`] if teardown started before
    ///   or during the load; a finished instance is disposed, not stored
    pub fn load_scene(&self, name: &str) -> Result<(), SceneError> {
        let ticket = self.claim_load(name).map_err(|err| {
            warn!(target: "scenes", "Load of '{}' rejected: {}", name, err);
            err
        })?;

        let instance = match ticket {
            LoadTicket::Warm(instance) => {
                info!(target: "scenes", "Scene '{}' resumed from retained state", name);
                instance
            }
            LoadTicket::Fresh(loader) => match self.run_loader(loader.as_ref(), name) {
                Ok(entities) => {
                    info!(target: "scenes", "Scene '{}' loaded ({} entities)", name, entities.len());
                    SceneInstance::new(name, entities)
                }
                Err(err) => {
                    self.registry.lock().fail_load();
                    error!(target: "scenes", "{}", err);
                    return Err(err);
                }
            },
        };

        let mut registry = self.registry.lock();
        if self.disposed.load(Ordering::SeqCst) {
            registry.fail_load();
            drop(registry);
            warn!(target: "scenes", "Scene '{}' finished loading after teardown; disposing it", name);
            let mut instance = instance;
            self.dispose_instance(&mut instance);
            return Err(SceneError::CoordinatorDisposed);
        }
        // Published under the registry lock so a swap never sees the flag
        // without the ready instance.
        registry.complete_load(instance);
        self.new_scene_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Runs [`load_scene`](Self::load_scene) on the background thread and
    /// reports the result to `on_complete` there.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::ProcessorDisposed`] if the background
    /// processor no longer accepts work; `on_complete` is not called.
    pub fn load_scene_async<F>(self: &Arc<Self>, name: &str, on_complete: F) -> Result<(), RequestError>
    where
        F: FnOnce(Result<(), SceneError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        let name = name.to_string();
        self.requests.submit_background(move || {
            let result = this.load_scene(&name);
            on_complete(result);
        })
    }

    fn claim_load(&self, name: &str) -> Result<LoadTicket, SceneError> {
        let mut registry = self.registry.lock();
        if self.disposed.load(Ordering::SeqCst) {
            return Err(SceneError::CoordinatorDisposed);
        }
        registry.begin_load(name)
    }

    fn run_loader(&self, loader: &dyn SceneLoader, name: &str) -> Result<Vec<Entity>, SceneError> {
        let ctx = LoadContext {
            requests: &self.requests,
            scene: name,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| loader.load_entities(&ctx))) {
            Ok(Ok(entities)) => Ok(entities),
            Ok(Err(err)) => Err(SceneError::LoaderFailure {
                scene: name.to_string(),
                message: format!("{:#}", err),
            }),
            Err(payload) => Err(SceneError::LoaderFailure {
                scene: name.to_string(),
                message: format!("loader panicked: {}", describe_panic(payload.as_ref())),
            }),
        }
    }

    //--- Swapping ---------------------------------------------------------

    /// Returns true when a load has completed and not yet been swapped in.
    pub fn has_new_scene(&self) -> bool {
        self.new_scene_ready.load(Ordering::SeqCst)
    }

    /// Swaps the ready scene in. Render thread only.
    ///
    /// Order: active/loading names swap atomically, the new scene is
    /// initialized (first time) and started, and only then is the old
    /// scene disposed, or backgrounded if its descriptor retains state.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NoSceneReady`] if nothing is waiting.
    pub fn switch_to_new_scene(&self) -> Result<(), SceneError> {
        if !self.requests.is_render_thread() {
            warn!(target: "scenes", "switch_to_new_scene called off the render thread");
        }

        let mut incoming = {
            let mut registry = self.registry.lock();
            let instance = registry.take_ready().ok_or(SceneError::NoSceneReady)?;
            self.new_scene_ready.store(false, Ordering::SeqCst);
            instance
        };

        let mut active = self.active.lock();
        let outgoing = active.take();
        let mut ctx = HookContext::new(&self.requests, &self.abort, Duration::ZERO);

        incoming.activate(&mut ctx);
        info!(
            target: "scenes",
            "Switched to scene '{}' (previous: {})",
            incoming.name(),
            outgoing.as_ref().map_or("none", SceneInstance::name)
        );
        let incoming_name = incoming.name().to_string();
        *active = Some(incoming);
        drop(active);

        if let Some(outgoing) = outgoing {
            self.retire(outgoing, &incoming_name, &mut ctx);
        }
        Ok(())
    }

    fn retire(&self, mut outgoing: SceneInstance, incoming_name: &str, ctx: &mut HookContext<'_>) {
        let retained = outgoing.name() != incoming_name && self.registry.lock().is_retained(outgoing.name());
        if retained {
            outgoing.background(ctx);
            if let Err(mut rejected) = self.registry.lock().park(outgoing) {
                self.dispose_instance(&mut rejected);
            }
        } else {
            self.dispose_instance(&mut outgoing);
        }
    }

    fn dispose_instance(&self, instance: &mut SceneInstance) {
        if instance.dispose() {
            self.disposed_scenes.fetch_add(1, Ordering::SeqCst);
        }
    }

    //--- Frame Dispatch ---------------------------------------------------

    /// Dispatches `phase` to the active scene. Returns hooks invoked.
    pub fn dispatch(&self, phase: LifecyclePhase, delta: Duration) -> usize {
        let Some(mut active) = self.active.try_lock() else {
            warn!(target: "scenes", "Re-entrant {} dispatch ignored", phase);
            return 0;
        };
        let Some(scene) = active.as_mut() else {
            return 0;
        };
        let mut ctx = HookContext::new(&self.requests, &self.abort, delta);
        scene.dispatch(phase, &mut ctx)
    }

    /// Adds an entity to the active scene with catch-up dispatch.
    ///
    /// Returns false (disposing the entity's components) if no scene is
    /// active.
    pub fn add_entity(&self, entity: Entity) -> bool {
        let mut active = self.active.lock();
        let mut ctx = HookContext::new(&self.requests, &self.abort, Duration::ZERO);
        match active.as_mut() {
            Some(scene) => {
                scene.add_entity(entity, &mut ctx);
                true
            }
            None => {
                warn!(target: "scenes", "No active scene; entity '{}' discarded", entity.name());
                for component in entity.components() {
                    component.dispose();
                }
                false
            }
        }
    }

    /// Runs `f` against the active scene, if any.
    pub fn with_active_scene<R>(&self, f: impl FnOnce(&mut SceneInstance) -> R) -> Option<R> {
        self.active.lock().as_mut().map(f)
    }

    //--- Queries ----------------------------------------------------------

    pub fn active_scene_name(&self) -> Option<String> {
        self.registry.lock().active_name().map(str::to_string)
    }

    pub fn loading_scene_name(&self) -> Option<String> {
        self.registry.lock().loading_name().map(str::to_string)
    }

    /// First registered scene that is not `exclude`, in registration order.
    pub fn first_scene_name(&self, exclude: Option<&str>) -> Option<String> {
        self.registry
            .lock()
            .scene_names()
            .iter()
            .find(|name| Some(name.as_str()) != exclude)
            .cloned()
    }

    /// Number of scene instances disposed so far.
    pub fn disposed_count(&self) -> usize {
        self.disposed_scenes.load(Ordering::SeqCst)
    }

    //--- Teardown ---------------------------------------------------------

    /// Disposes the active scene and every ready or warm instance.
    ///
    /// Each instance is disposed independently; a failing component does
    /// not stop the rest from being released. Loads still running finish
    /// by disposing their own instance, and later loads are rejected.
    pub fn dispose(&self) {
        let mut instances: Vec<SceneInstance> = self.active.lock().take().into_iter().collect();
        {
            let mut registry = self.registry.lock();
            self.disposed.store(true, Ordering::SeqCst);
            instances.extend(registry.take_all_instances());
            self.new_scene_ready.store(false, Ordering::SeqCst);
        }

        let count = instances.len();
        for instance in &mut instances {
            self.dispose_instance(instance);
        }
        info!(target: "scenes", "Scene coordinator disposed ({} instance(s))", count);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
