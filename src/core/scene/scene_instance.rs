//=========================================================================
// Scene Instance
//=========================================================================
//
// The live entity set of a loaded scene plus its component dispatcher.
//
// Lifetime:
//   new() (loader thread) ──> mark_ready() ──> activate() (render thread)
//     ──> dispatch() per frame ──> background() or dispose()
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{debug, info};

//=== Internal Dependencies ===============================================

use crate::core::component::{ComponentEventDispatcher, ComponentHandle, HookContext, LifecyclePhase};

//=== Entity ==============================================================

/// A named bag of components.
#[derive(Debug)]
pub struct Entity {
    name: String,
    components: Vec<ComponentHandle>,
}

impl Entity {
    /// Creates an entity with no components.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Adds a component, builder style.
    pub fn with_component(mut self, component: ComponentHandle) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a component.
    pub fn add_component(&mut self, component: ComponentHandle) {
        self.components.push(component);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }

    fn dispose(&self) {
        for component in &self.components {
            component.dispose();
        }
    }
}

//=== SceneInstance =======================================================

/// A loaded scene: its entities, dispatcher and readiness.
pub struct SceneInstance {
    name: String,
    entities: Vec<Entity>,
    dispatcher: ComponentEventDispatcher,
    ready: bool,
    disposed: bool,
}

impl SceneInstance {
    //--- Construction -----------------------------------------------------

    /// Builds an instance from freshly loaded entities.
    ///
    /// Safe off the render thread: no hook runs until activation.
    pub fn new(name: impl Into<String>, entities: Vec<Entity>) -> Self {
        let mut dispatcher = ComponentEventDispatcher::new();
        for entity in &entities {
            for component in entity.components() {
                dispatcher.track(component);
            }
        }

        Self {
            name: name.into(),
            entities,
            dispatcher,
            ready: false,
            disposed: false,
        }
    }

    /// Marks the load as complete.
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    //--- Lifecycle --------------------------------------------------------

    /// Brings the scene to the foreground: `Initialize` on first
    /// activation, then `Start`.
    pub fn activate(&mut self, ctx: &mut HookContext<'_>) {
        if !self.dispatcher.is_initialized() {
            self.dispatch(LifecyclePhase::Initialize, ctx);
        }
        self.dispatch(LifecyclePhase::Start, ctx);
        info!(target: "scenes", "Scene '{}' started ({} entities)", self.name, self.entities.len());
    }

    /// Sends the scene to the background, keeping it warm.
    pub fn background(&mut self, ctx: &mut HookContext<'_>) {
        self.dispatch(LifecyclePhase::Background, ctx);
        info!(target: "scenes", "Scene '{}' backgrounded", self.name);
    }

    /// Dispatches `phase`, then registers any entities spawned by hooks.
    /// Returns the number of hooks invoked by the dispatch pass.
    pub fn dispatch(&mut self, phase: LifecyclePhase, ctx: &mut HookContext<'_>) -> usize {
        if self.disposed {
            return 0;
        }
        let invoked = self.dispatcher.dispatch(phase, ctx);
        self.adopt_spawned(ctx);
        invoked
    }

    /// Disposes every component. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        for entity in &self.entities {
            entity.dispose();
        }
        let count = self.entities.len();
        self.entities.clear();
        info!(target: "scenes", "Scene '{}' disposed ({} entities)", self.name, count);
        true
    }

    //--- Entities ---------------------------------------------------------

    /// Adds an entity to the running scene, applying catch-up dispatch.
    pub fn add_entity(&mut self, entity: Entity, ctx: &mut HookContext<'_>) {
        if self.disposed {
            entity.dispose();
            return;
        }
        for component in entity.components() {
            self.dispatcher.register_component(component, ctx);
        }
        debug!(target: "scenes", "Entity '{}' added to scene '{}'", entity.name(), self.name);
        self.entities.push(entity);
        self.adopt_spawned(ctx);
    }

    /// Removes the first entity with `name`, disposing its components.
    /// Returns false if no such entity exists.
    pub fn remove_entity(&mut self, name: &str) -> bool {
        let Some(index) = self.entities.iter().position(|e| e.name() == name) else {
            return false;
        };
        let entity = self.entities.remove(index);
        entity.dispose();
        debug!(target: "scenes", "Entity '{}' removed from scene '{}'", name, self.name);
        true
    }

    fn adopt_spawned(&mut self, ctx: &mut HookContext<'_>) {
        // Catch-up hooks may spawn further entities; loop until settled.
        loop {
            let spawned = ctx.take_spawned();
            if spawned.is_empty() {
                break;
            }
            for entity in spawned {
                for component in entity.components() {
                    self.dispatcher.register_component(component, ctx);
                }
                self.entities.push(entity);
            }
        }
    }

    //--- Queries ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_initialized(&self) -> bool {
        self.dispatcher.is_initialized()
    }

    pub fn is_started(&self) -> bool {
        self.dispatcher.is_started()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::tests::{test_requests, Recorder};
    use crate::core::component::{Component, Startable};
    use crate::core::globals::AbortSignal;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn entity(label: &'static str, log: &Log) -> Entity {
        Entity::new(label).with_component(ComponentHandle::new(Recorder::new(label, log)))
    }

    /// Spawns one child entity from its start hook.
    struct Spawner {
        log: Log,
    }

    impl Startable for Spawner {
        fn start(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
            ctx.spawn(
                Entity::new("child").with_component(ComponentHandle::new(Recorder::new("child", &self.log))),
            );
            Ok(())
        }
    }

    impl Component for Spawner {
        fn as_startable(&mut self) -> Option<&mut dyn Startable> {
            Some(self)
        }
    }

    #[test]
    fn construction_runs_no_hooks() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let scene = SceneInstance::new("Main", vec![entity("a", &log)]);

        assert!(log.lock().is_empty());
        assert!(!scene.is_ready());
        assert!(!scene.is_initialized());
        assert_eq!(scene.entity_count(), 1);
    }

    #[test]
    fn activate_initializes_then_starts() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut scene = SceneInstance::new("Main", vec![entity("a", &log), entity("b", &log)]);
        scene.activate(&mut ctx);

        assert_eq!(
            *log.lock(),
            vec!["a:initialize", "b:initialize", "a:start", "b:start"]
        );
        assert!(scene.is_started());
    }

    #[test]
    fn reactivation_skips_initialize() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut scene = SceneInstance::new("Menu", vec![entity("m", &log)]);
        scene.activate(&mut ctx);
        scene.background(&mut ctx);
        log.lock().clear();

        scene.activate(&mut ctx);
        assert_eq!(*log.lock(), vec!["m:start"]);
    }

    #[test]
    fn entities_added_mid_session_catch_up() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut scene = SceneInstance::new("Main", Vec::new());
        scene.activate(&mut ctx);
        scene.add_entity(entity("late", &log), &mut ctx);

        assert_eq!(*log.lock(), vec!["late:initialize", "late:start"]);

        scene.dispatch(LifecyclePhase::Update, &mut ctx);
        assert_eq!(log.lock().last().map(String::as_str), Some("late:update"));
    }

    #[test]
    fn spawned_entities_join_after_dispatch() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let spawner = Entity::new("spawner").with_component(ComponentHandle::new(Spawner {
            log: Arc::clone(&log),
        }));
        let mut scene = SceneInstance::new("Main", vec![spawner]);
        scene.activate(&mut ctx);

        assert_eq!(scene.entity_count(), 2);
        assert!(scene.entity("child").is_some());
        assert_eq!(*log.lock(), vec!["child:initialize", "child:start"]);
    }

    #[test]
    fn removed_entities_stop_receiving_hooks() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut scene = SceneInstance::new("Main", vec![entity("a", &log), entity("b", &log)]);
        scene.activate(&mut ctx);

        assert!(scene.remove_entity("a"));
        assert!(!scene.remove_entity("missing"));
        log.lock().clear();

        scene.dispatch(LifecyclePhase::Update, &mut ctx);
        assert_eq!(*log.lock(), vec!["b:update"]);
    }

    #[test]
    fn dispose_is_exactly_once() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut scene = SceneInstance::new("Main", vec![entity("a", &log)]);

        assert!(scene.dispose());
        assert!(!scene.dispose());
        assert!(scene.is_disposed());
        assert_eq!(*log.lock(), vec!["a:dispose"]);
    }

    #[test]
    fn disposed_scene_ignores_dispatch() {
        let requests = test_requests();
        let abort = AbortSignal::new();
        let mut ctx = HookContext::new(&requests, &abort, Duration::ZERO);
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut scene = SceneInstance::new("Main", vec![entity("a", &log)]);
        scene.dispose();
        log.lock().clear();

        assert_eq!(scene.dispatch(LifecyclePhase::Update, &mut ctx), 0);
        assert!(log.lock().is_empty());
    }
}
