//=========================================================================
// Component System
//=========================================================================
//
// Lifecycle hooks for game components, declared through optional
// capability traits rather than discovered by name.
//
// Architecture:
// ```text
//   Component ──as_initializable()──> Option<&mut dyn Initializable>
//             ──as_startable()──────> Option<&mut dyn Startable>
//             ──as_updatable()──────> Option<&mut dyn Updatable>
//             ──as_renderable()─────> Option<&mut dyn Renderable>
//             ──as_backgroundable()─> Option<&mut dyn Backgroundable>
//
//   ComponentHandle (strong, owned by Entity)
//        └─ Weak ref ──> ComponentEventDispatcher (never owns components)
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::error;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::core::globals::AbortSignal;
use crate::core::request::{describe_panic, RequestCoordinator};
use crate::core::scene::Entity;

//=== Module Declarations =================================================

mod dispatcher;

//=== Public API ==========================================================

pub use dispatcher::ComponentEventDispatcher;

//=== LifecyclePhase ======================================================

/// Named points at which components receive callbacks.
///
/// Ordered by occurrence in a scene's life, not by value:
/// `Initialize` once, then `Start` each time the scene comes to the
/// foreground, `Update`/`Render` every frame while active, and
/// `Background` when a retained scene is swapped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Initialize,
    Start,
    Update,
    Render,
    Background,
}

impl LifecyclePhase {
    /// Every phase, in occurrence order.
    pub const ALL: [LifecyclePhase; 5] = [
        LifecyclePhase::Initialize,
        LifecyclePhase::Start,
        LifecyclePhase::Update,
        LifecyclePhase::Render,
        LifecyclePhase::Background,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            LifecyclePhase::Initialize => 0,
            LifecyclePhase::Start => 1,
            LifecyclePhase::Update => 2,
            LifecyclePhase::Render => 3,
            LifecyclePhase::Background => 4,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Initialize => "initialize",
            LifecyclePhase::Start => "start",
            LifecyclePhase::Update => "update",
            LifecyclePhase::Render => "render",
            LifecyclePhase::Background => "background",
        };
        f.write_str(name)
    }
}

//=== HookContext =========================================================

/// Context handed to every lifecycle hook.
///
/// Gives hooks access to request submission and the abort signal, and
/// lets them spawn entities into the running scene. Spawned entities are
/// registered after the current dispatch pass completes.
pub struct HookContext<'a> {
    requests: &'a RequestCoordinator,
    abort: &'a AbortSignal,
    delta: Duration,
    spawned: Vec<Entity>,
}

impl<'a> HookContext<'a> {
    /// Creates a context for one dispatch pass.
    pub fn new(requests: &'a RequestCoordinator, abort: &'a AbortSignal, delta: Duration) -> Self {
        Self {
            requests,
            abort,
            delta,
            spawned: Vec::new(),
        }
    }

    /// Request submission for deferred work.
    pub fn requests(&self) -> &RequestCoordinator {
        self.requests
    }

    /// The engine's abort signal.
    pub fn abort(&self) -> &AbortSignal {
        self.abort
    }

    /// Time since the previous frame (zero outside the frame loop).
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Queues an entity to be added to the scene after this dispatch.
    pub fn spawn(&mut self, entity: Entity) {
        self.spawned.push(entity);
    }

    pub(crate) fn take_spawned(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.spawned)
    }
}

//=== Capability Traits ===================================================

/// Runs once, the first time the owning scene becomes active.
pub trait Initializable {
    fn initialize(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
}

/// Runs each time the owning scene comes to the foreground.
pub trait Startable {
    fn start(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
}

/// Runs every frame while the owning scene is active.
pub trait Updatable {
    fn update(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
}

/// Runs every frame after update, on the render thread.
pub trait Renderable {
    fn render(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
}

/// Runs when a retained scene is swapped out instead of disposed.
pub trait Backgroundable {
    fn background(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
}

//=== Component Trait =====================================================

/// A game component.
///
/// Components opt into lifecycle phases by overriding the matching
/// `as_*` accessor to return `Some(self)`. Only declared phases are
/// registered with the dispatcher.
///
/// ```rust
/// # use aetheric_loader::prelude::*;
/// struct Spinner { angle: f32 }
///
/// impl Updatable for Spinner {
///     fn update(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
///         self.angle += ctx.delta().as_secs_f32();
///         Ok(())
///     }
/// }
///
/// impl Component for Spinner {
///     fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
///         Some(self)
///     }
/// }
/// ```
pub trait Component: Send + 'static {
    fn as_initializable(&mut self) -> Option<&mut dyn Initializable> {
        None
    }

    fn as_startable(&mut self) -> Option<&mut dyn Startable> {
        None
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        None
    }

    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }

    fn as_backgroundable(&mut self) -> Option<&mut dyn Backgroundable> {
        None
    }

    /// Called once when the component's scene or entity is disposed.
    fn on_dispose(&mut self) {}
}

//=== ComponentHandle =====================================================

pub(crate) struct ComponentCell {
    disposed: AtomicBool,
    component: Mutex<Box<dyn Component>>,
}

/// Shared handle to a component instance.
///
/// Entities own handles; the dispatcher only keeps weak references, so
/// dropping or disposing the owning entity removes the component from
/// dispatch without unregistering it explicitly.
#[derive(Clone)]
pub struct ComponentHandle {
    cell: Arc<ComponentCell>,
}

impl ComponentHandle {
    /// Wraps a component in a new handle.
    pub fn new<C: Component>(component: C) -> Self {
        Self {
            cell: Arc::new(ComponentCell {
                disposed: AtomicBool::new(false),
                component: Mutex::new(Box::new(component)),
            }),
        }
    }

    /// Returns true once the component has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.cell.disposed.load(Ordering::SeqCst)
    }

    /// Phases this component declares, in occurrence order.
    pub fn declared_phases(&self) -> Vec<LifecyclePhase> {
        let mut component = self.cell.component.lock();
        let component: &mut dyn Component = component.as_mut();
        LifecyclePhase::ALL
            .into_iter()
            .filter(|phase| match phase {
                LifecyclePhase::Initialize => component.as_initializable().is_some(),
                LifecyclePhase::Start => component.as_startable().is_some(),
                LifecyclePhase::Update => component.as_updatable().is_some(),
                LifecyclePhase::Render => component.as_renderable().is_some(),
                LifecyclePhase::Background => component.as_backgroundable().is_some(),
            })
            .collect()
    }

    /// Disposes the component. Returns false if it was already disposed.
    pub fn dispose(&self) -> bool {
        if self.cell.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.cell.component.lock().on_dispose();
        }));
        if let Err(payload) = result {
            error!(target: "components", "Component panicked during dispose: {}", describe_panic(payload.as_ref()));
        }
        true
    }

    pub(crate) fn downgrade(&self) -> Weak<ComponentCell> {
        Arc::downgrade(&self.cell)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ComponentCell {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Invokes the hook for `phase`, containing errors and panics.
    ///
    /// Returns `None` if the component does not implement the phase,
    /// `Some(true)` on success and `Some(false)` on failure.
    pub(crate) fn invoke(&self, phase: LifecyclePhase, ctx: &mut HookContext<'_>) -> Option<bool> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut component = self.component.lock();
            let component: &mut dyn Component = component.as_mut();
            match phase {
                LifecyclePhase::Initialize => component.as_initializable().map(|c| c.initialize(ctx)),
                LifecyclePhase::Start => component.as_startable().map(|c| c.start(ctx)),
                LifecyclePhase::Update => component.as_updatable().map(|c| c.update(ctx)),
                LifecyclePhase::Render => component.as_renderable().map(|c| c.render(ctx)),
                LifecyclePhase::Background => component.as_backgroundable().map(|c| c.background(ctx)),
            }
        }));

        match result {
            Ok(None) => None,
            Ok(Some(Ok(()))) => Some(true),
            Ok(Some(Err(err))) => {
                error!(target: "components", "Component {} hook failed: {:#}", phase, err);
                Some(false)
            }
            Err(payload) => {
                error!(
                    target: "components",
                    "Component {} hook panicked: {}",
                    phase,
                    describe_panic(payload.as_ref())
                );
                Some(false)
            }
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
