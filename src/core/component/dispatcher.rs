//=========================================================================
// Component Event Dispatcher
//=========================================================================
//
// Per-scene registry from lifecycle phase to the components that declared
// a hook for it, kept in registration order.
//
// Flow:
//   register_component() ──> phase already passed? ──yes──> invoke now
//                                                  └─no───> append weak ref
//   dispatch(phase) ──> prune dead entries ──> invoke each live component
//
// Threading: registrations are appended from the render thread by
// convention (scene activation and per-frame spawns both happen there).
// A scene may be built on the background thread before any phase has
// run; after activation it must only be touched from the render thread.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Weak;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{ComponentCell, ComponentHandle, HookContext, LifecyclePhase};

//=== ComponentEventDispatcher ============================================

/// Dispatches lifecycle phases to registered components.
///
/// The dispatcher never owns components. Disposed or dropped components
/// are skipped at dispatch time and pruned lazily.
#[derive(Default)]
pub struct ComponentEventDispatcher {
    registrations: [Vec<Weak<ComponentCell>>; 5],
    initialized: bool,
    started: bool,
}

impl ComponentEventDispatcher {
    /// Creates an empty dispatcher with no phase passed.
    pub fn new() -> Self {
        Self::default()
    }

    //--- Registration -----------------------------------------------------

    /// Registers every phase the component declares.
    ///
    /// Catch-up rule: if the scene has already initialized, the
    /// component's `Initialize` hook runs now (once) instead of being
    /// queued; likewise for `Start` while the scene is in the foreground.
    pub fn register_component(&mut self, component: &ComponentHandle, ctx: &mut HookContext<'_>) {
        if component.is_disposed() {
            warn!(target: "components", "Ignoring registration of a disposed component");
            return;
        }

        for phase in component.declared_phases() {
            if self.has_passed(phase) {
                debug!(target: "components", "Catch-up {} for late-registered component", phase);
                component.cell.invoke(phase, ctx);
            } else {
                self.registrations[phase.index()].push(component.downgrade());
            }
        }
    }

    /// Registers a component on a dispatcher that has not run any phase.
    ///
    /// Used while a scene is being built, possibly off the render thread,
    /// where no hook can need catching up.
    pub(crate) fn track(&mut self, component: &ComponentHandle) {
        debug_assert!(!self.initialized && !self.started);
        for phase in component.declared_phases() {
            self.registrations[phase.index()].push(component.downgrade());
        }
    }

    //--- Dispatch ---------------------------------------------------------

    /// Invokes `phase` on every live registered component, in
    /// registration order. Returns the number of hooks invoked.
    ///
    /// A failing hook is logged and does not stop the pass. `Initialize`
    /// runs at most once per dispatcher; repeated calls are ignored.
    pub fn dispatch(&mut self, phase: LifecyclePhase, ctx: &mut HookContext<'_>) -> usize {
        if phase == LifecyclePhase::Initialize && self.initialized {
            debug!(target: "components", "Initialize already dispatched; ignoring");
            return 0;
        }

        let list = &mut self.registrations[phase.index()];
        list.retain(|weak| weak.upgrade().is_some_and(|cell| !cell.is_disposed()));

        let mut invoked = 0;
        for weak in list.iter() {
            let Some(cell) = weak.upgrade() else {
                continue;
            };
            // Disposal may have started during this pass.
            if cell.is_disposed() {
                continue;
            }
            if cell.invoke(phase, ctx).is_some() {
                invoked += 1;
            }
        }

        match phase {
            LifecyclePhase::Initialize => {
                self.initialized = true;
                // Never recurs; late registrations are caught up instead.
                self.registrations[phase.index()] = Vec::new();
            }
            LifecyclePhase::Start => self.started = true,
            LifecyclePhase::Background => self.started = false,
            LifecyclePhase::Update | LifecyclePhase::Render => {}
        }

        invoked
    }

    //--- Queries ----------------------------------------------------------

    /// Returns true once `Initialize` has been dispatched.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns true while the scene is in the foreground.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of registrations held for `phase`, including dead entries
    /// not yet pruned.
    pub fn registration_count(&self, phase: LifecyclePhase) -> usize {
        self.registrations[phase.index()].len()
    }

    fn has_passed(&self, phase: LifecyclePhase) -> bool {
        match phase {
            LifecyclePhase::Initialize => self.initialized,
            LifecyclePhase::Start => self.started,
            _ => false,
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
